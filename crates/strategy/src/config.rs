use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use common::config::parse_clock;
use common::{Error, Result};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "simple_ma"
/// name = "Daily MA breakout"
///
/// [strategy.params]
/// min_volume = 100000
/// min_gain_pct = 0.005
/// stop_loss_pct = 0.02
/// target_pct = 0.04
/// window_start = "15:29:40"
/// window_end = "15:30:00"
/// daily_risk_pct = 0.01
/// max_shares_per_trade = 100
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier, e.g. "simple_ma".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs.
    pub name: String,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{}': {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| {
            Error::Config(format!("failed to parse strategy config at '{}': {e}", path.display()))
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

impl StrategyConfig {
    /// Float parameter; TOML integers are accepted too.
    pub fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
            .unwrap_or(default)
    }

    pub fn param_u64(&self, key: &str, default: u64) -> u64 {
        self.params
            .get(key)
            .and_then(|v| v.as_integer())
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(default)
    }

    /// Wall-clock parameter written as `"HH:MM"` or `"HH:MM:SS"`.
    pub fn param_time(&self, key: &str, default: NaiveTime) -> Result<NaiveTime> {
        match self.params.get(key) {
            None => Ok(default),
            Some(v) => v.as_str().and_then(parse_clock).ok_or_else(|| {
                Error::Config(format!(
                    "strategy '{}': parameter '{key}' must be a \"HH:MM[:SS]\" string, got {v}",
                    self.name
                ))
            }),
        }
    }
}
