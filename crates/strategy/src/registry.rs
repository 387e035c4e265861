use std::path::Path;

use tracing::info;

use common::{Error, Result};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::simple_ma::{SimpleMaConfig, SimpleMaStrategy};
use crate::Strategy;

/// Holds every configured strategy instance behind the `Strategy` trait so a
/// calling engine never depends on a concrete type.
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Build the registry from config. Unknown strategy types and malformed
    /// parameters are configuration errors.
    pub fn from_config(file_cfg: &StrategyFileConfig) -> Result<Self> {
        let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();

        for cfg in &file_cfg.strategies {
            let strategy = build_strategy(cfg)?;
            info!(name = %strategy.name(), kind = %cfg.strategy_type, "Registered strategy");
            strategies.push(strategy);
        }

        Ok(Self { strategies })
    }

    /// Read and build the strategy file at `path`. The batch binary calls this
    /// at startup so a broken strategy file fails the run before any fetch.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&StrategyFileConfig::load(path)?)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Strategy> {
        self.strategies
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(cfg: &StrategyConfig) -> Result<Box<dyn Strategy>> {
    match cfg.strategy_type.as_str() {
        "simple_ma" => {
            let params = SimpleMaConfig::from_params(cfg)?;
            Ok(Box::new(SimpleMaStrategy::new(cfg.name.clone(), params)))
        }
        other => Err(Error::Config(format!(
            "strategy '{}' has unknown type '{other}'",
            cfg.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_strategies() {
        let file = StrategyFileConfig::parse(
            r#"
            [[strategy]]
            type = "simple_ma"
            name = "Close breakout"

            [[strategy]]
            type = "simple_ma"
            name = "Tight stops"
            [strategy.params]
            stop_loss_pct = 0.01
        "#,
        )
        .unwrap();

        let registry = StrategyRegistry::from_config(&file).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("Tight stops").is_some());
        assert!(registry.get("missing").is_none());
        let names: Vec<&str> = registry.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Close breakout", "Tight stops"]);
    }

    #[test]
    fn rejects_unknown_strategy_type() {
        let file = StrategyFileConfig::parse(
            r#"
            [[strategy]]
            type = "martingale"
            name = "Nope"
        "#,
        )
        .unwrap();
        let err = StrategyRegistry::from_config(&file).err().unwrap();
        assert!(err.to_string().contains("unknown type 'martingale'"));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("strategies.toml");
        std::fs::write(
            &good,
            "[[strategy]]\ntype = \"simple_ma\"\nname = \"Daily MA breakout\"\n",
        )
        .unwrap();
        let registry = StrategyRegistry::load(&good).unwrap();
        assert!(registry.get("Daily MA breakout").is_some());

        let bad = dir.path().join("bad.toml");
        std::fs::write(
            &bad,
            "[[strategy]]\ntype = \"simple_ma\"\nname = \"X\"\n[strategy.params]\nwindow_start = \"25:99\"\n",
        )
        .unwrap();
        assert!(matches!(StrategyRegistry::load(&bad), Err(Error::Config(_))));

        assert!(StrategyRegistry::load(dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn empty_file_gives_empty_registry() {
        let file = StrategyFileConfig::parse("").unwrap();
        assert!(StrategyRegistry::from_config(&file).unwrap().is_empty());
    }
}
