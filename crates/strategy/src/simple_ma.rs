use chrono::{DateTime, FixedOffset, NaiveTime};

use common::{IndicatorSnapshot, PriceData, Result};
use risk::{position_size, SizingConfig};

use crate::config::StrategyConfig;
use crate::{CandleColour, EntryDecision, EntryRationale, ExitLevels, Strategy};

/// Identifier recorded in every rationale produced by [`SimpleMaStrategy`].
pub const STRATEGY_ID: &str = "simple_ma_crossover";

/// Thresholds for [`SimpleMaStrategy`]. Illustrative defaults; production
/// values belong in the strategy config file.
#[derive(Debug, Clone)]
pub struct SimpleMaConfig {
    /// Traded volume must be strictly above this.
    pub min_volume: f64,
    /// Minimum open→LTP move for the bar to count as green (0.005 = 0.5%).
    pub min_gain_pct: f64,
    /// Stop distance below entry (0.02 = 2%).
    pub stop_loss_pct: f64,
    /// Target distance above entry (0.04 = 4%).
    pub target_pct: f64,
    /// Execution window, start inclusive.
    pub window_start: NaiveTime,
    /// Execution window, end exclusive.
    pub window_end: NaiveTime,
    pub sizing: SizingConfig,
}

impl Default for SimpleMaConfig {
    fn default() -> Self {
        Self {
            min_volume: 100_000.0,
            min_gain_pct: 0.005,
            stop_loss_pct: 0.02,
            target_pct: 0.04,
            window_start: NaiveTime::from_hms_opt(15, 29, 40).unwrap_or(NaiveTime::MIN),
            window_end: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN),
            sizing: SizingConfig::default(),
        }
    }
}

impl SimpleMaConfig {
    /// Read thresholds from a strategy's `[strategy.params]` table, falling
    /// back to the defaults for anything not given.
    pub fn from_params(cfg: &StrategyConfig) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            min_volume: cfg.param_f64("min_volume", d.min_volume),
            min_gain_pct: cfg.param_f64("min_gain_pct", d.min_gain_pct),
            stop_loss_pct: cfg.param_f64("stop_loss_pct", d.stop_loss_pct),
            target_pct: cfg.param_f64("target_pct", d.target_pct),
            window_start: cfg.param_time("window_start", d.window_start)?,
            window_end: cfg.param_time("window_end", d.window_end)?,
            sizing: SizingConfig {
                daily_risk_pct: cfg.param_f64("daily_risk_pct", d.sizing.daily_risk_pct),
                default_planned_trades: cfg
                    .param_u64("planned_trades", u64::from(d.sizing.default_planned_trades))
                    .try_into()
                    .unwrap_or(d.sizing.default_planned_trades),
                max_shares_per_trade: cfg
                    .param_u64("max_shares_per_trade", d.sizing.max_shares_per_trade),
            },
        })
    }
}

/// Long-only moving-average strategy.
///
/// Entry: volume above threshold, LTP above the daily moving average, and a
/// green bar (LTP at least `min_gain_pct` above the open).
/// Exit: fixed-percentage stop below and target above the entry.
pub struct SimpleMaStrategy {
    name: String,
    cfg: SimpleMaConfig,
}

impl SimpleMaStrategy {
    pub fn new(name: impl Into<String>, cfg: SimpleMaConfig) -> Self {
        Self {
            name: name.into(),
            cfg,
        }
    }
}

impl Strategy for SimpleMaStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_entry_conditions(
        &self,
        price: &PriceData,
        indicators: &IndicatorSnapshot,
        _timestamp: DateTime<FixedOffset>,
    ) -> EntryDecision {
        let ma = indicators.daily_ma;

        let has_volume = price.volume > self.cfg.min_volume;
        let above_ma = price.ltp > ma;

        let change_pct = if price.open != 0.0 {
            (price.ltp - price.open) / price.open
        } else {
            0.0
        };
        let is_green = change_pct > self.cfg.min_gain_pct;

        EntryDecision {
            eligible: has_volume && above_ma && is_green,
            rationale: EntryRationale {
                strategy: STRATEGY_ID.to_string(),
                ltp: price.ltp,
                ma,
                volume: price.volume,
                change_pct,
                candle: if is_green { CandleColour::Green } else { CandleColour::Red },
            },
        }
    }

    fn calculate_position_size(
        &self,
        entry_price: f64,
        stop_loss: f64,
        account_size: f64,
        planned_trades: i64,
    ) -> u64 {
        position_size(&self.cfg.sizing, entry_price, stop_loss, account_size, planned_trades)
    }

    fn get_exit_levels(&self, entry_price: f64, _price: &PriceData) -> ExitLevels {
        ExitLevels {
            stop_loss: entry_price * (1.0 - self.cfg.stop_loss_pct),
            target: entry_price * (1.0 + self.cfg.target_pct),
        }
    }

    fn check_time_window(&self, timestamp: DateTime<FixedOffset>) -> bool {
        let t = timestamp.time();
        t >= self.cfg.window_start && t < self.cfg.window_end
    }
}
