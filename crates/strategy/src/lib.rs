pub mod config;
pub mod indicators;
pub mod registry;
pub mod simple_ma;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use registry::StrategyRegistry;
pub use simple_ma::{SimpleMaConfig, SimpleMaStrategy};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{IndicatorSnapshot, PriceData};

/// All strategy implementations must satisfy this trait.
///
/// Every operation is a pure function of its arguments: no call mutates
/// strategy state, so identical inputs always give identical decisions.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Decide whether the current bar qualifies for an entry.
    fn validate_entry_conditions(
        &self,
        price: &PriceData,
        indicators: &IndicatorSnapshot,
        timestamp: DateTime<FixedOffset>,
    ) -> EntryDecision;

    /// Shares to buy for a trade entered at `entry_price` with `stop_loss`.
    /// Returns 0 when the stop placement is invalid.
    fn calculate_position_size(
        &self,
        entry_price: f64,
        stop_loss: f64,
        account_size: f64,
        planned_trades: i64,
    ) -> u64;

    /// Stop-loss and target for a long entry at `entry_price`.
    fn get_exit_levels(&self, entry_price: f64, price: &PriceData) -> ExitLevels;

    /// Whether `timestamp` (exchange-local) falls inside the execution window.
    /// Callers must not enter outside it.
    fn check_time_window(&self, timestamp: DateTime<FixedOffset>) -> bool;
}

/// Colour of the current bar as classified by the entry rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColour {
    Green,
    Red,
}

/// The values an entry decision was based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRationale {
    pub strategy: String,
    pub ltp: f64,
    pub ma: f64,
    pub volume: f64,
    /// Fractional move from open to LTP (0.01 = 1%).
    pub change_pct: f64,
    pub candle: CandleColour,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDecision {
    pub eligible: bool,
    pub rationale: EntryRationale,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitLevels {
    pub stop_loss: f64,
    pub target: f64,
}

/// A fully evaluated entry: what to buy, how much, and where to exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub strategy: String,
    pub entry_price: f64,
    pub quantity: u64,
    pub exits: ExitLevels,
    pub rationale: EntryRationale,
}

/// Run the four contract operations in the order an engine must apply them:
/// time gate, entry rules, exit levels, then sizing against the stop.
///
/// Returns `None` outside the execution window, when the entry rules fail, or
/// when the position sizes to zero shares. Entry is assumed at `price.ltp`.
pub fn plan_entry(
    strategy: &dyn Strategy,
    price: &PriceData,
    indicators: &IndicatorSnapshot,
    timestamp: DateTime<FixedOffset>,
    account_size: f64,
    planned_trades: i64,
) -> Option<TradePlan> {
    if !strategy.check_time_window(timestamp) {
        return None;
    }

    let decision = strategy.validate_entry_conditions(price, indicators, timestamp);
    if !decision.eligible {
        debug!(strategy = %strategy.name(), rationale = ?decision.rationale, "Entry rejected");
        return None;
    }

    let entry_price = price.ltp;
    let exits = strategy.get_exit_levels(entry_price, price);
    let quantity =
        strategy.calculate_position_size(entry_price, exits.stop_loss, account_size, planned_trades);
    if quantity == 0 {
        debug!(strategy = %strategy.name(), entry_price, stop_loss = exits.stop_loss, "Entry sized to zero");
        return None;
    }

    Some(TradePlan {
        strategy: strategy.name().to_string(),
        entry_price,
        quantity,
        exits,
        rationale: decision.rationale,
    })
}
