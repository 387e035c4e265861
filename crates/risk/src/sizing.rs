use serde::{Deserialize, Serialize};
use tracing::debug;

/// User-configurable position sizing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Fraction of capital at risk across the whole day (e.g. 0.01 = 1%).
    pub daily_risk_pct: f64,
    /// Trade count assumed when the caller passes zero or a negative count.
    pub default_planned_trades: u32,
    /// Absolute cap on shares bought in a single trade.
    pub max_shares_per_trade: u64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            daily_risk_pct: 0.01,
            default_planned_trades: 5,
            max_shares_per_trade: 100,
        }
    }
}

/// Number of shares to buy so that hitting `stop_loss` loses at most this
/// trade's share of the daily risk budget.
///
/// The result is the smallest of:
/// - the risk-based quantity `floor(risk_amount / (entry - stop_loss))`,
/// - what `account_size` can afford at `entry_price`,
/// - `max_shares_per_trade`.
///
/// A stop at or above entry is an invalid placement and sizes to zero.
pub fn position_size(
    cfg: &SizingConfig,
    entry_price: f64,
    stop_loss: f64,
    account_size: f64,
    planned_trades: i64,
) -> u64 {
    let planned = if planned_trades <= 0 {
        i64::from(cfg.default_planned_trades.max(1))
    } else {
        planned_trades
    };

    let risk_amount = account_size * (cfg.daily_risk_pct / planned as f64);
    let risk_per_share = entry_price - stop_loss;

    if risk_per_share.is_nan() || risk_per_share <= 0.0 || entry_price <= 0.0 || risk_amount <= 0.0 {
        debug!(entry_price, stop_loss, account_size, "Position size is zero");
        return 0;
    }

    let risk_qty = floor_shares(risk_amount / risk_per_share);
    let capital_qty = floor_shares(account_size / entry_price);

    risk_qty.min(capital_qty).min(cfg.max_shares_per_trade)
}

/// Whole shares in `raw`, saturating on non-finite or huge values.
fn floor_shares(raw: f64) -> u64 {
    if raw.is_nan() || raw <= 0.0 {
        0
    } else {
        // `as` saturates at u64::MAX for +inf and out-of-range values
        raw.floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_percent_daily_risk_split_over_five_trades() {
        // risk = 100000 * 0.01 / 5 = 200; per-share = 2 → 100; capital → 1000; cap 100
        let qty = position_size(&SizingConfig::default(), 100.0, 98.0, 100_000.0, 5);
        assert_eq!(qty, 100);
    }

    #[test]
    fn stop_at_entry_sizes_to_zero() {
        assert_eq!(position_size(&SizingConfig::default(), 100.0, 100.0, 100_000.0, 5), 0);
    }

    #[test]
    fn stop_above_entry_sizes_to_zero() {
        assert_eq!(position_size(&SizingConfig::default(), 100.0, 101.0, 100_000.0, 5), 0);
    }

    #[test]
    fn non_positive_planned_trades_uses_default() {
        let cfg = SizingConfig {
            max_shares_per_trade: 10_000,
            ..SizingConfig::default()
        };
        let with_default = position_size(&cfg, 100.0, 90.0, 100_000.0, 5);
        assert_eq!(position_size(&cfg, 100.0, 90.0, 100_000.0, 0), with_default);
        assert_eq!(position_size(&cfg, 100.0, 90.0, 100_000.0, -3), with_default);
        // 1000 / 5 = 200 at risk, 10 per share
        assert_eq!(with_default, 20);
    }

    #[test]
    fn capital_limits_expensive_entries() {
        let cfg = SizingConfig {
            max_shares_per_trade: 1_000,
            ..SizingConfig::default()
        };
        // risk-based: 200 / 0.5 = 400; capital: 100000 / 2000 = 50
        assert_eq!(position_size(&cfg, 2_000.0, 1_999.5, 100_000.0, 5), 50);
    }

    #[test]
    fn risk_budget_limits_wide_stops() {
        let cfg = SizingConfig::default();
        // 200 at risk, 50 per share → 4
        assert_eq!(position_size(&cfg, 100.0, 50.0, 100_000.0, 5), 4);
    }

    #[test]
    fn zero_entry_price_sizes_to_zero() {
        assert_eq!(position_size(&SizingConfig::default(), 0.0, -1.0, 100_000.0, 5), 0);
    }
}
