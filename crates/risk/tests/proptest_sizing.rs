use proptest::prelude::*;
use risk::{position_size, SizingConfig};

proptest! {
    /// Sizing on randomized f64 inputs must never panic and never exceed any cap.
    #[test]
    fn position_size_respects_every_cap(
        entry_price in 0.01f64..1_000_000.0f64,
        stop_offset in -1_000.0f64..1_000.0f64,
        account_size in 0.0f64..10_000_000.0f64,
        planned_trades in -10i64..50i64,
        max_shares in 1u64..10_000u64,
    ) {
        let cfg = SizingConfig {
            daily_risk_pct: 0.01,
            default_planned_trades: 5,
            max_shares_per_trade: max_shares,
        };
        let stop_loss = entry_price - stop_offset;
        let qty = position_size(&cfg, entry_price, stop_loss, account_size, planned_trades);

        prop_assert!(qty <= max_shares);
        prop_assert!(qty as f64 <= (account_size / entry_price).floor());
        if stop_offset <= 0.0 {
            prop_assert_eq!(qty, 0);
        } else {
            let trades = if planned_trades <= 0 { 5 } else { planned_trades };
            let risk_amount = account_size * (0.01 / trades as f64);
            prop_assert!(qty as f64 * stop_offset <= risk_amount + 1e-6);
        }
    }

    /// Tightening the stop can only keep or grow the position.
    #[test]
    fn tighter_stop_never_shrinks_position(
        entry_price in 1.0f64..10_000.0f64,
        wide in 0.5f64..0.9f64,
        account_size in 1_000.0f64..1_000_000.0f64,
    ) {
        let cfg = SizingConfig { max_shares_per_trade: u64::MAX, ..SizingConfig::default() };
        let wide_stop = entry_price * wide;
        let tight_stop = entry_price * (wide + 0.05);
        let wide_qty = position_size(&cfg, entry_price, wide_stop, account_size, 5);
        let tight_qty = position_size(&cfg, entry_price, tight_stop, account_size, 5);
        prop_assert!(tight_qty >= wide_qty);
    }
}
