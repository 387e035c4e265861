use tracing::debug;

use common::{round_to, Candle, Error, IndicatorCache, Result, RollingWindow, Timeframe};
use strategy::indicators::SmaIndicator;

/// Turns an OHLC series into the cached moving-average window for one
/// (instrument, timeframe) pair.
#[derive(Debug, Clone)]
pub struct IndicatorProcessor {
    sma: SmaIndicator,
}

impl IndicatorProcessor {
    pub fn new(long_period: usize) -> Self {
        Self {
            sma: SmaIndicator::new(long_period),
        }
    }

    pub fn long_period(&self) -> usize {
        self.sma.period
    }

    /// Moving average of close for every candle, rounded to 2 decimals, with
    /// 0.0 for bars before the first full window.
    pub fn moving_averages(&self, candles: &[Candle]) -> Result<Vec<f64>> {
        if candles.is_empty() {
            return Err(Error::Indicator("empty candle series".into()));
        }
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        if let Some(pos) = closes.iter().position(|c| !c.is_finite()) {
            return Err(Error::Indicator(format!(
                "non-finite close {} at {}",
                closes[pos], candles[pos].timestamp
            )));
        }

        Ok(self
            .sma
            .series(&closes)
            .into_iter()
            .map(|v| round_to(v, 2))
            .collect())
    }

    /// Replace the cached window for `(key, timeframe)` with the trailing
    /// `long_period` averages of `candles`.
    pub fn process(
        &self,
        cache: &mut IndicatorCache,
        key: &str,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<()> {
        let averages = self.moving_averages(candles)?;
        let window = RollingWindow::from_tail(self.long_period(), averages);
        debug!(%key, %timeframe, len = window.len(), latest = ?window.latest(), "Indicator window updated");
        cache.upsert(key, symbol, timeframe, window);
        Ok(())
    }
}

/// Higher-timeframe series derived from daily candles.
#[derive(Debug, Clone, Default)]
pub struct TimeframeSeries {
    pub weekly: Vec<Candle>,
    pub monthly: Vec<Candle>,
}

/// Weekly/monthly resampling hook. Not implemented: both series come back
/// empty, so only the Daily timeframe is ever cached.
pub fn convert_to_timeframes(_daily: &[Candle]) -> TimeframeSeries {
    TimeframeSeries::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn series(closes: &[f64]) -> Vec<Candle> {
        let start = FixedOffset::east_opt(19_800)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn averages_align_with_input() {
        let p = IndicatorProcessor::new(3);
        let out = p.moving_averages(&series(&[1.0, 2.0, 4.0, 8.0])).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 2.33, 4.67]);
    }

    #[test]
    fn window_length_is_min_of_period_and_candles() {
        let p = IndicatorProcessor::new(100);
        let mut cache = IndicatorCache::new();

        let short: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        p.process(&mut cache, "K", "Short", Timeframe::Daily, &series(&short)).unwrap();
        assert_eq!(cache.window("K", Timeframe::Daily).unwrap().len(), 40);

        let long: Vec<f64> = (0..250).map(|i| 100.0 + i as f64).collect();
        p.process(&mut cache, "K", "Short", Timeframe::Daily, &series(&long)).unwrap();
        let w = cache.window("K", Timeframe::Daily).unwrap();
        assert_eq!(w.len(), 100);
        assert_eq!(w.capacity(), 100);
        // mean of 100 consecutive integers ending at 349 is 299.5
        assert_eq!(w.latest(), Some(299.5));
    }

    #[test]
    fn warmup_values_survive_into_short_windows() {
        let p = IndicatorProcessor::new(5);
        let mut cache = IndicatorCache::new();
        p.process(&mut cache, "K", "Sym", Timeframe::Daily, &series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        assert_eq!(
            cache.window("K", Timeframe::Daily).unwrap().iter().collect::<Vec<_>>(),
            vec![0.0, 0.0, 0.0, 3.0, 4.0]
        );
    }

    #[test]
    fn reprocessing_is_byte_identical() {
        let p = IndicatorProcessor::new(20);
        let closes: Vec<f64> = (0..300).map(|i| 1000.0 + (i as f64 * 0.37).sin() * 25.0).collect();
        let candles = series(&closes);

        let mut a = IndicatorCache::new();
        let mut b = IndicatorCache::new();
        p.process(&mut a, "K", "Sym", Timeframe::Daily, &candles).unwrap();
        p.process(&mut b, "K", "Sym", Timeframe::Daily, &candles).unwrap();
        p.process(&mut b, "K", "Sym", Timeframe::Daily, &candles).unwrap();

        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
    }

    #[test]
    fn malformed_series_is_an_indicator_error() {
        let p = IndicatorProcessor::new(3);
        let mut cache = IndicatorCache::new();
        assert!(matches!(
            p.process(&mut cache, "K", "Sym", Timeframe::Daily, &[]),
            Err(Error::Indicator(_))
        ));
        assert!(matches!(
            p.process(&mut cache, "K", "Sym", Timeframe::Daily, &series(&[1.0, f64::NAN])),
            Err(Error::Indicator(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn higher_timeframes_are_not_resampled() {
        let converted = convert_to_timeframes(&series(&[1.0, 2.0, 3.0]));
        assert!(converted.weekly.is_empty());
        assert!(converted.monthly.is_empty());
    }
}
