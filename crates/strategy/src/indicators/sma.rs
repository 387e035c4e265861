/// Simple moving average over a fixed number of periods.
///
/// Unlike a streaming indicator this produces one value per input bar, so the
/// output lines up index-for-index with the price series. Bars before the
/// first full window get `fallback` instead of being dropped.
#[derive(Debug, Clone)]
pub struct SmaIndicator {
    pub period: usize,
    pub fallback: f64,
}

impl SmaIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            fallback: 0.0,
        }
    }

    /// Moving average for every position of `values` (oldest first).
    /// The output always has the same length as the input.
    pub fn series(&self, values: &[f64]) -> Vec<f64> {
        let n = self.period;
        (0..values.len())
            .map(|i| {
                if i + 1 < n {
                    self.fallback
                } else {
                    values[i + 1 - n..=i].iter().sum::<f64>() / n as f64
                }
            })
            .collect()
    }
}
