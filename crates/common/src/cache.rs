use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IndicatorSnapshot, Timeframe};

/// Fixed-capacity FIFO of the most recent indicator values (oldest first).
///
/// Pushing onto a full window evicts the oldest value, so `len() <= capacity()`
/// always holds. Deserialization re-applies the capacity to the stored values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WindowRepr")]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

#[derive(Deserialize)]
struct WindowRepr {
    capacity: usize,
    values: Vec<f64>,
}

impl From<WindowRepr> for RollingWindow {
    fn from(repr: WindowRepr) -> Self {
        RollingWindow::from_tail(repr.capacity, repr.values)
    }
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Build a window holding the last `capacity` items of `values`.
    pub fn from_tail(capacity: usize, values: impl IntoIterator<Item = f64>) -> Self {
        let mut window = Self::new(capacity);
        for v in values {
            window.push(v);
        }
        window
    }

    /// Append `value`, returning the evicted oldest value if the window was full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.capacity == 0 {
            return Some(value);
        }
        let evicted = if self.values.len() == self.capacity {
            self.values.pop_front()
        } else {
            None
        };
        self.values.push_back(value);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent value.
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// Cached indicator state for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentIndicators {
    /// Display name of the instrument.
    pub symbol: String,
    /// Moving-average window per timeframe.
    pub moving_averages: BTreeMap<Timeframe, RollingWindow>,
}

/// The indicator cache: instrument key → per-timeframe moving-average windows.
///
/// Ordered maps keep serialization deterministic, so re-running the pipeline on
/// unchanged data produces identical snapshots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorCache {
    /// When the batch that produced this cache last completed.
    pub last_run: Option<DateTime<Utc>>,
    pub instruments: BTreeMap<String, InstrumentIndicators>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the window for `(key, timeframe)`, creating the instrument entry
    /// with `symbol` if it does not exist yet.
    pub fn upsert(&mut self, key: &str, symbol: &str, timeframe: Timeframe, window: RollingWindow) {
        let entry = self
            .instruments
            .entry(key.to_string())
            .or_insert_with(|| InstrumentIndicators {
                symbol: symbol.to_string(),
                moving_averages: BTreeMap::new(),
            });
        entry.moving_averages.insert(timeframe, window);
    }

    pub fn window(&self, key: &str, timeframe: Timeframe) -> Option<&RollingWindow> {
        self.instruments
            .get(key)
            .and_then(|e| e.moving_averages.get(&timeframe))
    }

    pub fn get(&self, key: &str) -> Option<&InstrumentIndicators> {
        self.instruments.get(key)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Fold every window of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: IndicatorCache) {
        for (key, entry) in other.instruments {
            for (timeframe, window) in entry.moving_averages {
                self.upsert(&key, &entry.symbol, timeframe, window);
            }
        }
    }

    /// Typed view for strategies. `None` when no daily window is cached.
    pub fn snapshot(&self, key: &str) -> Option<IndicatorSnapshot> {
        let latest = |tf| self.window(key, tf).and_then(RollingWindow::latest);
        Some(IndicatorSnapshot {
            daily_ma: latest(Timeframe::Daily)?,
            weekly_ma: latest(Timeframe::Weekly),
            monthly_ma: latest(Timeframe::Monthly),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_when_full() {
        let mut w = RollingWindow::new(3);
        assert_eq!(w.push(1.0), None);
        assert_eq!(w.push(2.0), None);
        assert_eq!(w.push(3.0), None);
        assert_eq!(w.push(4.0), Some(1.0));
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(w.len(), 3);
        assert_eq!(w.latest(), Some(4.0));
    }

    #[test]
    fn from_tail_keeps_last_values() {
        let w = RollingWindow::from_tail(2, [1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![4.0, 5.0]);
        assert_eq!(w.capacity(), 2);
    }

    #[test]
    fn zero_capacity_window_stays_empty() {
        let mut w = RollingWindow::new(0);
        assert_eq!(w.push(7.0), Some(7.0));
        assert!(w.is_empty());
    }

    #[test]
    fn deserialization_reapplies_capacity() {
        let json = r#"{"capacity":2,"values":[1.0,2.0,3.0]}"#;
        let w: RollingWindow = serde_json::from_str(json).unwrap();
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![2.0, 3.0]);
    }

    #[test]
    fn upsert_overwrites_window_and_keeps_symbol() {
        let mut cache = IndicatorCache::new();
        cache.upsert("NSE_EQ|A", "Alpha", Timeframe::Daily, RollingWindow::from_tail(2, [1.0]));
        cache.upsert("NSE_EQ|A", "Renamed", Timeframe::Daily, RollingWindow::from_tail(2, [5.0, 6.0]));

        let entry = cache.get("NSE_EQ|A").unwrap();
        assert_eq!(entry.symbol, "Alpha");
        assert_eq!(entry.moving_averages.len(), 1);
        assert_eq!(cache.window("NSE_EQ|A", Timeframe::Daily).unwrap().iter().collect::<Vec<_>>(), vec![5.0, 6.0]);
    }

    #[test]
    fn snapshot_requires_daily_window() {
        let mut cache = IndicatorCache::new();
        assert!(cache.snapshot("NSE_EQ|A").is_none());

        cache.upsert("NSE_EQ|A", "Alpha", Timeframe::Daily, RollingWindow::from_tail(3, [1.0, 2.5]));
        let snap = cache.snapshot("NSE_EQ|A").unwrap();
        assert_eq!(snap.daily_ma, 2.5);
        assert_eq!(snap.weekly_ma, None);
        assert_eq!(snap.monthly_ma, None);
    }

    #[test]
    fn merge_combines_instruments() {
        let mut a = IndicatorCache::new();
        a.upsert("K1", "One", Timeframe::Daily, RollingWindow::from_tail(1, [1.0]));
        let mut b = IndicatorCache::new();
        b.upsert("K2", "Two", Timeframe::Daily, RollingWindow::from_tail(1, [2.0]));
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.snapshot("K2").unwrap().daily_ma, 2.0);
    }

    #[test]
    fn cache_json_is_deterministic() {
        let build = || {
            let mut c = IndicatorCache::new();
            c.upsert("K2", "Two", Timeframe::Daily, RollingWindow::from_tail(2, [1.0, 2.0]));
            c.upsert("K1", "One", Timeframe::Daily, RollingWindow::from_tail(2, [3.0]));
            c
        };
        let a = serde_json::to_string(&build()).unwrap();
        let b = serde_json::to_string(&build()).unwrap();
        assert_eq!(a, b);
    }
}
