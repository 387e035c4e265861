use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::Error;

/// One OHLCV bar. Timestamps carry the exchange's UTC offset as returned by
/// the upstream API (e.g. `2024-06-03T00:00:00+05:30`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<FixedOffset>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Exchange-local calendar date of this bar.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A row of the market-reference table.
///
/// Field names follow the CSV headers of `market_cap.csv`. `LTP` and `MCAP`
/// may be blank for instruments that have never been fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    #[serde(rename = "Security Name")]
    pub name: String,
    /// Exchange-qualified key, e.g. `NSE_EQ|INE002A01018`.
    #[serde(rename = "Instrument Key")]
    pub key: String,
    #[serde(rename = "No of shares")]
    pub shares: f64,
    #[serde(rename = "LTP", default, deserialize_with = "csv::invalid_option")]
    pub ltp: Option<f64>,
    #[serde(rename = "MCAP", default, deserialize_with = "csv::invalid_option")]
    pub mcap: Option<f64>,
}

impl Instrument {
    /// Set the last traded price and recompute market cap from it.
    pub fn update_ltp(&mut self, ltp: f64) {
        self.ltp = Some(ltp);
        self.mcap = Some(self.shares * ltp);
    }
}

/// Aggregation granularity of an indicator window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Other(format!("unknown timeframe '{s}'")))
    }
}

/// Live price fields handed to a strategy at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceData {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Last traded price.
    pub ltp: f64,
}

/// Indicator values for one instrument, read out of the indicator cache.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub daily_ma: f64,
    pub weekly_ma: Option<f64>,
    pub monthly_ma: Option<f64>,
}

/// Round to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}
