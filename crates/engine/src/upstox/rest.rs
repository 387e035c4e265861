use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::{Candle, Error, MarketDataClient, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.upstox.com";

/// REST client for the Upstox v3 historical-candle API.
pub struct UpstoxClient {
    base_url: String,
    access_token: String,
    http: Client,
}

impl UpstoxClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            http,
        })
    }

    pub fn historical_url(&self, instrument_key: &str, from: NaiveDate, to: NaiveDate) -> Result<String> {
        Ok(format!(
            "{}/v3/historical-candle/{}/days/1/{}/{}",
            self.base_url,
            encode_instrument_key(instrument_key)?,
            to.format("%Y-%m-%d"),
            from.format("%Y-%m-%d"),
        ))
    }

    pub fn intraday_url(&self, instrument_key: &str) -> Result<String> {
        Ok(format!(
            "{}/v3/historical-candle/intraday/{}/days/1",
            self.base_url,
            encode_instrument_key(instrument_key)?,
        ))
    }

    async fn authed_get(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Upstream(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataClient for UpstoxClient {
    async fn historical_candles(
        &self,
        instrument_key: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candle>> {
        let url = self.historical_url(instrument_key, from, to)?;
        debug!(%instrument_key, %from, %to, "Requesting historical candles");
        let body = self.authed_get(&url).await?;
        parse_candles(&body)
    }

    async fn intraday_candles(&self, instrument_key: &str) -> Result<Vec<Candle>> {
        let url = self.intraday_url(instrument_key)?;
        debug!(%instrument_key, "Requesting intraday candles");
        let body = self.authed_get(&url).await?;
        parse_candles(&body)
    }
}

/// Path form of an exchange-qualified key: `NSE_EQ|INE002A01018` →
/// `NSE_EQ%7CINE002A01018`.
pub fn encode_instrument_key(instrument_key: &str) -> Result<String> {
    match instrument_key.split_once('|') {
        Some((segment, code)) if !segment.is_empty() && !code.is_empty() && !code.contains('|') => {
            Ok(format!("{segment}%7C{code}"))
        }
        _ => Err(Error::InvalidInstrument(instrument_key.to_string())),
    }
}

/// Parse a candle envelope. Each row is
/// `[timestamp, open, high, low, close, volume, open_interest]`; the trailing
/// open-interest column is dropped.
pub fn parse_candles(body: &str) -> Result<Vec<Candle>> {
    let envelope: CandleEnvelope = serde_json::from_str(body)?;
    let rows = envelope.data.map(|d| d.candles).unwrap_or_default();
    rows.iter().map(|row| parse_row(row)).collect()
}

fn parse_row(row: &[Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(Error::Upstream(format!(
            "candle row has {} columns, expected at least 6",
            row.len()
        )));
    }

    let ts = row[0]
        .as_str()
        .ok_or_else(|| Error::Upstream(format!("candle timestamp is not a string: {}", row[0])))?;
    let timestamp = DateTime::parse_from_rfc3339(ts)
        .map_err(|e| Error::Upstream(format!("invalid candle timestamp '{ts}': {e}")))?;

    let num = |idx: usize, field: &str| {
        row[idx]
            .as_f64()
            .ok_or_else(|| Error::Upstream(format!("candle {field} is not a number: {}", row[idx])))
    };

    Ok(Candle {
        timestamp,
        open: num(1, "open")?,
        high: num(2, "high")?,
        low: num(3, "low")?,
        close: num(4, "close")?,
        volume: num(5, "volume")?,
    })
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CandleEnvelope {
    #[serde(default)]
    data: Option<CandleData>,
}

#[derive(Deserialize)]
struct CandleData {
    #[serde(default)]
    candles: Vec<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> UpstoxClient {
        UpstoxClient::new("https://example.test/", "token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn encodes_exchange_separator() {
        assert_eq!(
            encode_instrument_key("NSE_EQ|INE002A01018").unwrap(),
            "NSE_EQ%7CINE002A01018"
        );
        assert!(encode_instrument_key("INE002A01018").is_err());
        assert!(encode_instrument_key("NSE_EQ|").is_err());
        assert!(encode_instrument_key("A|B|C").is_err());
    }

    #[test]
    fn historical_url_puts_to_date_first() {
        let from = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
        let to = NaiveDate::from_ymd_opt(2010, 1, 3).unwrap();
        assert_eq!(
            client().historical_url("NSE_EQ|INE002A01018", from, to).unwrap(),
            "https://example.test/v3/historical-candle/NSE_EQ%7CINE002A01018/days/1/2010-01-03/2000-01-03"
        );
    }

    #[test]
    fn intraday_url_shape() {
        assert_eq!(
            client().intraday_url("NSE_EQ|INE002A01018").unwrap(),
            "https://example.test/v3/historical-candle/intraday/NSE_EQ%7CINE002A01018/days/1"
        );
    }

    #[test]
    fn parses_candles_and_drops_open_interest() {
        let body = r#"{
            "status": "success",
            "data": {
                "candles": [
                    ["2024-06-04T00:00:00+05:30", 2900.0, 2950.5, 2880.0, 2931.2, 1234567, 0],
                    ["2024-06-03T00:00:00+05:30", 2850, 2910.0, 2840.0, 2899.9, 987654, 0]
                ]
            }
        }"#;
        let candles = parse_candles(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 2931.2);
        assert_eq!(candles[0].volume, 1_234_567.0);
        assert_eq!(candles[1].open, 2850.0);
        assert_eq!(candles[1].date(), NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    }

    #[test]
    fn missing_candles_means_empty() {
        assert!(parse_candles(r#"{"status":"success","data":{}}"#).unwrap().is_empty());
        assert!(parse_candles(r#"{"status":"success"}"#).unwrap().is_empty());
    }

    #[test]
    fn short_rows_are_rejected() {
        let body = r#"{"data":{"candles":[["2024-06-03T00:00:00+05:30", 1.0, 2.0]]}}"#;
        assert!(matches!(parse_candles(body), Err(Error::Upstream(_))));
    }
}
