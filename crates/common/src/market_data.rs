use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{Candle, Result};

/// Abstraction over the upstream market-data service.
///
/// `UpstoxClient` in `crates/engine` implements this against the REST API.
/// Tests substitute in-memory fakes so the history fetcher can be exercised
/// without the network.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Daily candles for `instrument_key` between `from` and `to`, inclusive.
    /// The upstream service rejects ranges longer than ten years.
    async fn historical_candles(
        &self,
        instrument_key: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candle>>;

    /// Candles for the current trading day.
    async fn intraday_candles(&self, instrument_key: &str) -> Result<Vec<Candle>>;
}
