use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveTime, Weekday};
use tracing::{debug, info, warn};

use common::{Candle, Error, MarketDataClient, Result};

/// Backfill parameters for [`HistoryFetcher`].
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// First date requested for every instrument.
    pub start: NaiveDate,
    /// Longest range the upstream accepts in one request.
    pub max_window_years: u32,
    /// Exchange-local time after which today's candle is final.
    pub market_close: NaiveTime,
}

/// One inclusive date range requested from the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Tile `[start, end]` into consecutive inclusive windows of at most
/// `max_years` calendar years each. Every window starts the day after the
/// previous one ends and the last one ends exactly on `end`.
pub fn date_windows(start: NaiveDate, end: NaiveDate, max_years: u32) -> Vec<DateWindow> {
    let span = Months::new(max_years.max(1) * 12);
    let mut windows = Vec::new();
    let mut from = start;

    while from <= end {
        let to = from.checked_add_months(span).map_or(end, |d| d.min(end));
        windows.push(DateWindow { from, to });
        match to.checked_add_days(Days::new(1)) {
            Some(next) => from = next,
            None => break,
        }
    }
    windows
}

/// True on a weekday once the market has closed, i.e. when today's candle is
/// final and worth appending to the daily history.
pub fn should_use_intraday(now: DateTime<FixedOffset>, market_close: NaiveTime) -> bool {
    let is_weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    is_weekday && now.time() >= market_close
}

/// Append `intraday` candles to a sorted daily `history`, skipping any candle
/// whose date is already present. Returns how many candles were appended.
pub fn merge_intraday(history: &mut Vec<Candle>, mut intraday: Vec<Candle>) -> usize {
    let known: HashSet<NaiveDate> = history.iter().map(Candle::date).collect();
    intraday.retain(|c| !known.contains(&c.date()));
    intraday.sort_by_key(|c| c.timestamp);
    intraday.dedup_by_key(|c| c.date());

    let appended = intraday.len();
    history.extend(intraday);
    history.sort_by_key(|c| c.timestamp);
    appended
}

/// Retrieves an instrument's full daily candle history, tiled into windows
/// the upstream service accepts.
pub struct HistoryFetcher {
    client: Arc<dyn MarketDataClient>,
    cfg: HistoryConfig,
}

impl HistoryFetcher {
    pub fn new(client: Arc<dyn MarketDataClient>, cfg: HistoryConfig) -> Self {
        Self { client, cfg }
    }

    /// Every daily candle from the configured start through the date of `now`,
    /// sorted and deduplicated by timestamp.
    ///
    /// A failed window stops the tiling but keeps what was already fetched.
    /// Fails with [`Error::NoData`] only when nothing at all was fetched.
    /// After market close on weekdays today's candle is appended from the
    /// intraday endpoint; failures there are logged and ignored.
    pub async fn fetch(&self, instrument_key: &str, now: DateTime<FixedOffset>) -> Result<Vec<Candle>> {
        let today = now.date_naive();
        let mut candles: Vec<Candle> = Vec::new();

        for window in date_windows(self.cfg.start, today, self.cfg.max_window_years) {
            match self
                .client
                .historical_candles(instrument_key, window.from, window.to)
                .await
            {
                Ok(batch) => {
                    debug!(
                        %instrument_key,
                        from = %window.from,
                        to = %window.to,
                        count = batch.len(),
                        "Fetched history window"
                    );
                    candles.extend(batch);
                }
                Err(e) => {
                    warn!(
                        %instrument_key,
                        from = %window.from,
                        to = %window.to,
                        error = %e,
                        "History window failed, stopping backfill"
                    );
                    break;
                }
            }
        }

        if candles.is_empty() {
            return Err(Error::NoData(instrument_key.to_string()));
        }

        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);

        if should_use_intraday(now, self.cfg.market_close) {
            match self.client.intraday_candles(instrument_key).await {
                Ok(intraday) if !intraday.is_empty() => {
                    let appended = merge_intraday(&mut candles, intraday);
                    debug!(%instrument_key, appended, "Merged intraday candles");
                }
                Ok(_) => debug!(%instrument_key, "No intraday candles for today"),
                Err(e) => warn!(%instrument_key, error = %e, "Current day data unavailable"),
            }
        }

        info!(%instrument_key, count = candles.len(), "History fetched");
        Ok(candles)
    }
}
