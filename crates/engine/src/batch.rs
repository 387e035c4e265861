use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, Utc};
use futures_util::{stream, StreamExt};
use tracing::{debug, error, info, warn};

use common::{Error, IndicatorCache, Instrument, Result, Timeframe};

use crate::history::HistoryFetcher;
use crate::processor::{convert_to_timeframes, IndicatorProcessor};
use crate::store::{CacheStore, InstrumentTable};

/// Accumulator for one batch run. Built fresh by every call to
/// [`BatchOrchestrator::process_all`]; nothing carries over between runs.
#[derive(Debug, Default)]
pub struct BatchRun {
    pub cache: IndicatorCache,
    /// Instruments whose fetch failed, keyed by display name.
    pub errors: BTreeMap<String, String>,
    /// Indicator computations skipped, keyed by `"<name> (<timeframe>)"`.
    pub indicator_errors: BTreeMap<String, String>,
    pub total: usize,
    pub processed: usize,
}

/// What a finished batch reports back.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub total: usize,
    pub processed: usize,
    pub cached_instruments: usize,
    pub errors: BTreeMap<String, String>,
    pub indicator_errors: BTreeMap<String, String>,
    pub save_errors: Vec<String>,
}

impl RunReport {
    pub fn log_summary(&self) {
        info!(
            processed = self.processed,
            total = self.total,
            cached = self.cached_instruments,
            errors = self.errors.len(),
            "Processing complete"
        );
        for (name, err) in &self.errors {
            warn!(instrument = %name, error = %err, "Failed instrument");
        }
        for (name, err) in &self.indicator_errors {
            warn!(instrument = %name, error = %err, "Indicator update skipped");
        }
        for err in &self.save_errors {
            error!(error = %err, "Save failed");
        }
    }
}

/// Result of the fetch/compute path for a single instrument.
struct InstrumentUpdate {
    last_close: f64,
    indicators: IndicatorCache,
    indicator_errors: Vec<(Timeframe, String)>,
}

/// Drives History Fetcher → Indicator Processor across every instrument in the
/// reference table, then persists the table and the indicator cache.
pub struct BatchOrchestrator {
    fetcher: HistoryFetcher,
    processor: IndicatorProcessor,
    concurrency: usize,
}

impl BatchOrchestrator {
    /// `concurrency` bounds how many instruments are in flight at once;
    /// 1 processes them strictly one after another.
    pub fn new(fetcher: HistoryFetcher, processor: IndicatorProcessor, concurrency: usize) -> Self {
        Self {
            fetcher,
            processor,
            concurrency: concurrency.max(1),
        }
    }

    /// Process every instrument, persist the results, and report.
    /// Save failures are reported but do not discard the in-memory results.
    pub async fn run(
        &self,
        table: &mut InstrumentTable,
        store: &CacheStore,
        now: DateTime<FixedOffset>,
    ) -> RunReport {
        let mut run = self.process_all(table, now).await;
        let mut save_errors = Vec::new();

        match table.save() {
            Ok(()) => info!("Market cap file updated"),
            Err(e) => {
                error!(error = %e, path = %table.path().display(), "Failed to save instrument table");
                save_errors.push(format!("instrument table: {e}"));
            }
        }

        run.cache.last_run = Some(now.with_timezone(&Utc));
        if let Err(e) = store.save(&run.cache).await {
            error!(error = %e, "Failed to save indicator cache");
            save_errors.push(format!("indicator cache: {e}"));
        }

        RunReport {
            total: run.total,
            processed: run.processed,
            cached_instruments: run.cache.len(),
            errors: run.errors,
            indicator_errors: run.indicator_errors,
            save_errors,
        }
    }

    /// Fetch and compute indicators for every instrument in `table`, updating
    /// LTP and market cap in place. Each display name is fetched once; when a
    /// name repeats, the last row's key is used and every row with that name
    /// receives the result.
    pub async fn process_all(&self, table: &mut InstrumentTable, now: DateTime<FixedOffset>) -> BatchRun {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut instruments: Vec<Instrument> = Vec::new();
        for inst in &table.instruments {
            match slots.get(&inst.name) {
                Some(&slot) => {
                    warn!(instrument = %inst.name, key = %inst.key, "Duplicate instrument name, later key wins");
                    instruments[slot] = inst.clone();
                }
                None => {
                    slots.insert(inst.name.clone(), instruments.len());
                    instruments.push(inst.clone());
                }
            }
        }

        let total = instruments.len();
        info!(total, concurrency = self.concurrency, "Processing instruments");

        let outcomes: Vec<(String, Result<InstrumentUpdate>)> = stream::iter(instruments.into_iter().enumerate())
            .map(|(idx, inst)| async move {
                info!(progress = %format!("{}/{}", idx + 1, total), instrument = %inst.name, "Fetching");
                let result = self.process_instrument(&inst, now).await;
                (inst.name, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut run = BatchRun {
            total,
            ..BatchRun::default()
        };

        for (name, result) in outcomes {
            match result {
                Ok(update) => {
                    for inst in table.rows_named_mut(&name) {
                        inst.update_ltp(update.last_close);
                    }
                    run.cache.merge(update.indicators);
                    for (timeframe, err) in update.indicator_errors {
                        run.indicator_errors.insert(format!("{name} ({timeframe})"), err);
                    }
                    run.processed += 1;
                }
                Err(e) => {
                    error!(instrument = %name, error = %e, "Instrument failed");
                    run.errors.insert(name, e.to_string());
                }
            }
        }

        run
    }

    async fn process_instrument(&self, inst: &Instrument, now: DateTime<FixedOffset>) -> Result<InstrumentUpdate> {
        let candles = self.fetcher.fetch(&inst.key, now).await?;
        let last_close = candles
            .last()
            .map(|c| c.close)
            .ok_or_else(|| Error::NoData(inst.key.clone()))?;

        let mut indicators = IndicatorCache::new();
        let mut indicator_errors = Vec::new();

        let higher = convert_to_timeframes(&candles);
        let series = [
            (Timeframe::Daily, candles.as_slice()),
            (Timeframe::Weekly, higher.weekly.as_slice()),
            (Timeframe::Monthly, higher.monthly.as_slice()),
        ];

        for (timeframe, bars) in series {
            if bars.is_empty() {
                debug!(instrument = %inst.name, %timeframe, "No candles for timeframe");
                continue;
            }
            if let Err(e) = self
                .processor
                .process(&mut indicators, &inst.key, &inst.name, timeframe, bars)
            {
                warn!(instrument = %inst.name, %timeframe, error = %e, "Indicator processing failed");
                indicator_errors.push((timeframe, e.to_string()));
            }
        }

        info!(instrument = %inst.name, candles = candles.len(), ltp = last_close, "Processed");
        Ok(InstrumentUpdate {
            last_close,
            indicators,
            indicator_errors,
        })
    }
}
