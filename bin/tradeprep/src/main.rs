use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MarketDataClient};
use engine::{
    BatchOrchestrator, CacheStore, HistoryConfig, HistoryFetcher, IndicatorProcessor, InstrumentTable,
    UpstoxClient,
};
use strategy::StrategyRegistry;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        market_cap_file = %cfg.market_cap_file.display(),
        long_ma_period = cfg.long_ma_period,
        concurrency = cfg.fetch_concurrency,
        "TradePrep starting"
    );

    // ── Strategies ────────────────────────────────────────────────────────────
    // Startup check only: an invalid strategy file aborts before any fetch.
    let registry = StrategyRegistry::load(&cfg.strategy_config_path)
        .unwrap_or_else(|e| panic!("Invalid strategy config: {e}"));
    if registry.is_empty() {
        warn!(path = %cfg.strategy_config_path, "No strategies configured");
    }

    // ── Upstream client ───────────────────────────────────────────────────────
    let client: Arc<dyn MarketDataClient> = Arc::new(
        UpstoxClient::new(
            &cfg.upstox_base_url,
            &cfg.upstox_access_token,
            Duration::from_secs(cfg.http_timeout_secs),
        )
        .unwrap_or_else(|e| panic!("Failed to build Upstox client: {e}")),
    );

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let fetcher = HistoryFetcher::new(
        client,
        HistoryConfig {
            start: cfg.history_start,
            max_window_years: cfg.max_window_years,
            market_close: cfg.market_close,
        },
    );
    let processor = IndicatorProcessor::new(cfg.long_ma_period);
    let orchestrator = BatchOrchestrator::new(fetcher, processor, cfg.fetch_concurrency);

    let mut table = InstrumentTable::load(&cfg.market_cap_file)
        .unwrap_or_else(|e| panic!("Failed to read instrument table: {e}"));
    let store = CacheStore::new(&cfg.metadata_db_file, &cfg.metadata_json_file);

    // ── Run ───────────────────────────────────────────────────────────────────
    let now = Utc::now().with_timezone(&cfg.market_utc_offset);
    let report = orchestrator.run(&mut table, &store, now).await;
    report.log_summary();

    if !report.save_errors.is_empty() {
        std::process::exit(1);
    }
}
