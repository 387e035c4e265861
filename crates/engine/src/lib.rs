pub mod batch;
pub mod history;
pub mod processor;
pub mod store;
pub mod upstox;

pub use batch::{BatchOrchestrator, BatchRun, RunReport};
pub use history::{HistoryConfig, HistoryFetcher};
pub use processor::IndicatorProcessor;
pub use store::{CacheStore, InstrumentTable};
pub use upstox::UpstoxClient;
