pub mod cache;
pub mod config;
pub mod error;
pub mod market_data;
pub mod types;

pub use cache::{IndicatorCache, InstrumentIndicators, RollingWindow};
pub use config::Config;
pub use error::{Error, Result};
pub use market_data::MarketDataClient;
pub use types::*;
