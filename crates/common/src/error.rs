use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("No historical data found for {0}")]
    NoData(String),

    #[error("Invalid instrument key: '{0}'")]
    InvalidInstrument(String),

    #[error("Indicator error: {0}")]
    Indicator(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
