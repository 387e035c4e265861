use std::path::PathBuf;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, NaiveTime};

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Upstream market data
    pub upstox_access_token: String,
    pub upstox_base_url: String,
    pub http_timeout_secs: u64,

    // Files
    pub market_cap_file: PathBuf,
    pub metadata_db_file: PathBuf,
    pub metadata_json_file: PathBuf,
    pub strategy_config_path: String,

    // Pipeline
    pub long_ma_period: usize,
    pub history_start: NaiveDate,
    pub max_window_years: u32,
    pub fetch_concurrency: usize,

    // Market calendar
    pub market_close: NaiveTime,
    pub market_utc_offset: FixedOffset,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let market_close = optional_env("MARKET_CLOSE")
            .map(|v| {
                parse_clock(&v).unwrap_or_else(|| {
                    panic!("MARKET_CLOSE must be HH:MM or HH:MM:SS, got: '{v}'")
                })
            })
            .unwrap_or_else(|| NaiveTime::from_hms_opt(15, 30, 0).unwrap_or(NaiveTime::MIN));

        let offset_minutes: i32 = parsed_env("MARKET_UTC_OFFSET_MINUTES", 330);
        let market_utc_offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or_else(|| {
            panic!("MARKET_UTC_OFFSET_MINUTES out of range: {offset_minutes}")
        });

        let long_ma_period: usize = parsed_env("LONG_MA_PERIOD", 100);
        if long_ma_period == 0 {
            panic!("LONG_MA_PERIOD must be at least 1");
        }

        Config {
            upstox_access_token: required_env("UPSTOX_ACCESS_TOKEN"),
            upstox_base_url: optional_env("UPSTOX_BASE_URL")
                .unwrap_or_else(|| "https://api.upstox.com".to_string()),
            http_timeout_secs: parsed_env("HTTP_TIMEOUT_SECS", 30),
            market_cap_file: optional_env("MARKET_CAP_FILE")
                .unwrap_or_else(|| "data/market_cap.csv".to_string())
                .into(),
            metadata_db_file: optional_env("METADATA_DB_FILE")
                .unwrap_or_else(|| "data/metadata.db".to_string())
                .into(),
            metadata_json_file: optional_env("METADATA_JSON_FILE")
                .unwrap_or_else(|| "data/metadata.json".to_string())
                .into(),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            long_ma_period,
            history_start: optional_env("HISTORY_START_DATE")
                .map(|v| {
                    NaiveDate::parse_from_str(&v, "%Y-%m-%d").unwrap_or_else(|_| {
                        panic!("HISTORY_START_DATE must be YYYY-MM-DD, got: '{v}'")
                    })
                })
                .unwrap_or_else(default_history_start),
            max_window_years: parsed_env("MAX_WINDOW_YEARS", 10).max(1),
            fetch_concurrency: parsed_env("FETCH_CONCURRENCY", 1).max(1),
            market_close,
            market_utc_offset,
        }
    }
}

/// First trading day covered by the historical backfill.
pub fn default_history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or(NaiveDate::MIN)
}

/// Parse a wall-clock time given as `HH:MM` or `HH:MM:SS`.
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> T {
    match optional_env(key) {
        Some(v) => v
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Environment variable '{key}' has an invalid value: '{v}'")),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clock_accepts_minutes_and_seconds() {
        assert_eq!(parse_clock("15:30"), NaiveTime::from_hms_opt(15, 30, 0));
        assert_eq!(parse_clock(" 15:29:40 "), NaiveTime::from_hms_opt(15, 29, 40));
        assert_eq!(parse_clock("3pm"), None);
    }

    #[test]
    fn default_history_start_is_first_trading_day_of_2000() {
        assert_eq!(default_history_start(), NaiveDate::from_ymd_opt(2000, 1, 3).unwrap());
    }
}
