//! File persistence for the instrument reference table and the indicator
//! cache. Every save writes a sibling `.tmp` file first and renames it over
//! the target, so an interrupted save leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::StringRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{Connection, Row};
use tracing::info;

use common::{Error, IndicatorCache, Instrument, Result, RollingWindow, Timeframe};

const NAME_COLUMN: &str = "Security Name";
const KEY_COLUMN: &str = "Instrument Key";
const SHARES_COLUMN: &str = "No of shares";
const LTP_COLUMN: &str = "LTP";
const MCAP_COLUMN: &str = "MCAP";

/// The market-reference table (`market_cap.csv`).
///
/// Each row keeps its original CSV record, so columns other than the five
/// known ones survive a save untouched and in their original order. Only the
/// `LTP` and `MCAP` cells are rewritten. Rows are matched to their source
/// record by position.
#[derive(Debug, Clone)]
pub struct InstrumentTable {
    path: PathBuf,
    headers: StringRecord,
    records: Vec<StringRecord>,
    pub instruments: Vec<Instrument>,
}

impl InstrumentTable {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut rdr = csv::Reader::from_path(&path)?;
        let headers = rdr.headers()?.clone();

        let mut records = Vec::new();
        let mut instruments = Vec::new();
        for row in rdr.records() {
            let record = row?;
            instruments.push(record.deserialize::<Instrument>(Some(&headers))?);
            records.push(record);
        }

        info!(path = %path.display(), count = instruments.len(), "Instrument table loaded");
        Ok(Self {
            path,
            headers,
            records,
            instruments,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole table. `LTP`/`MCAP` columns are appended if the
    /// source file had none.
    pub fn save(&self) -> Result<()> {
        let mut headers = self.headers.clone();
        let ltp_col = column_index(&mut headers, LTP_COLUMN);
        let mcap_col = column_index(&mut headers, MCAP_COLUMN);

        let tmp = tmp_path(&self.path);
        {
            let mut wtr = csv::Writer::from_path(&tmp)?;
            wtr.write_record(&headers)?;
            for (idx, inst) in self.instruments.iter().enumerate() {
                let mut cells: Vec<String> = match self.records.get(idx) {
                    Some(record) => record.iter().map(str::to_string).collect(),
                    None => fresh_row(&headers, inst),
                };
                cells.resize(headers.len(), String::new());
                cells[ltp_col] = price_cell(inst.ltp);
                cells[mcap_col] = price_cell(inst.mcap);
                wtr.write_record(&cells)?;
            }
            wtr.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), count = self.instruments.len(), "Instrument table saved");
        Ok(())
    }

    /// Every row carrying the display name `name`.
    pub fn rows_named_mut<'a>(&'a mut self, name: &'a str) -> impl Iterator<Item = &'a mut Instrument> + 'a {
        self.instruments.iter_mut().filter(move |i| i.name == name)
    }
}

fn column_index(headers: &mut StringRecord, name: &str) -> usize {
    match headers.iter().position(|h| h == name) {
        Some(idx) => idx,
        None => {
            headers.push_field(name);
            headers.len() - 1
        }
    }
}

/// Cells for an instrument added after load, laid out by header name.
fn fresh_row(headers: &StringRecord, inst: &Instrument) -> Vec<String> {
    headers
        .iter()
        .map(|h| match h {
            NAME_COLUMN => inst.name.clone(),
            KEY_COLUMN => inst.key.clone(),
            SHARES_COLUMN => inst.shares.to_string(),
            _ => String::new(),
        })
        .collect()
}

/// Blank for a missing price; whole numbers keep one decimal (`2900.0`).
fn price_cell(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.1}"),
        Some(v) => v.to_string(),
    }
}

/// Binary (SQLite) and human-readable (JSON) snapshots of the indicator cache.
#[derive(Debug, Clone)]
pub struct CacheStore {
    db_path: PathBuf,
    json_path: PathBuf,
}

const SCHEMA: [&str; 3] = [
    "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    "CREATE TABLE instruments (instrument_key TEXT PRIMARY KEY, symbol TEXT NOT NULL)",
    "CREATE TABLE windows (
        instrument_key TEXT NOT NULL REFERENCES instruments(instrument_key),
        timeframe TEXT NOT NULL,
        capacity INTEGER NOT NULL,
        ma_values BLOB NOT NULL,
        PRIMARY KEY (instrument_key, timeframe)
    )",
];

impl CacheStore {
    pub fn new(db_path: impl Into<PathBuf>, json_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            json_path: json_path.into(),
        }
    }

    /// Write both snapshots. The binary one is written first; if it fails the
    /// JSON snapshot is left untouched.
    pub async fn save(&self, cache: &IndicatorCache) -> Result<()> {
        self.save_db(cache).await?;
        self.save_json(cache).await?;
        info!(
            db = %self.db_path.display(),
            json = %self.json_path.display(),
            instruments = cache.len(),
            "Indicator cache saved"
        );
        Ok(())
    }

    async fn save_db(&self, cache: &IndicatorCache) -> Result<()> {
        let tmp = tmp_path(&self.db_path);
        remove_if_exists(&tmp).await?;

        let opts = SqliteConnectOptions::new()
            .filename(&tmp)
            .journal_mode(SqliteJournalMode::Delete)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&opts).await?;

        let mut tx = conn.begin().await?;
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        if let Some(last_run) = cache.last_run {
            sqlx::query("INSERT INTO meta (key, value) VALUES ('last_run', ?1)")
                .bind(last_run.to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }
        for (key, entry) in &cache.instruments {
            sqlx::query("INSERT INTO instruments (instrument_key, symbol) VALUES (?1, ?2)")
                .bind(key.as_str())
                .bind(entry.symbol.as_str())
                .execute(&mut *tx)
                .await?;
            for (timeframe, window) in &entry.moving_averages {
                sqlx::query(
                    "INSERT INTO windows (instrument_key, timeframe, capacity, ma_values)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(key.as_str())
                .bind(timeframe.as_str())
                .bind(window.capacity() as i64)
                .bind(encode_values(window))
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        conn.close().await?;

        tokio::fs::rename(&tmp, &self.db_path).await?;
        Ok(())
    }

    async fn save_json(&self, cache: &IndicatorCache) -> Result<()> {
        let content = serde_json::to_string_pretty(cache)?;
        let tmp = tmp_path(&self.json_path);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.json_path).await?;
        Ok(())
    }

    /// Reload the binary snapshot.
    pub async fn load(&self) -> Result<IndicatorCache> {
        let opts = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .journal_mode(SqliteJournalMode::Delete);
        let mut conn = SqliteConnection::connect_with(&opts).await?;

        let mut cache = IndicatorCache::new();

        if let Some(row) = sqlx::query("SELECT value FROM meta WHERE key = 'last_run'")
            .fetch_optional(&mut conn)
            .await?
        {
            let raw: String = row.try_get("value")?;
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| Error::Other(format!("invalid last_run '{raw}': {e}")))?;
            cache.last_run = Some(parsed.with_timezone(&Utc));
        }

        let rows = sqlx::query(
            "SELECT w.instrument_key, i.symbol, w.timeframe, w.capacity, w.ma_values
             FROM windows w JOIN instruments i ON i.instrument_key = w.instrument_key
             ORDER BY w.instrument_key, w.timeframe",
        )
        .fetch_all(&mut conn)
        .await?;

        for row in rows {
            let key: String = row.try_get("instrument_key")?;
            let symbol: String = row.try_get("symbol")?;
            let timeframe: Timeframe = row.try_get::<String, _>("timeframe")?.parse()?;
            let capacity: i64 = row.try_get("capacity")?;
            let blob: Vec<u8> = row.try_get("ma_values")?;
            let capacity = usize::try_from(capacity)
                .map_err(|_| Error::Other(format!("negative window capacity for {key}")))?;
            let window = RollingWindow::from_tail(capacity, decode_values(&blob)?);
            cache.upsert(&key, &symbol, timeframe, window);
        }

        conn.close().await?;
        info!(db = %self.db_path.display(), instruments = cache.len(), "Indicator cache loaded");
        Ok(cache)
    }
}

/// Sibling temp file: `metadata.db` → `metadata.db.tmp`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Window values as consecutive little-endian f64s.
fn encode_values(window: &RollingWindow) -> Vec<u8> {
    window.iter().flat_map(f64::to_le_bytes).collect()
}

fn decode_values(blob: &[u8]) -> Result<Vec<f64>> {
    if blob.len() % 8 != 0 {
        return Err(Error::Other(format!(
            "moving-average blob length {} is not a multiple of 8",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(8)
        .map(|b| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(b);
            f64::from_le_bytes(bytes)
        })
        .collect())
}
