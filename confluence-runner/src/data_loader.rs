//! Bar replay input: CSV bar files and a seeded synthetic generator.
//!
//! CSV files carry a header with `timestamp,open,high,low,close,volume` and
//! an optional `symbol` column. Timestamps are exchange-local, either
//! `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`, strictly increasing.
//!
//! Synthetic bars are a developer aid: a regime-switching random walk over
//! regular trading hours on weekdays, reproducible from the seed.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use csv::ReaderBuilder;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use confluence_core::domain::Bar;

use crate::config::DataConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open bar file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: line {line}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("{}: line {line}: unparseable timestamp `{value}`", .path.display())]
    Timestamp { path: PathBuf, line: u64, value: String },

    #[error("{}: line {line}: inconsistent OHLC", .path.display())]
    InvalidBar { path: PathBuf, line: u64 },

    #[error("{}: line {line}: timestamp not after the previous bar", .path.display())]
    OutOfOrder { path: PathBuf, line: u64 },

    #[error("{}: no bars", .path.display())]
    Empty { path: PathBuf },
}

/// Loaded bars plus a fingerprint of their content.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    /// BLAKE3 over timestamps and OHLCV, in order.
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    #[serde(default)]
    symbol: Option<String>,
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: u64,
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
}

/// Load bars as the data section describes.
pub fn load(data: &DataConfig, base_dir: &Path) -> Result<LoadedBars, LoadError> {
    let (bars, synthetic) = match (&data.bars, data.synthetic_bars) {
        (Some(path), _) => (load_csv(&base_dir.join(path), &data.symbol)?, false),
        (None, Some(count)) => (generate_synthetic_bars(&data.symbol, count, data.seed), true),
        (None, None) => (Vec::new(), true),
    };
    let dataset_hash = dataset_hash(&bars);
    info!(
        bars = bars.len(),
        synthetic,
        hash = %&dataset_hash[..16],
        "bars loaded"
    );
    Ok(LoadedBars {
        bars,
        dataset_hash,
        synthetic,
    })
}

/// Read a CSV bar file. Rows without a `symbol` get `default_symbol`.
pub fn load_csv(path: &Path, default_symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut bars: Vec<Bar> = Vec::new();
    for (i, result) in reader.deserialize::<CsvBar>().enumerate() {
        // Header is line 1.
        let line = i as u64 + 2;
        let row = result.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            line,
            source,
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            line,
            value: row.timestamp.clone(),
        })?;
        let bar = Bar {
            symbol: row
                .symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default_symbol.to_string()),
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if !bar.is_sane() {
            return Err(LoadError::InvalidBar {
                path: path.to_path_buf(),
                line,
            });
        }
        if bars.last().is_some_and(|prev| prev.timestamp >= bar.timestamp) {
            return Err(LoadError::OutOfOrder {
                path: path.to_path_buf(),
                line,
            });
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(bars)
}

/// Deterministic one-minute bars, 09:31 through 16:00 on weekdays from
/// 2024-01-02. Prices sit on a 0.25 grid around 4000.
pub fn generate_synthetic_bars(symbol: &str, count: usize, seed: u64) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TICK: f64 = 0.25;
    const SESSION_MINUTES: i64 = 390;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(count);
    let mut day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default();
    let mut minute = 0i64;
    let mut close_ticks: i64 = 16_000;
    let mut drift = 0.0_f64;
    let mut regime_left = 0u32;

    while bars.len() < count {
        if minute == SESSION_MINUTES {
            minute = 0;
            day += Duration::days(1);
        }
        if matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            day += Duration::days(1);
            continue;
        }
        if regime_left == 0 {
            // Alternate between trending and flat stretches.
            drift = match rng.gen_range(0..3) {
                0 => rng.gen_range(0.6..1.6),
                1 => -rng.gen_range(0.6..1.6),
                _ => 0.0,
            };
            regime_left = rng.gen_range(30..120);
        }
        regime_left -= 1;

        let open_ticks = close_ticks;
        let step = drift + rng.gen_range(-4.0..4.0);
        close_ticks = (close_ticks + step.round() as i64).max(400);
        let high_ticks = open_ticks.max(close_ticks) + rng.gen_range(0..4);
        let low_ticks = (open_ticks.min(close_ticks) - rng.gen_range(0..4)).max(1);

        let session_open = day.and_hms_opt(9, 30, 0).unwrap_or_default();
        bars.push(Bar {
            symbol: symbol.to_string(),
            timestamp: session_open + Duration::minutes(minute + 1),
            open: open_ticks as f64 * TICK,
            high: high_ticks as f64 * TICK,
            low: low_ticks as f64 * TICK,
            close: close_ticks as f64 * TICK,
            volume: rng.gen_range(200..5_000u64),
        });
        minute += 1;
    }
    bars
}

/// BLAKE3 fingerprint of a bar series.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.symbol.as_bytes());
        hasher.update(bar.timestamp.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("bars.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_csv_with_default_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "timestamp,open,high,low,close,volume\n\
             2024-01-02 09:31:00,100,101,99.5,100.5,10\n\
             2024-01-02T09:32:00,100.5,100.75,100,100.25,12\n",
        );
        let bars = load_csv(&path, "NQ").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, "NQ");
        assert_eq!(bars[1].close, 100.25);
        assert_eq!(bars[1].timestamp.format("%H:%M").to_string(), "09:32");
    }

    #[test]
    fn symbol_column_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "symbol,timestamp,open,high,low,close,volume\n\
             CL,2024-01-02 09:31:00,70,71,69,70.5,3\n",
        );
        assert_eq!(load_csv(&path, "ES").unwrap()[0].symbol, "CL");
    }

    #[test]
    fn bad_rows_name_their_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "timestamp,open,high,low,close,volume\n\
             2024-01-02 09:31:00,100,101,99,100,1\n\
             2024-01-02 09:32:00,100,99,101,100,1\n",
        );
        assert!(matches!(
            load_csv(&path, "ES"),
            Err(LoadError::InvalidBar { line: 3, .. })
        ));

        let path = write_csv(
            dir.path(),
            "timestamp,open,high,low,close,volume\n\
             2024-01-02 09:32:00,100,101,99,100,1\n\
             2024-01-02 09:31:00,100,101,99,100,1\n",
        );
        assert!(matches!(
            load_csv(&path, "ES"),
            Err(LoadError::OutOfOrder { line: 3, .. })
        ));

        let path = write_csv(
            dir.path(),
            "timestamp,open,high,low,close,volume\nyesterday,1,1,1,1,1\n",
        );
        assert!(matches!(
            load_csv(&path, "ES"),
            Err(LoadError::Timestamp { line: 2, .. })
        ));
    }

    #[test]
    fn empty_and_missing_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "timestamp,open,high,low,close,volume\n");
        assert!(matches!(load_csv(&path, "ES"), Err(LoadError::Empty { .. })));
        assert!(matches!(
            load_csv(&dir.path().join("missing.csv"), "ES"),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn synthetic_is_deterministic_and_sane() {
        let a = generate_synthetic_bars("ES", 1_000, 7);
        let b = generate_synthetic_bars("ES", 1_000, 7);
        let c = generate_synthetic_bars("ES", 1_000, 8);
        assert_eq!(a.len(), 1_000);
        assert_eq!(dataset_hash(&a), dataset_hash(&b));
        assert_ne!(dataset_hash(&a), dataset_hash(&c));
        for pair in a.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
        for bar in &a {
            assert!(bar.is_sane());
            assert!(!matches!(bar.timestamp.weekday(), Weekday::Sat | Weekday::Sun));
            let t = bar.timestamp.time();
            assert!(t > chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap());
            assert!(t <= chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap());
            assert_eq!((bar.close / 0.25).fract(), 0.0);
        }
    }
}
