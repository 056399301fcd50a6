//! Trade recorder: append-only CSV and JSONL sinks behind one `TradeSink`.
//!
//! A record is validated and flattened into a `TradeRow` before any sink is
//! touched, so an incomplete record leaves every file untouched. Each sink
//! appends through a shared `SinkHandle`, which makes concurrent strategy
//! instances safe to point at the same files.

pub mod csv_sink;
pub mod handle;
pub mod jsonl_sink;
pub mod row;

pub use csv_sink::CsvSink;
pub use handle::{SinkHandle, SinkRegistry};
pub use jsonl_sink::{JsonLine, JsonlSink, TRADE_RECORD_TYPE};
pub use row::{TradeRow, HEADER};

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use confluence_core::domain::{RecordError, TradeRecord, TradeSink};

/// A file-backed sink that accepts already-validated rows.
pub trait RowSink: Send + Sync {
    fn path(&self) -> &Path;

    /// Prepare the file (directories, header). Idempotent.
    fn initialize(&self) -> Result<(), RecordError>;

    fn write_row(&self, row: &TradeRow) -> Result<(), RecordError>;
}

/// Fans one trade out to every configured sink.
pub struct TradeRecorder {
    sinks: Vec<Box<dyn RowSink>>,
}

impl TradeRecorder {
    pub fn new(sinks: Vec<Box<dyn RowSink>>) -> Self {
        Self { sinks }
    }

    /// Recorder for the given CSV and/or JSONL paths. Sinks are initialized
    /// eagerly; a failure is logged and retried on the first write.
    pub fn open(
        registry: &SinkRegistry,
        csv: Option<&Path>,
        jsonl: Option<&Path>,
    ) -> Self {
        let mut sinks: Vec<Box<dyn RowSink>> = Vec::new();
        if let Some(path) = csv {
            sinks.push(Box::new(CsvSink::new(registry, path)));
        }
        if let Some(path) = jsonl {
            sinks.push(Box::new(JsonlSink::new(registry, path)));
        }
        let recorder = Self::new(sinks);
        recorder.initialize();
        recorder
    }

    /// Best-effort initialization of every sink.
    pub fn initialize(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.initialize() {
                warn!(
                    path = %sink.path().display(),
                    error = %e,
                    "sink initialization failed; will retry on first write"
                );
            }
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.sinks.iter().map(|s| s.path().to_path_buf()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TradeSink for TradeRecorder {
    /// Every sink is attempted; the first failure is returned.
    fn record(&self, trade: &TradeRecord) -> Result<(), RecordError> {
        let row = TradeRow::from_record(trade)?;
        let mut first_error = None;
        for sink in &self.sinks {
            match sink.write_row(&row) {
                Ok(()) => debug!(
                    path = %sink.path().display(),
                    trade = row.trade_number,
                    "trade appended"
                ),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_trade;
    use super::*;

    #[test]
    fn csv_and_jsonl_agree() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("trades.csv");
        let jsonl = dir.path().join("trades.jsonl");
        let recorder = TradeRecorder::open(&SinkRegistry::new(), Some(&csv), Some(&jsonl));
        recorder.record(&sample_trade()).unwrap();

        let mut reader = csv::Reader::from_path(&csv).unwrap();
        let from_csv: TradeRow = reader.deserialize().next().unwrap().unwrap();
        let text = std::fs::read_to_string(&jsonl).unwrap();
        let from_json: JsonLine = serde_json::from_str(text.trim_end()).unwrap();

        assert_eq!(from_json.record_type, TRADE_RECORD_TYPE);
        assert_eq!(from_csv, from_json.row);
        assert_eq!(from_csv, TradeRow::from_record(&sample_trade()).unwrap());
    }

    #[test]
    fn missing_exit_touches_no_sink() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("trades.csv");
        let jsonl = dir.path().join("trades.jsonl");
        let recorder = TradeRecorder::open(&SinkRegistry::new(), Some(&csv), Some(&jsonl));
        let csv_before = std::fs::metadata(&csv).unwrap().len();

        let mut trade = sample_trade();
        trade.exit = None;
        let err = recorder.record(&trade).unwrap_err();
        assert!(matches!(err, RecordError::MissingExit { trade_number: 3 }));
        assert_eq!(std::fs::metadata(&csv).unwrap().len(), csv_before);
        assert_eq!(std::fs::metadata(&jsonl).unwrap().len(), 0);
    }

    #[test]
    fn failed_eager_init_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, "not a directory").unwrap();
        let csv = blocker.join("trades.csv");
        let recorder = TradeRecorder::open(&SinkRegistry::new(), Some(&csv), None);

        assert!(matches!(
            recorder.record(&sample_trade()),
            Err(RecordError::Io { .. })
        ));

        std::fs::remove_file(&blocker).unwrap();
        recorder.record(&sample_trade()).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn no_sinks_accepts_valid_records_only() {
        let recorder = TradeRecorder::new(Vec::new());
        assert!(recorder.is_empty());
        recorder.record(&sample_trade()).unwrap();
        let mut trade = sample_trade();
        trade.entry = None;
        assert!(recorder.record(&trade).is_err());
    }
}
