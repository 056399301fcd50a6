//! Row-oriented CSV sink with a fixed header.

use std::path::Path;
use std::sync::Arc;

use confluence_core::domain::{RecordError, TradeRecord, TradeSink};

use super::handle::{SinkHandle, SinkRegistry};
use super::row::{TradeRow, HEADER};
use super::RowSink;

pub struct CsvSink {
    handle: Arc<SinkHandle>,
    header: Vec<u8>,
}

impl CsvSink {
    pub fn new(registry: &SinkRegistry, path: impl AsRef<Path>) -> Self {
        Self {
            handle: registry.handle(path),
            header: format!("{}\n", HEADER.join(",")).into_bytes(),
        }
    }

    /// One CSV line, newline-terminated.
    pub fn encode(row: &TradeRow) -> Result<Vec<u8>, RecordError> {
        let encode_err = |message: String| RecordError::Encode {
            trade_number: row.trade_number,
            message,
        };
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(vec![]);
        wtr.write_record(row.csv_fields())
            .map_err(|e| encode_err(e.to_string()))?;
        wtr.into_inner().map_err(|e| encode_err(e.to_string()))
    }
}

impl RowSink for CsvSink {
    fn path(&self) -> &Path {
        self.handle.path()
    }

    fn initialize(&self) -> Result<(), RecordError> {
        self.handle.initialize(Some(&self.header))
    }

    fn write_row(&self, row: &TradeRow) -> Result<(), RecordError> {
        let line = Self::encode(row)?;
        self.handle.append(Some(&self.header), &line)
    }
}

impl TradeSink for CsvSink {
    fn record(&self, trade: &TradeRecord) -> Result<(), RecordError> {
        self.write_row(&TradeRow::from_record(trade)?)
    }
}
