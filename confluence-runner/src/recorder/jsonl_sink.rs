//! Line-delimited JSON sink: one `{"record_type":"trade", ...}` object per line.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use confluence_core::domain::{RecordError, TradeRecord, TradeSink};

use super::handle::{SinkHandle, SinkRegistry};
use super::row::TradeRow;
use super::RowSink;

pub const TRADE_RECORD_TYPE: &str = "trade";

/// The on-disk shape of one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLine {
    pub record_type: String,
    #[serde(flatten)]
    pub row: TradeRow,
}

pub struct JsonlSink {
    handle: Arc<SinkHandle>,
}

impl JsonlSink {
    pub fn new(registry: &SinkRegistry, path: impl AsRef<Path>) -> Self {
        Self {
            handle: registry.handle(path),
        }
    }

    pub fn encode(row: &TradeRow) -> Result<Vec<u8>, RecordError> {
        let line = JsonLine {
            record_type: TRADE_RECORD_TYPE.to_string(),
            row: row.clone(),
        };
        let mut bytes = serde_json::to_vec(&line).map_err(|e| RecordError::Encode {
            trade_number: row.trade_number,
            message: e.to_string(),
        })?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl RowSink for JsonlSink {
    fn path(&self) -> &Path {
        self.handle.path()
    }

    fn initialize(&self) -> Result<(), RecordError> {
        self.handle.initialize(None)
    }

    fn write_row(&self, row: &TradeRow) -> Result<(), RecordError> {
        let line = Self::encode(row)?;
        self.handle.append(None, &line)
    }
}

impl TradeSink for JsonlSink {
    fn record(&self, trade: &TradeRecord) -> Result<(), RecordError> {
        self.write_row(&TradeRow::from_record(trade)?)
    }
}
