//! A completed round-trip trade with its full decision context.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::side::Side;

/// One side of a round trip: when and at what price it filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLeg {
    pub time: NaiveDateTime,
    pub price: f64,
}

/// A closed trade, write-once.
///
/// Entry and exit legs are optional so that an incomplete record can be
/// represented and refused by sinks; every other field is always populated by
/// the trade closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    // ── Identification ──
    pub strategy: String,
    pub instrument: String,
    pub account: String,
    pub trade_number: u64,

    // ── Round trip ──
    pub entry: Option<TradeLeg>,
    pub exit: Option<TradeLeg>,
    pub side: Side,
    pub quantity: f64,
    pub exit_reason: String,

    // ── PnL ──
    pub profit_ticks: f64,
    /// Net of commission.
    pub profit_currency: f64,
    pub commission: f64,

    // ── Excursion ──
    pub mfe_ticks: f64,
    pub mae_ticks: f64,

    // ── Decision context ──
    pub regime: String,
    pub signal_source: String,
    pub stop_mode: String,
    pub target_mode: String,
    pub confluence_score: f64,

    // ── Indicators at exit ──
    pub adx_at_exit: Option<f64>,
    pub atr_at_exit: Option<f64>,
    pub momentum_at_exit: Option<f64>,

    // ── Lifecycle ──
    pub bars_in_trade: u32,
    pub initial_sl_ticks: f64,
    pub initial_tp_ticks: f64,
    /// Zero when breakeven promotion was not configured.
    pub breakeven_trigger_ticks: f64,
    /// Slippage paid over both legs; a target exit adds none.
    pub slippage_ticks: f64,
}

impl TradeRecord {
    /// Both legs, or the reason the record must not be written.
    pub fn legs(&self) -> Result<(TradeLeg, TradeLeg), RecordError> {
        let entry = self.entry.ok_or(RecordError::MissingEntry {
            trade_number: self.trade_number,
        })?;
        let exit = self.exit.ok_or(RecordError::MissingExit {
            trade_number: self.trade_number,
        })?;
        Ok((entry, exit))
    }

    pub fn is_winner(&self) -> bool {
        self.profit_currency > 0.0
    }
}

/// Failures from handing a trade to a sink.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("trade #{trade_number} has no entry leg")]
    MissingEntry { trade_number: u64 },

    #[error("trade #{trade_number} has no exit leg")]
    MissingExit { trade_number: u64 },

    #[error("sink I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode trade #{trade_number}: {message}")]
    Encode { trade_number: u64, message: String },
}

impl RecordError {
    /// True for records refused before any sink was touched.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::MissingEntry { .. } | Self::MissingExit { .. })
    }
}

/// Destination for closed trades.
///
/// Implementations must be safe to share between concurrently running
/// strategy instances and must not write anything for a record whose legs
/// are incomplete.
pub trait TradeSink: Send + Sync {
    fn record(&self, trade: &TradeRecord) -> Result<(), RecordError>;
}

/// In-memory sink. Keeps validated records in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    trades: Mutex<Vec<TradeRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> Vec<TradeRecord> {
        self.trades
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.trades
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TradeSink for MemorySink {
    fn record(&self, trade: &TradeRecord) -> Result<(), RecordError> {
        trade.legs()?;
        self.trades
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(trade.clone());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_trade;
    use super::*;

    #[test]
    fn complete_record_yields_legs() {
        let (entry, exit) = sample_trade().legs().unwrap();
        assert_eq!(entry.price, 5000.25);
        assert_eq!(exit.price, 5010.25);
    }

    #[test]
    fn missing_exit_is_invalid_input() {
        let mut trade = sample_trade();
        trade.exit = None;
        let err = trade.legs().unwrap_err();
        assert!(matches!(err, RecordError::MissingExit { trade_number: 7 }));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn missing_entry_reported_before_exit() {
        let mut trade = sample_trade();
        trade.entry = None;
        trade.exit = None;
        assert!(matches!(
            trade.legs().unwrap_err(),
            RecordError::MissingEntry { .. }
        ));
    }

    #[test]
    fn memory_sink_refuses_incomplete_records() {
        let sink = MemorySink::new();
        let mut bad = sample_trade();
        bad.entry = None;
        assert!(sink.record(&bad).is_err());
        assert!(sink.is_empty());

        sink.record(&sample_trade()).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.trades()[0].trade_number, 7);
    }

    #[test]
    fn io_error_message_names_path() {
        let err = RecordError::Io {
            path: PathBuf::from("/tmp/trades.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/trades.csv"));
        assert!(!err.is_invalid_input());
    }
}
