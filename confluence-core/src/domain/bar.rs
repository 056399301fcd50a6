//! The fundamental market data unit.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument, stamped with the bar's close time.
///
/// The timestamp is exchange-local; session windows compare against its
/// time-of-day component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Time-of-day of the bar, used for session-window matching.
    pub fn time_of_day(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// Returns true if any OHLC field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high is the top of the range, low the bottom.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }
}
