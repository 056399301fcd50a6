//! Domain types for the confluence engine

pub mod bar;
pub mod instrument;
pub mod side;
pub mod trade;

pub use bar::Bar;
pub use instrument::{Instrument, InstrumentError};
pub use side::Side;
pub use trade::{MemorySink, RecordError, TradeLeg, TradeRecord, TradeSink};
