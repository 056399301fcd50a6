use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::side::Side;

/// Instrument metadata: tick size and the currency value of one point.
///
/// Stop and target distances are configured in ticks; the instrument converts
/// them to prices and back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub tick_size: f64,
    /// Currency value of a 1.0 price move for one contract.
    #[serde(default = "default_point_value")]
    pub point_value: f64,
}

fn default_point_value() -> f64 {
    1.0
}

/// Tick counts are rounded to this many decimals to absorb float noise
/// (e.g. 44.99999999999 ticks becomes 45).
const TICK_PRECISION: f64 = 1e6;

impl Instrument {
    pub fn new(symbol: impl Into<String>, tick_size: f64, point_value: f64) -> Self {
        Self {
            symbol: symbol.into(),
            tick_size,
            point_value,
        }
    }

    pub fn validate(&self) -> Result<(), InstrumentError> {
        if self.symbol.trim().is_empty() {
            return Err(InstrumentError::EmptySymbol);
        }
        if !self.tick_size.is_finite() || self.tick_size <= 0.0 {
            return Err(InstrumentError::InvalidTickSize(self.tick_size));
        }
        if !self.point_value.is_finite() || self.point_value <= 0.0 {
            return Err(InstrumentError::InvalidPointValue(self.point_value));
        }
        Ok(())
    }

    /// Currency value of one tick for one contract.
    pub fn tick_value(&self) -> f64 {
        self.tick_size * self.point_value
    }

    /// Convert a tick count to a price distance.
    pub fn ticks_to_price(&self, ticks: f64) -> f64 {
        ticks * self.tick_size
    }

    /// Convert a price distance to a tick count.
    pub fn price_to_ticks(&self, distance: f64) -> f64 {
        (distance / self.tick_size * TICK_PRECISION).round() / TICK_PRECISION
    }

    /// Number of decimals needed to print a tick-aligned price.
    pub fn price_decimals(&self) -> i32 {
        let mut scaled = self.tick_size;
        let mut decimals = 0;
        while decimals < 10 && (scaled - scaled.round()).abs() > 1e-9 {
            scaled *= 10.0;
            decimals += 1;
        }
        decimals
    }

    /// Round a price to the nearest tick, trimming float noise from the
    /// multiplication.
    pub fn round_to_tick(&self, price: f64) -> f64 {
        let aligned = (price / self.tick_size).round() * self.tick_size;
        let scale = 10f64.powi(self.price_decimals());
        (aligned * scale).round() / scale
    }

    /// Price `ticks` away from `price` in the favorable direction for `side`
    /// (negative ticks move against the side). Tick-aligned.
    pub fn offset(&self, price: f64, side: Side, ticks: f64) -> f64 {
        self.round_to_tick(price + side.sign() * self.ticks_to_price(ticks))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InstrumentError {
    #[error("instrument symbol is empty")]
    EmptySymbol,

    #[error("tick_size must be positive, got {0}")]
    InvalidTickSize(f64),

    #[error("point_value must be positive, got {0}")]
    InvalidPointValue(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn es() -> Instrument {
        Instrument::new("ES", 0.25, 50.0)
    }

    #[test]
    fn tick_rounding() {
        let inst = Instrument::new("SPY", 0.01, 1.0);
        assert_eq!(inst.round_to_tick(100.126), 100.13);
        assert_eq!(inst.round_to_tick(100.124), 100.12);
        assert_eq!(es().round_to_tick(4500.10), 4500.00);
        assert_eq!(es().round_to_tick(4500.15), 4500.25);
    }

    #[test]
    fn offset_moves_with_side() {
        let inst = Instrument::new("NQ", 0.01, 1.0);
        assert_eq!(inst.offset(100.0, Side::Long, -45.0), 99.55);
        assert_eq!(inst.offset(100.0, Side::Short, -45.0), 100.45);
        assert_eq!(inst.offset(100.0, Side::Long, 4.0), 100.04);
    }

    #[test]
    fn price_to_ticks_absorbs_float_noise() {
        let inst = Instrument::new("NQ", 0.01, 1.0);
        assert_eq!(inst.price_to_ticks(100.0 - 99.55), 45.0);
        assert_eq!(es().price_to_ticks(2.5), 10.0);
    }

    #[test]
    fn tick_value_combines_size_and_point_value() {
        assert_eq!(es().tick_value(), 12.5);
    }

    #[test]
    fn price_decimals_follow_tick() {
        assert_eq!(es().price_decimals(), 2);
        assert_eq!(Instrument::new("CL", 0.01, 1000.0).price_decimals(), 2);
        assert_eq!(Instrument::new("ZB", 1.0, 1000.0).price_decimals(), 0);
        assert_eq!(Instrument::new("6E", 0.00005, 125_000.0).price_decimals(), 5);
    }

    #[test]
    fn validate_rejects_bad_metadata() {
        assert!(es().validate().is_ok());
        assert_eq!(
            Instrument::new("ES", 0.0, 50.0).validate(),
            Err(InstrumentError::InvalidTickSize(0.0))
        );
        assert_eq!(
            Instrument::new("ES", 0.25, -1.0).validate(),
            Err(InstrumentError::InvalidPointValue(-1.0))
        );
        assert_eq!(
            Instrument::new(" ", 0.25, 50.0).validate(),
            Err(InstrumentError::EmptySymbol)
        );
    }
}
