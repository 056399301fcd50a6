//! Market-condition filters used by the gate: regime classification and chop
//! detection.
//!
//! Filters evaluate market conditions only; they never see position state.

pub mod chop;
pub mod regime;

pub use chop::{ChopDetector, EfficiencyChopDetector};
pub use regime::{AdxRegimeClassifier, Regime, RegimeClassifier};
