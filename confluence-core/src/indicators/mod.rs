//! Reference indicator implementations.
//!
//! All implement the `Indicator` trait from `components::indicator` and are
//! precomputed once per run into `IndicatorValues`.

pub mod adx;
pub mod atr;
pub mod efficiency;
pub mod ema;
pub mod momentum;

pub use adx::{adx_key, Adx};
pub use atr::{atr_key, Atr};
pub use efficiency::{efficiency_key, EfficiencyRatio};
pub use ema::{ema_key, Ema};
pub use momentum::{momentum_key, Momentum};

/// Create one-minute bars from close prices for testing.
///
/// open = previous close (or close for the first bar),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                timestamp: start + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
