//! Average True Range (ATR), Wilder smoothing.
//!
//! TR[0] = high - low; TR[t] = max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR[period] is the mean of TR[1..=period]; after that
//! ATR[t] = (ATR[t-1] * (period - 1) + TR[t]) / period.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: atr_key(period),
        }
    }
}

/// Indicator key for an ATR of the given period.
pub fn atr_key(period: usize) -> String {
    format!("atr_{period}")
}

pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let range = bar.high - bar.low;
            match i.checked_sub(1).map(|p| bars[p].close) {
                None => range,
                Some(pc) => range.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            }
        })
        .collect()
}

/// Wilder average of `values`, seeded with the mean of `values[1..=period]`.
pub(crate) fn wilder_average(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }
    let p = period as f64;
    let mut avg = values[1..=period].iter().sum::<f64>() / p;
    out[period] = avg;
    for i in (period + 1)..n {
        avg = (avg * (p - 1.0) + values[i]) / p;
        out[i] = avg;
    }
    out
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_average(&true_range(bars), self.period)
    }
}
