//! Exponential Moving Average of closes.
//!
//! Seeded with the SMA of the first `period` closes, then
//! EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).

use crate::components::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: ema_key(period),
        }
    }
}

pub fn ema_key(period: usize) -> String {
    format!("ema_{period}")
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut out = vec![f64::NAN; n];
        if n < self.period {
            return out;
        }
        let alpha = 2.0 / (self.period as f64 + 1.0);
        let mut ema = bars[..self.period].iter().map(|b| b.close).sum::<f64>() / self.period as f64;
        out[self.period - 1] = ema;
        for (i, bar) in bars.iter().enumerate().skip(self.period) {
            ema = alpha * bar.close + (1.0 - alpha) * ema;
            out[i] = ema;
        }
        out
    }
}
