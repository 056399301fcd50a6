//! Kaufman efficiency ratio: net move over the path length of the last
//! `period` bars. Near 1 in clean trends, near 0 in chop. A flat window
//! (zero path length) reads as 0.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct EfficiencyRatio {
    period: usize,
    name: String,
}

impl EfficiencyRatio {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "efficiency ratio period must be >= 1");
        Self {
            period,
            name: efficiency_key(period),
        }
    }
}

pub fn efficiency_key(period: usize) -> String {
    format!("er_{period}")
}

impl Indicator for EfficiencyRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut out = vec![f64::NAN; n];
        for i in self.period..n {
            let window = &bars[i - self.period..=i];
            let net = (window[self.period].close - window[0].close).abs();
            let path: f64 = window
                .windows(2)
                .map(|w| (w[1].close - w[0].close).abs())
                .sum();
            out[i] = if path > 0.0 { net / path } else { 0.0 };
        }
        out
    }
}
