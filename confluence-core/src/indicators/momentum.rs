//! Momentum: close minus the close `period` bars ago, in price units.

use crate::components::indicator::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Momentum {
    period: usize,
    name: String,
}

impl Momentum {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "Momentum period must be >= 1");
        Self {
            period,
            name: momentum_key(period),
        }
    }
}

pub fn momentum_key(period: usize) -> String {
    format!("momentum_{period}")
}

impl Indicator for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        (0..bars.len())
            .map(|i| match i.checked_sub(self.period) {
                Some(back) => bars[i].close - bars[back].close,
                None => f64::NAN,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn momentum_is_lookback_difference() {
        let mom = Momentum::new(2).compute(&make_bars(&[100.0, 110.0, 105.0, 115.0]));
        assert!(mom[1].is_nan());
        assert_approx(mom[2], 5.0, DEFAULT_EPSILON);
        assert_approx(mom[3], 5.0, DEFAULT_EPSILON);
    }
}
