//! Chop detection: vetoes entries when price action is directionless.

use crate::components::indicator::Indicator;
use crate::components::signal::BarContext;
use crate::indicators::{efficiency_key, EfficiencyRatio};

/// Decides whether the current bar sits in a choppy market.
pub trait ChopDetector: Send + Sync {
    fn name(&self) -> &str;

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        Vec::new()
    }

    fn is_choppy(&self, ctx: &BarContext<'_>) -> bool;
}

/// Choppy when the efficiency ratio over `period` bars is below `threshold`.
/// Not choppy while the ratio is still warming up.
#[derive(Debug, Clone)]
pub struct EfficiencyChopDetector {
    pub period: usize,
    pub threshold: f64,
    indicator_key: String,
}

impl EfficiencyChopDetector {
    pub fn new(period: usize, threshold: f64) -> Self {
        assert!(period >= 1, "period must be >= 1");
        assert!(
            (0.0..=1.0).contains(&threshold),
            "threshold must be in [0, 1]"
        );
        Self {
            period,
            threshold,
            indicator_key: efficiency_key(period),
        }
    }
}

impl ChopDetector for EfficiencyChopDetector {
    fn name(&self) -> &str {
        "efficiency_chop"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(EfficiencyRatio::new(self.period))]
    }

    fn is_choppy(&self, ctx: &BarContext<'_>) -> bool {
        ctx.indicator(&self.indicator_key)
            .is_some_and(|er| er < self.threshold)
    }
}
