//! Market regime tagging.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::components::indicator::Indicator;
use crate::components::signal::BarContext;
use crate::indicators::{adx_key, Adx};

/// Regime tag attached to an entry. Selects which exit plan is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Trending,
    Ranging,
    /// Auto detection disabled, or the classifier is not warmed up.
    Undetected,
}

impl Regime {
    pub fn name(self) -> &'static str {
        match self {
            Regime::Trending => "Trending",
            Regime::Ranging => "Ranging",
            Regime::Undetected => "Undetected",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classifies the bar's market regime.
pub trait RegimeClassifier: Send + Sync {
    fn name(&self) -> &str;

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        Vec::new()
    }

    fn classify(&self, ctx: &BarContext<'_>) -> Regime;
}

/// Trending when ADX is at or above the threshold, Ranging below it.
#[derive(Debug, Clone)]
pub struct AdxRegimeClassifier {
    pub period: usize,
    pub threshold: f64,
    indicator_key: String,
}

impl AdxRegimeClassifier {
    pub fn new(period: usize, threshold: f64) -> Self {
        assert!(period >= 1, "period must be >= 1");
        assert!(threshold >= 0.0, "threshold must be >= 0");
        Self {
            period,
            threshold,
            indicator_key: adx_key(period),
        }
    }

    pub fn default_params() -> Self {
        Self::new(14, 25.0)
    }
}

impl RegimeClassifier for AdxRegimeClassifier {
    fn name(&self) -> &str {
        "adx_regime"
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Adx::new(self.period))]
    }

    fn classify(&self, ctx: &BarContext<'_>) -> Regime {
        match ctx.indicator(&self.indicator_key) {
            Some(adx) if adx >= self.threshold => Regime::Trending,
            Some(_) => Regime::Ranging,
            None => Regime::Undetected,
        }
    }
}
