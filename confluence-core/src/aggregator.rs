//! Signal aggregation: many bot opinions in, at most one directional
//! candidate out.
//!
//! The aggregator is pure. Every bar is scored from scratch from the signals
//! of that bar alone.
//!
//! 1. Signals from sources outside the enabled set are ignored.
//! 2. Long and Short both present: the bar is void (`Conflict`).
//! 3. Otherwise the agreeing sources are scored with the configured
//!    [`ConfluenceMethod`]; denominators depend only on the enabled set, so
//!    one more agreeing source can never lower the score.
//! 4. A score under `min_score` is discarded (`BelowThreshold`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::signal::{poll, BarContext, BotSignal, SignalDirection, SignalSource};
use crate::domain::Side;

/// How agreeing sources turn into a 0–100 confluence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfluenceMethod {
    /// 100 × agreeing / enabled.
    #[default]
    Count,
    /// 100 × Σ strength / enabled.
    Strength,
    /// 100 × Σ (weight × strength) / Σ enabled weights.
    Weighted,
}

/// A directional candidate with its confluence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSignal {
    pub direction: Side,
    pub confluence_score: f64,
    /// Agreeing sources, ordered by bot identifier.
    pub contributing_sources: Vec<String>,
}

impl AggregatedSignal {
    /// Sources joined with `+`, as recorded on the trade.
    pub fn source_label(&self) -> String {
        self.contributing_sources.join("+")
    }
}

/// Result of aggregating one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// No enabled source expressed a direction.
    NoSignal,
    /// Sources disagree; the bar is void.
    Conflict {
        long_sources: Vec<String>,
        short_sources: Vec<String>,
    },
    /// Directionally valid but under `min_score`.
    BelowThreshold(AggregatedSignal),
    Signal(AggregatedSignal),
}

impl Aggregation {
    pub fn signal(&self) -> Option<&AggregatedSignal> {
        match self {
            Aggregation::Signal(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalAggregator {
    method: ConfluenceMethod,
    min_score: f64,
    /// Enabled sources and their weights.
    weights: BTreeMap<String, f64>,
}

impl SignalAggregator {
    /// `weights` lists every enabled source. Negative or non-finite weights
    /// count as zero.
    pub fn new(
        method: ConfluenceMethod,
        min_score: f64,
        weights: impl IntoIterator<Item = (String, f64)>,
    ) -> Self {
        let weights = weights
            .into_iter()
            .map(|(name, w)| (name, if w.is_finite() { w.max(0.0) } else { 0.0 }))
            .collect();
        Self {
            method,
            min_score,
            weights,
        }
    }

    pub fn method(&self) -> ConfluenceMethod {
        self.method
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn enabled_count(&self) -> usize {
        self.weights.len()
    }

    /// Poll every source and aggregate the results.
    pub fn evaluate(
        &self,
        sources: &[Box<dyn SignalSource>],
        ctx: &BarContext<'_>,
    ) -> Aggregation {
        let signals: Vec<BotSignal> = sources
            .iter()
            .filter_map(|source| poll(source.as_ref(), ctx))
            .collect();
        self.aggregate(&signals)
    }

    /// Aggregate already-polled signals.
    pub fn aggregate(&self, signals: &[BotSignal]) -> Aggregation {
        // One opinion per enabled source, first one wins, keyed for ordering.
        let mut by_source: BTreeMap<&str, &BotSignal> = BTreeMap::new();
        for signal in signals {
            let valid = signal.direction != SignalDirection::None && signal.strength.is_finite();
            if valid && self.weights.contains_key(&signal.source_name) {
                by_source.entry(signal.source_name.as_str()).or_insert(signal);
            }
        }

        let (long, short): (Vec<&BotSignal>, Vec<&BotSignal>) = by_source
            .values()
            .copied()
            .partition(|s| s.direction == SignalDirection::Long);

        let (direction, agreeing) = match (long.is_empty(), short.is_empty()) {
            (true, true) => return Aggregation::NoSignal,
            (false, false) => {
                return Aggregation::Conflict {
                    long_sources: long.iter().map(|s| s.source_name.clone()).collect(),
                    short_sources: short.iter().map(|s| s.source_name.clone()).collect(),
                }
            }
            (false, true) => (Side::Long, long),
            (true, false) => (Side::Short, short),
        };

        let aggregated = AggregatedSignal {
            direction,
            confluence_score: self.score(&agreeing),
            contributing_sources: agreeing.iter().map(|s| s.source_name.clone()).collect(),
        };

        if aggregated.confluence_score < self.min_score {
            Aggregation::BelowThreshold(aggregated)
        } else {
            Aggregation::Signal(aggregated)
        }
    }

    fn score(&self, agreeing: &[&BotSignal]) -> f64 {
        let enabled = self.weights.len() as f64;
        if enabled == 0.0 {
            return 0.0;
        }
        let strength = |s: &BotSignal| s.strength.clamp(0.0, 1.0);

        let raw = match self.method {
            ConfluenceMethod::Count => agreeing.len() as f64 / enabled,
            ConfluenceMethod::Strength => {
                agreeing.iter().map(|s| strength(*s)).sum::<f64>() / enabled
            }
            ConfluenceMethod::Weighted => {
                let total: f64 = self.weights.values().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                agreeing
                    .iter()
                    .map(|s| {
                        let weight = self.weights.get(&s.source_name).copied().unwrap_or(0.0);
                        weight * strength(*s)
                    })
                    .sum::<f64>()
                    / total
            }
        };
        (raw * 100.0).clamp(0.0, 100.0)
    }
}
