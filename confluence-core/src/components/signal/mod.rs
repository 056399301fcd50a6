//! Bot interface: independent signal generators polled once per bar.
//!
//! A bot sees only bar history and precomputed indicators, never position
//! state. It returns an opinion for the current bar or abstains. Bots that are
//! still warming up are never asked; they abstain.

pub mod breakout;
pub mod ema_cross;
pub mod momentum;

pub use breakout::Breakout;
pub use ema_cross::EmaCross;
pub use momentum::MomentumBot;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Side};

use super::indicator::{Indicator, IndicatorValues};

/// Directional opinion of a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Long,
    Short,
    None,
}

impl SignalDirection {
    pub fn side(self) -> Option<Side> {
        match self {
            SignalDirection::Long => Some(Side::Long),
            SignalDirection::Short => Some(Side::Short),
            SignalDirection::None => None,
        }
    }
}

/// One bot's output for one bar. Ephemeral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSignal {
    pub source_name: String,
    pub direction: SignalDirection,
    /// Conviction in [0, 1].
    pub strength: f64,
}

impl BotSignal {
    pub fn new(source_name: impl Into<String>, direction: SignalDirection, strength: f64) -> Self {
        Self {
            source_name: source_name.into(),
            direction,
            strength,
        }
    }

    pub fn long(source_name: impl Into<String>, strength: f64) -> Self {
        Self::new(source_name, SignalDirection::Long, strength)
    }

    pub fn short(source_name: impl Into<String>, strength: f64) -> Self {
        Self::new(source_name, SignalDirection::Short, strength)
    }
}

/// Everything a per-bar component may look at: history up to and including
/// `index`, and the precomputed indicator series.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub bars: &'a [Bar],
    pub index: usize,
    pub indicators: &'a IndicatorValues,
}

impl<'a> BarContext<'a> {
    pub fn new(bars: &'a [Bar], index: usize, indicators: &'a IndicatorValues) -> Self {
        Self {
            bars,
            index,
            indicators,
        }
    }

    /// The bar being processed.
    pub fn bar(&self) -> &'a Bar {
        &self.bars[self.index]
    }

    /// Finite indicator value at the current bar.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get_valid(name, self.index)
    }
}

/// Trait for bots.
///
/// `evaluate` must only read `bars[..=ctx.index]`.
pub trait SignalSource: Send + Sync {
    /// Bot identifier as configured (e.g. "ema_cross").
    fn name(&self) -> &str;

    /// Bars of history needed before the bot can form an opinion.
    fn warmup_bars(&self) -> usize;

    /// Indicator series the bot reads; the runner precomputes them.
    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        Vec::new()
    }

    /// Opinion for the current bar, or `None` to abstain.
    fn evaluate(&self, ctx: &BarContext<'_>) -> Option<BotSignal>;
}

/// Poll a bot, normalizing its output.
///
/// Not-ready bots, `SignalDirection::None` and non-finite strengths all count
/// as abstention. Strength is clamped into [0, 1] and the source name is the
/// bot's configured identifier.
pub fn poll(source: &dyn SignalSource, ctx: &BarContext<'_>) -> Option<BotSignal> {
    if ctx.index < source.warmup_bars() {
        return None;
    }
    let signal = source.evaluate(ctx)?;
    if signal.direction == SignalDirection::None || !signal.strength.is_finite() {
        return None;
    }
    Some(BotSignal {
        source_name: source.name().to_string(),
        direction: signal.direction,
        strength: signal.strength.clamp(0.0, 1.0),
    })
}
