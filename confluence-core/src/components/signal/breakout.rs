//! Channel breakout bot: close beyond the highest high / lowest low of the
//! preceding `lookback` bars.

use super::{BarContext, BotSignal, SignalDirection, SignalSource};

/// Long on a close above the prior `lookback`-bar high, Short on a close
/// below the prior low. Strength is the penetration beyond the channel
/// relative to the channel width, floored at `min_strength`.
///
/// Reads raw bars only; no precomputed indicators.
#[derive(Debug, Clone)]
pub struct Breakout {
    id: String,
    pub lookback: usize,
    pub min_strength: f64,
}

impl Breakout {
    pub fn new(id: impl Into<String>, lookback: usize, min_strength: f64) -> Self {
        assert!(lookback >= 2, "lookback must be >= 2");
        assert!(
            (0.0..=1.0).contains(&min_strength),
            "min_strength must be in [0, 1]"
        );
        Self {
            id: id.into(),
            lookback,
            min_strength,
        }
    }

    pub fn default_params() -> Self {
        Self::new("breakout", 20, 0.5)
    }
}

impl SignalSource for Breakout {
    fn name(&self) -> &str {
        &self.id
    }

    fn warmup_bars(&self) -> usize {
        self.lookback
    }

    fn evaluate(&self, ctx: &BarContext<'_>) -> Option<BotSignal> {
        let bar = ctx.bar();
        let window = &ctx.bars[ctx.index - self.lookback..ctx.index];
        if bar.is_void() || window.iter().any(|b| b.is_void()) {
            return None;
        }

        let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let width = high - low;
        if width <= 0.0 {
            return None;
        }

        let (direction, penetration) = if bar.close > high {
            (SignalDirection::Long, bar.close - high)
        } else if bar.close < low {
            (SignalDirection::Short, low - bar.close)
        } else {
            return None;
        };
        let strength = (penetration / width).clamp(self.min_strength, 1.0);
        Some(BotSignal::new(&self.id, direction, strength))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::indicator::IndicatorValues;
    use crate::components::signal::poll;
    use crate::indicators::make_bars;

    fn run(bot: &Breakout, closes: &[f64]) -> Option<BotSignal> {
        let bars = make_bars(closes);
        let iv = IndicatorValues::new();
        poll(bot, &BarContext::new(&bars, bars.len() - 1, &iv))
    }

    #[test]
    fn close_above_channel_is_long() {
        let bot = Breakout::new("bo", 3, 0.5);
        // prior highs top out at 102 (close 101 + 1)
        let signal = run(&bot, &[100.0, 101.0, 100.0, 105.0]).unwrap();
        assert_eq!(signal.direction, SignalDirection::Long);
        assert!(signal.strength >= 0.5);
    }

    #[test]
    fn close_below_channel_is_short() {
        let bot = Breakout::new("bo", 3, 0.2);
        let signal = run(&bot, &[100.0, 101.0, 100.0, 95.0]).unwrap();
        assert_eq!(signal.direction, SignalDirection::Short);
    }

    #[test]
    fn inside_channel_abstains() {
        let bot = Breakout::new("bo", 3, 0.5);
        assert!(run(&bot, &[100.0, 101.0, 100.0, 100.5]).is_none());
    }
}
