//! EMA trend bot: Long while the fast EMA is above the slow EMA, Short while
//! below. Strength grows with the gap between the two averages.

use crate::components::indicator::Indicator;
use crate::indicators::{ema_key, Ema};

use super::{BarContext, BotSignal, SignalDirection, SignalSource};

/// Fast/slow EMA trend-state bot.
///
/// # Indicator dependencies
/// - `ema_{fast_period}`
/// - `ema_{slow_period}`
#[derive(Debug, Clone)]
pub struct EmaCross {
    id: String,
    pub fast_period: usize,
    pub slow_period: usize,
    /// Gap between the averages, in percent of the slow EMA, that maps to
    /// full strength.
    pub full_strength_pct: f64,
    fast_key: String,
    slow_key: String,
}

impl EmaCross {
    pub fn new(
        id: impl Into<String>,
        fast_period: usize,
        slow_period: usize,
        full_strength_pct: f64,
    ) -> Self {
        assert!(fast_period >= 1, "fast_period must be >= 1");
        assert!(
            slow_period > fast_period,
            "slow_period must be > fast_period"
        );
        assert!(full_strength_pct > 0.0, "full_strength_pct must be > 0");
        Self {
            id: id.into(),
            fast_period,
            slow_period,
            full_strength_pct,
            fast_key: ema_key(fast_period),
            slow_key: ema_key(slow_period),
        }
    }

    pub fn default_params() -> Self {
        Self::new("ema_cross", 9, 21, 0.5)
    }
}

impl SignalSource for EmaCross {
    fn name(&self) -> &str {
        &self.id
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![
            Box::new(Ema::new(self.fast_period)),
            Box::new(Ema::new(self.slow_period)),
        ]
    }

    fn evaluate(&self, ctx: &BarContext<'_>) -> Option<BotSignal> {
        let fast = ctx.indicator(&self.fast_key)?;
        let slow = ctx.indicator(&self.slow_key)?;
        if slow <= 0.0 || fast == slow {
            return None;
        }

        let gap_pct = (fast - slow).abs() / slow * 100.0;
        let strength = (gap_pct / self.full_strength_pct).min(1.0);
        let direction = if fast > slow {
            SignalDirection::Long
        } else {
            SignalDirection::Short
        };
        Some(BotSignal::new(&self.id, direction, strength))
    }
}
