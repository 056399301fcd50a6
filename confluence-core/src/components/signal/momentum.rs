//! Momentum bot: direction of the `period`-bar price change, emitted once the
//! move exceeds a threshold.

use crate::components::indicator::Indicator;
use crate::indicators::{momentum_key, Momentum};

use super::{BarContext, BotSignal, SignalDirection, SignalSource};

/// Fires Long when close rose more than `threshold_pct` over `period` bars,
/// Short when it fell by more. Strength is the move relative to
/// `full_strength_pct`.
#[derive(Debug, Clone)]
pub struct MomentumBot {
    id: String,
    pub period: usize,
    pub threshold_pct: f64,
    pub full_strength_pct: f64,
    key: String,
}

impl MomentumBot {
    pub fn new(
        id: impl Into<String>,
        period: usize,
        threshold_pct: f64,
        full_strength_pct: f64,
    ) -> Self {
        assert!(period >= 1, "period must be >= 1");
        assert!(threshold_pct >= 0.0, "threshold_pct must be >= 0");
        assert!(full_strength_pct > 0.0, "full_strength_pct must be > 0");
        Self {
            id: id.into(),
            period,
            threshold_pct,
            full_strength_pct,
            key: momentum_key(period),
        }
    }

    pub fn default_params() -> Self {
        Self::new("momentum", 10, 0.1, 1.0)
    }
}

impl SignalSource for MomentumBot {
    fn name(&self) -> &str {
        &self.id
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        vec![Box::new(Momentum::new(self.period))]
    }

    fn evaluate(&self, ctx: &BarContext<'_>) -> Option<BotSignal> {
        let change = ctx.indicator(&self.key)?;
        let base = ctx.bars[ctx.index - self.period].close;
        if !base.is_finite() || base <= 0.0 {
            return None;
        }

        let change_pct = change / base * 100.0;
        if change_pct.abs() <= self.threshold_pct {
            return None;
        }
        let strength = (change_pct.abs() / self.full_strength_pct).min(1.0);
        let direction = if change_pct > 0.0 {
            SignalDirection::Long
        } else {
            SignalDirection::Short
        };
        Some(BotSignal::new(&self.id, direction, strength))
    }
}
