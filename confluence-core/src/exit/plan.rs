//! Exit plan: how a position's stop, target and breakeven are set at entry
//! and how the stop adapts afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Instrument, Side};

/// How the stop moves after entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopMode {
    /// Stays at the initial level; only breakeven promotion moves it.
    FixedStop,
    /// Trails `close ∓ atr × atr_multiplier`. Also sizes the initial stop when
    /// ATR is available at entry.
    AtrTrail { atr_multiplier: f64 },
    /// Trails the extreme since entry by `offset_ticks`.
    HighLowTrail { offset_ticks: f64 },
}

impl StopMode {
    pub fn name(&self) -> &'static str {
        match self {
            StopMode::FixedStop => "FixedStop",
            StopMode::AtrTrail { .. } => "ATRTrail",
            StopMode::HighLowTrail { .. } => "HighLowTrail",
        }
    }
}

/// How the profit target is placed. Fixed at entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfitMode {
    Fixed { target_ticks: f64 },
    /// `ratio` × realized initial stop ticks.
    RiskRewardRatio { ratio: f64 },
}

impl ProfitMode {
    pub fn name(&self) -> &'static str {
        match self {
            ProfitMode::Fixed { .. } => "Fixed",
            ProfitMode::RiskRewardRatio { .. } => "RiskRewardRatio",
        }
    }
}

/// When breakeven promotion arms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakevenTrigger {
    FixedTicks { ticks: f64 },
    /// Percentage of the initial target distance.
    ProfitTargetPercentage { percent: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakeven {
    pub trigger: BreakevenTrigger,
    /// Ticks beyond entry, in the favorable direction, the stop moves to.
    #[serde(default)]
    pub offset_ticks: f64,
}

/// Complete exit configuration. Cloned into the position at entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitPlan {
    pub initial_stop_ticks: f64,
    pub stop: StopMode,
    pub profit: ProfitMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakeven: Option<Breakeven>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExitPlanError {
    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("breakeven offset_ticks must be non-negative and finite, got {0}")]
    InvalidBreakevenOffset(f64),

    #[error("breakeven offset ({offset} ticks) must be below its trigger ({trigger} ticks)")]
    OffsetNotBelowTrigger { offset: f64, trigger: f64 },
}

fn positive(field: &'static str, value: f64) -> Result<(), ExitPlanError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ExitPlanError::NotPositive { field, value })
    }
}

/// Levels fixed at entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLevels {
    pub stop_price: f64,
    pub target_price: f64,
    /// Realized distance between entry and the tick-rounded stop.
    pub stop_ticks: f64,
    pub target_ticks: f64,
    pub breakeven_trigger_ticks: Option<f64>,
}

impl ExitPlan {
    /// Check every distance, ratio and multiplier, plus the breakeven offset
    /// against a fixed-tick trigger. Percentage triggers are checked against
    /// the target in [`ExitPlan::resolve`].
    pub fn validate(&self) -> Result<(), ExitPlanError> {
        positive("initial_stop_ticks", self.initial_stop_ticks)?;
        match self.stop {
            StopMode::FixedStop => {}
            StopMode::AtrTrail { atr_multiplier } => positive("atr_multiplier", atr_multiplier)?,
            StopMode::HighLowTrail { offset_ticks } => positive("trail offset_ticks", offset_ticks)?,
        }
        match self.profit {
            ProfitMode::Fixed { target_ticks } => positive("target_ticks", target_ticks)?,
            ProfitMode::RiskRewardRatio { ratio } => positive("risk_reward_ratio", ratio)?,
        }
        if let Some(be) = &self.breakeven {
            if !be.offset_ticks.is_finite() || be.offset_ticks < 0.0 {
                return Err(ExitPlanError::InvalidBreakevenOffset(be.offset_ticks));
            }
            match be.trigger {
                BreakevenTrigger::FixedTicks { ticks } => {
                    positive("breakeven trigger ticks", ticks)?;
                    check_offset(be.offset_ticks, ticks)?;
                }
                BreakevenTrigger::ProfitTargetPercentage { percent } => {
                    positive("breakeven trigger percent", percent)?
                }
            }
        }
        Ok(())
    }

    /// Place the initial stop and target for an entry.
    ///
    /// `atr` is the ATR at the entry bar; AtrTrail falls back to
    /// `initial_stop_ticks` when it is missing or not positive.
    pub fn resolve(
        &self,
        instrument: &Instrument,
        side: Side,
        entry_price: f64,
        atr: Option<f64>,
    ) -> Result<ResolvedLevels, ExitPlanError> {
        self.validate()?;

        let wanted_ticks = match (self.stop, atr) {
            (StopMode::AtrTrail { atr_multiplier }, Some(atr)) if atr.is_finite() && atr > 0.0 => {
                instrument.price_to_ticks(atr * atr_multiplier)
            }
            _ => self.initial_stop_ticks,
        };
        // Never closer than one tick once rounded.
        let stop_price = instrument.offset(entry_price, side, -wanted_ticks.max(1.0));
        let stop_ticks = instrument.price_to_ticks(side.sign() * (entry_price - stop_price));
        positive("realized stop ticks", stop_ticks)?;

        let target_ticks = match self.profit {
            ProfitMode::Fixed { target_ticks } => target_ticks,
            ProfitMode::RiskRewardRatio { ratio } => ratio * stop_ticks,
        };
        let target_price = instrument.offset(entry_price, side, target_ticks);

        let breakeven_trigger_ticks = match self.breakeven {
            None => None,
            Some(be) => {
                let trigger = match be.trigger {
                    BreakevenTrigger::FixedTicks { ticks } => ticks,
                    BreakevenTrigger::ProfitTargetPercentage { percent } => {
                        percent / 100.0 * target_ticks
                    }
                };
                check_offset(be.offset_ticks, trigger)?;
                Some(trigger)
            }
        };

        Ok(ResolvedLevels {
            stop_price,
            target_price,
            stop_ticks,
            target_ticks,
            breakeven_trigger_ticks,
        })
    }
}

fn check_offset(offset: f64, trigger: f64) -> Result<(), ExitPlanError> {
    if offset >= trigger {
        Err(ExitPlanError::OffsetNotBelowTrigger { offset, trigger })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick_001() -> Instrument {
        Instrument::new("NQ", 0.01, 1.0)
    }

    fn plan(stop: StopMode, profit: ProfitMode) -> ExitPlan {
        ExitPlan {
            initial_stop_ticks: 45.0,
            stop,
            profit,
            breakeven: None,
        }
    }

    #[test]
    fn fixed_stop_rounds_to_tick() {
        let levels = plan(StopMode::FixedStop, ProfitMode::Fixed { target_ticks: 60.0 })
            .resolve(&tick_001(), Side::Long, 100.0, None)
            .unwrap();
        assert_eq!(levels.stop_price, 99.55);
        assert_eq!(levels.stop_ticks, 45.0);
        assert_eq!(levels.target_price, 100.6);
    }

    #[test]
    fn risk_reward_uses_realized_stop() {
        let levels = plan(StopMode::FixedStop, ProfitMode::RiskRewardRatio { ratio: 2.0 })
            .resolve(&tick_001(), Side::Long, 100.0, None)
            .unwrap();
        assert_eq!(levels.target_ticks, 90.0);
        assert_eq!(levels.target_price, 100.9);
    }

    #[test]
    fn atr_sizes_initial_stop_when_available() {
        let atr_plan = plan(
            StopMode::AtrTrail { atr_multiplier: 2.0 },
            ProfitMode::RiskRewardRatio { ratio: 1.5 },
        );
        let with_atr = atr_plan
            .resolve(&tick_001(), Side::Short, 100.0, Some(0.125))
            .unwrap();
        // 0.25 price = 25 ticks above a short entry
        assert_eq!(with_atr.stop_price, 100.25);
        assert_eq!(with_atr.stop_ticks, 25.0);
        assert_eq!(with_atr.target_ticks, 37.5);

        let without = atr_plan
            .resolve(&tick_001(), Side::Short, 100.0, Some(f64::NAN))
            .unwrap();
        assert_eq!(without.stop_ticks, 45.0);
    }

    #[test]
    fn percentage_trigger_scales_with_target() {
        let mut p = plan(StopMode::FixedStop, ProfitMode::Fixed { target_ticks: 80.0 });
        p.breakeven = Some(Breakeven {
            trigger: BreakevenTrigger::ProfitTargetPercentage { percent: 50.0 },
            offset_ticks: 2.0,
        });
        let levels = p.resolve(&tick_001(), Side::Long, 100.0, None).unwrap();
        assert_eq!(levels.breakeven_trigger_ticks, Some(40.0));
    }

    #[test]
    fn inconsistent_plans_are_refused() {
        let mut p = plan(StopMode::FixedStop, ProfitMode::Fixed { target_ticks: 0.0 });
        assert!(matches!(
            p.validate(),
            Err(ExitPlanError::NotPositive { field: "target_ticks", .. })
        ));

        p.profit = ProfitMode::Fixed { target_ticks: 40.0 };
        p.initial_stop_ticks = f64::NAN;
        assert!(p.validate().is_err());

        p.initial_stop_ticks = 20.0;
        p.breakeven = Some(Breakeven {
            trigger: BreakevenTrigger::FixedTicks { ticks: 10.0 },
            offset_ticks: 10.0,
        });
        assert_eq!(
            p.validate(),
            Err(ExitPlanError::OffsetNotBelowTrigger {
                offset: 10.0,
                trigger: 10.0
            })
        );

        p.breakeven = Some(Breakeven {
            trigger: BreakevenTrigger::ProfitTargetPercentage { percent: 10.0 },
            offset_ticks: 5.0,
        });
        // trigger resolves to 4 ticks, below the offset
        assert!(p.validate().is_ok());
        assert!(p.resolve(&tick_001(), Side::Long, 100.0, None).is_err());
    }

    #[test]
    fn mode_names() {
        assert_eq!(StopMode::AtrTrail { atr_multiplier: 1.0 }.name(), "ATRTrail");
        assert_eq!(StopMode::HighLowTrail { offset_ticks: 1.0 }.name(), "HighLowTrail");
        assert_eq!(ProfitMode::RiskRewardRatio { ratio: 1.0 }.name(), "RiskRewardRatio");
    }

    #[test]
    fn plan_parses_from_toml() {
        let p: ExitPlan = toml::from_str(
            r#"
initial_stop_ticks = 20.0
stop = { type = "ATR_TRAIL", atr_multiplier = 2.5 }
profit = { type = "RISK_REWARD_RATIO", ratio = 2.0 }
breakeven = { trigger = { type = "FIXED_TICKS", ticks = 12.0 }, offset_ticks = 2.0 }
"#,
        )
        .unwrap();
        assert_eq!(p.stop, StopMode::AtrTrail { atr_multiplier: 2.5 });
        assert!(p.validate().is_ok());
    }
}
