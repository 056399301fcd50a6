//! Entry gate: session, regime and chop checks applied to an aggregated
//! candidate before it may open a position.

pub mod session;

pub use session::{SessionSchedule, SessionWindow};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatedSignal;
use crate::components::filter::{ChopDetector, Regime, RegimeClassifier};
use crate::components::indicator::Indicator;
use crate::components::signal::BarContext;
use crate::domain::Side;

/// Why a candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    NoSessionEnabled,
    OutsideSession,
    Choppy,
    /// The exit plan for the tagged regime is inconsistent.
    InvalidExitPlan(String),
}

impl RejectReason {
    /// Stable name used for counting rejections.
    pub fn name(&self) -> &'static str {
        match self {
            RejectReason::NoSessionEnabled => "NoSessionEnabled",
            RejectReason::OutsideSession => "OutsideSession",
            RejectReason::Choppy => "Choppy",
            RejectReason::InvalidExitPlan(_) => "InvalidExitPlan",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidExitPlan(why) => write!(f, "InvalidExitPlan: {why}"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acceptance {
    pub side: Side,
    pub session: String,
    pub regime: Regime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Accept(Acceptance),
    Reject(RejectReason),
}

/// Session windows plus optional regime classifier and chop detector.
pub struct FilterGate {
    schedule: SessionSchedule,
    regime: Option<Box<dyn RegimeClassifier>>,
    chop: Option<Box<dyn ChopDetector>>,
}

impl FilterGate {
    pub fn new(schedule: SessionSchedule) -> Self {
        Self {
            schedule,
            regime: None,
            chop: None,
        }
    }

    pub fn with_regime(mut self, classifier: Box<dyn RegimeClassifier>) -> Self {
        self.regime = Some(classifier);
        self
    }

    pub fn with_chop(mut self, detector: Box<dyn ChopDetector>) -> Self {
        self.chop = Some(detector);
        self
    }

    pub fn schedule(&self) -> &SessionSchedule {
        &self.schedule
    }

    pub fn indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut out = Vec::new();
        if let Some(regime) = &self.regime {
            out.extend(regime.indicators());
        }
        if let Some(chop) = &self.chop {
            out.extend(chop.indicators());
        }
        out
    }

    /// Regime tag for the bar; `Undetected` when auto detection is off.
    pub fn regime(&self, ctx: &BarContext<'_>) -> Regime {
        self.regime
            .as_ref()
            .map_or(Regime::Undetected, |c| c.classify(ctx))
    }

    /// True when the bar falls in an enabled session window.
    pub fn in_session(&self, ctx: &BarContext<'_>) -> bool {
        self.schedule.active_at(ctx.bar().time_of_day()).is_some()
    }

    pub fn evaluate(&self, signal: &AggregatedSignal, ctx: &BarContext<'_>) -> GateDecision {
        if !self.schedule.any_enabled() {
            return GateDecision::Reject(RejectReason::NoSessionEnabled);
        }
        let Some(window) = self.schedule.active_at(ctx.bar().time_of_day()) else {
            return GateDecision::Reject(RejectReason::OutsideSession);
        };
        if self.chop.as_ref().is_some_and(|c| c.is_choppy(ctx)) {
            return GateDecision::Reject(RejectReason::Choppy);
        }
        GateDecision::Accept(Acceptance {
            side: signal.direction,
            session: window.name.clone(),
            regime: self.regime(ctx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::filter::{AdxRegimeClassifier, EfficiencyChopDetector};
    use crate::components::indicator::IndicatorValues;
    use crate::indicators::{adx_key, efficiency_key, make_bars};
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn long_signal() -> AggregatedSignal {
        AggregatedSignal {
            direction: Side::Long,
            confluence_score: 100.0,
            contributing_sources: vec!["ema_cross".into()],
        }
    }

    fn rth() -> SessionSchedule {
        SessionSchedule::new(vec![SessionWindow::new("rth", t(9, 30), t(16, 0))])
    }

    #[test]
    fn accepts_inside_session_and_names_it() {
        // make_bars starts at 09:30
        let bars = make_bars(&[100.0]);
        let iv = IndicatorValues::new();
        let decision = FilterGate::new(rth()).evaluate(&long_signal(), &BarContext::new(&bars, 0, &iv));
        assert_eq!(
            decision,
            GateDecision::Accept(Acceptance {
                side: Side::Long,
                session: "rth".into(),
                regime: Regime::Undetected,
            })
        );
    }

    #[test]
    fn rejects_outside_session() {
        let bars = make_bars(&[100.0]);
        let iv = IndicatorValues::new();
        let gate = FilterGate::new(SessionSchedule::new(vec![SessionWindow::new(
            "afternoon",
            t(13, 0),
            t(16, 0),
        )]));
        assert_eq!(
            gate.evaluate(&long_signal(), &BarContext::new(&bars, 0, &iv)),
            GateDecision::Reject(RejectReason::OutsideSession)
        );
    }

    #[test]
    fn rejects_when_no_window_enabled() {
        let bars = make_bars(&[100.0]);
        let iv = IndicatorValues::new();
        let mut window = SessionWindow::new("rth", t(9, 30), t(16, 0));
        window.enabled = false;
        let gate = FilterGate::new(SessionSchedule::new(vec![window]));
        assert_eq!(
            gate.evaluate(&long_signal(), &BarContext::new(&bars, 0, &iv)),
            GateDecision::Reject(RejectReason::NoSessionEnabled)
        );
        assert_eq!(
            FilterGate::new(SessionSchedule::default())
                .evaluate(&long_signal(), &BarContext::new(&bars, 0, &iv)),
            GateDecision::Reject(RejectReason::NoSessionEnabled)
        );
    }

    #[test]
    fn chop_vetoes_and_regime_tags() {
        let bars = make_bars(&[100.0]);
        let mut iv = IndicatorValues::new();
        iv.insert(adx_key(14), vec![40.0]);
        iv.insert(efficiency_key(10), vec![0.1]);
        let ctx = BarContext::new(&bars, 0, &iv);

        let choppy = FilterGate::new(rth()).with_chop(Box::new(EfficiencyChopDetector::new(10, 0.3)));
        assert_eq!(
            choppy.evaluate(&long_signal(), &ctx),
            GateDecision::Reject(RejectReason::Choppy)
        );

        let tagged = FilterGate::new(rth()).with_regime(Box::new(AdxRegimeClassifier::new(14, 25.0)));
        match tagged.evaluate(&long_signal(), &ctx) {
            GateDecision::Accept(a) => assert_eq!(a.regime, Regime::Trending),
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[test]
    fn reject_reason_display() {
        assert_eq!(RejectReason::Choppy.to_string(), "Choppy");
        assert_eq!(
            RejectReason::InvalidExitPlan("target_ticks must be positive".into()).to_string(),
            "InvalidExitPlan: target_ticks must be positive"
        );
    }
}
