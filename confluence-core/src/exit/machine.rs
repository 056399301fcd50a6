//! Exit state machine: Flat → Open → BreakevenArmed → Closed (→ Flat).
//!
//! Per bar after the entry bar:
//! 1. `bars_in_trade += 1`
//! 2. exit check against the levels active at bar start (stop first)
//! 3. excursions from the bar range clipped to those levels
//! 4. breakeven promotion once MFE reaches the trigger
//! 5. trailing proposal through the ratchet

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, Instrument, Side};

use super::plan::{ExitPlan, ExitPlanError, StopMode};
use super::position::{EntryContext, PositionState, StopOrigin};
use super::ratchet::RatchetState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Flat,
    Open,
    BreakevenArmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    BreakevenStop,
    TrailingStop,
    ProfitTarget,
    SessionEnd,
    MaxBars,
    EndOfData,
    Manual,
}

impl ExitReason {
    pub fn name(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "StopLoss",
            ExitReason::BreakevenStop => "BreakevenStop",
            ExitReason::TrailingStop => "TrailingStop",
            ExitReason::ProfitTarget => "ProfitTarget",
            ExitReason::SessionEnd => "SessionEnd",
            ExitReason::MaxBars => "MaxBars",
            ExitReason::EndOfData => "EndOfData",
            ExitReason::Manual => "Manual",
        }
    }

    fn for_stop(origin: StopOrigin) -> Self {
        match origin {
            StopOrigin::Initial => ExitReason::StopLoss,
            StopOrigin::Breakeven => ExitReason::BreakevenStop,
            StopOrigin::Trailing => ExitReason::TrailingStop,
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OpenError {
    #[error("a position is already open")]
    AlreadyOpen,

    #[error("invalid exit plan: {0}")]
    InvalidPlan(#[from] ExitPlanError),
}

/// Everything needed to open a position.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub side: Side,
    /// Market reference (the signal bar's close); slippage is applied on top.
    pub reference_price: f64,
    pub time: NaiveDateTime,
    pub quantity: f64,
    pub plan: ExitPlan,
    /// ATR at the entry bar, if warmed up.
    pub atr: Option<f64>,
    pub context: EntryContext,
}

/// A position that just closed.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position: PositionState,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub reason: ExitReason,
    /// Slippage paid over both legs; targets fill without it.
    pub slippage_ticks: f64,
}

/// Owns at most one position for one instrument.
#[derive(Debug, Clone)]
pub struct ExitMachine {
    instrument: Instrument,
    slippage_ticks: f64,
    position: Option<PositionState>,
}

impl ExitMachine {
    pub fn new(instrument: Instrument, slippage_ticks: f64) -> Self {
        Self {
            instrument,
            slippage_ticks: slippage_ticks.max(0.0),
            position: None,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn position(&self) -> Option<&PositionState> {
        self.position.as_ref()
    }

    pub fn state(&self) -> ExitState {
        match &self.position {
            None => ExitState::Flat,
            Some(p) if p.breakeven_armed => ExitState::BreakevenArmed,
            Some(_) => ExitState::Open,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Market entry: pays up by the slippage.
    fn entry_fill(&self, price: f64, side: Side) -> f64 {
        self.instrument.offset(price, side, self.slippage_ticks)
    }

    /// Market exit: gives up the slippage.
    fn exit_fill(&self, price: f64, side: Side) -> f64 {
        self.instrument.offset(price, side, -self.slippage_ticks)
    }

    /// Open a position. Refuses if one is live or the plan is inconsistent;
    /// the machine is unchanged on refusal.
    pub fn open(&mut self, request: OpenRequest) -> Result<&PositionState, OpenError> {
        if self.position.is_some() {
            return Err(OpenError::AlreadyOpen);
        }
        let side = request.side;
        let entry_price = self.entry_fill(request.reference_price, side);
        let levels = request
            .plan
            .resolve(&self.instrument, side, entry_price, request.atr)?;

        let position = self.position.insert(PositionState {
            side,
            entry_price,
            entry_time: request.time,
            quantity: request.quantity,
            plan: request.plan,
            context: request.context,
            ratchet: RatchetState::new(side, levels.stop_price),
            stop_origin: StopOrigin::Initial,
            target_price: levels.target_price,
            breakeven_armed: false,
            mfe_ticks: 0.0,
            mae_ticks: 0.0,
            bars_in_trade: 0,
            highest_since_entry: entry_price,
            lowest_since_entry: entry_price,
            initial_stop_ticks: levels.stop_ticks,
            initial_target_ticks: levels.target_ticks,
            breakeven_trigger_ticks: levels.breakeven_trigger_ticks,
        });
        Ok(&*position)
    }

    /// Advance the live position by one bar. Returns the closed position if
    /// the stop or target was hit.
    pub fn on_bar(&mut self, bar: &Bar, atr: Option<f64>) -> Option<ClosedPosition> {
        let slippage_ticks = self.slippage_ticks;
        let instrument = &self.instrument;
        let position = self.position.as_mut()?;
        if bar.is_void() {
            return None;
        }
        let side = position.side;
        let sign = side.sign();

        position.bars_in_trade += 1;

        let stop = position.stop_price();
        let target = position.target_price;
        let (favorable, adverse) = match side {
            Side::Long => (bar.high, bar.low),
            Side::Short => (bar.low, bar.high),
        };

        // Levels active at bar start; stop first when both are touched.
        let exit = if sign * (adverse - stop) <= 0.0 {
            let level = if sign * (bar.open - stop) <= 0.0 { bar.open } else { stop };
            let fill = instrument.offset(level, side, -slippage_ticks);
            Some((fill, ExitReason::for_stop(position.stop_origin), slippage_ticks))
        } else if sign * (favorable - target) >= 0.0 {
            let fill = if sign * (bar.open - target) >= 0.0 { bar.open } else { target };
            Some((fill, ExitReason::ProfitTarget, 0.0))
        } else {
            None
        };

        let clip_favorable = if sign * (favorable - target) > 0.0 { target } else { favorable };
        let clip_adverse = if sign * (adverse - stop) < 0.0 { stop } else { adverse };
        position.record_excursion(instrument, clip_favorable);
        position.record_excursion(instrument, clip_adverse);
        position.highest_since_entry = position.highest_since_entry.max(bar.high);
        position.lowest_since_entry = position.lowest_since_entry.min(bar.low);

        if let Some((fill, reason, exit_slippage)) = exit {
            position.record_excursion(instrument, fill);
            return self.close(bar.timestamp, fill, reason, exit_slippage);
        }

        // Breakeven promotion, once.
        if let (Some(be), Some(trigger)) = (position.plan.breakeven, position.breakeven_trigger_ticks) {
            if !position.breakeven_armed && position.mfe_ticks >= trigger {
                position.breakeven_armed = true;
                let level = instrument.offset(position.entry_price, side, be.offset_ticks);
                if position.ratchet.would_tighten(level) {
                    position.ratchet.apply(level);
                    position.stop_origin = StopOrigin::Breakeven;
                }
            }
        }

        let proposed = match position.plan.stop {
            StopMode::FixedStop => None,
            StopMode::AtrTrail { atr_multiplier } => atr
                .filter(|a| a.is_finite() && *a > 0.0)
                .map(|a| instrument.round_to_tick(bar.close - sign * a * atr_multiplier)),
            StopMode::HighLowTrail { offset_ticks } => {
                Some(instrument.offset(position.best_price(), side, -offset_ticks))
            }
        };
        if let Some(level) = proposed {
            if position.ratchet.would_tighten(level) {
                position.ratchet.apply(level);
                position.stop_origin = StopOrigin::Trailing;
            }
        }

        None
    }

    /// Close at market for an external reason (session end, max bars, end of
    /// data, manual flatten). No-op when flat.
    pub fn force_exit(
        &mut self,
        time: NaiveDateTime,
        price: f64,
        reason: ExitReason,
    ) -> Option<ClosedPosition> {
        let side = self.position.as_ref()?.side;
        let fill = self.exit_fill(price, side);
        if let Some(position) = self.position.as_mut() {
            position.record_excursion(&self.instrument, fill);
        }
        self.close(time, fill, reason, self.slippage_ticks)
    }

    fn close(
        &mut self,
        exit_time: NaiveDateTime,
        exit_price: f64,
        reason: ExitReason,
        exit_slippage: f64,
    ) -> Option<ClosedPosition> {
        let slippage_ticks = self.slippage_ticks + exit_slippage;
        self.position.take().map(|position| ClosedPosition {
            position,
            exit_time,
            exit_price,
            reason,
            slippage_ticks,
        })
    }
}
