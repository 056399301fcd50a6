//! Live position state, owned by the exit machine.

use chrono::NaiveDateTime;

use crate::components::filter::Regime;
use crate::domain::{Instrument, Side};

use super::plan::ExitPlan;
use super::ratchet::RatchetState;

/// Why a position was entered. Carried onto the trade record.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryContext {
    /// Agreeing sources, ordered by bot identifier.
    pub sources: Vec<String>,
    pub confluence_score: f64,
    pub regime: Regime,
    pub session: String,
}

/// What last moved the stop. Decides the stop exit reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOrigin {
    Initial,
    Breakeven,
    Trailing,
}

#[derive(Debug, Clone)]
pub struct PositionState {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub quantity: f64,
    pub plan: ExitPlan,
    pub context: EntryContext,

    pub(crate) ratchet: RatchetState,
    pub stop_origin: StopOrigin,
    pub target_price: f64,
    pub breakeven_armed: bool,

    /// Best unrealized ticks seen, never negative.
    pub mfe_ticks: f64,
    /// Worst unrealized ticks seen, never positive.
    pub mae_ticks: f64,
    pub bars_in_trade: u32,
    pub highest_since_entry: f64,
    pub lowest_since_entry: f64,

    pub initial_stop_ticks: f64,
    pub initial_target_ticks: f64,
    pub breakeven_trigger_ticks: Option<f64>,
}

impl PositionState {
    pub fn stop_price(&self) -> f64 {
        self.ratchet.level()
    }

    /// Signed ticks from entry to `price`; positive is favorable.
    pub fn unrealized_ticks(&self, instrument: &Instrument, price: f64) -> f64 {
        instrument.price_to_ticks(self.side.sign() * (price - self.entry_price))
    }

    pub(crate) fn record_excursion(&mut self, instrument: &Instrument, price: f64) {
        let ticks = self.unrealized_ticks(instrument, price);
        self.mfe_ticks = self.mfe_ticks.max(ticks);
        self.mae_ticks = self.mae_ticks.min(ticks);
    }

    /// Most favorable price since entry (highest for longs).
    pub fn best_price(&self) -> f64 {
        match self.side {
            Side::Long => self.highest_since_entry,
            Side::Short => self.lowest_since_entry,
        }
    }
}
