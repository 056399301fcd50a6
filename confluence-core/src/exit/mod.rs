//! Exit management for one open position: plan resolution at entry, the
//! stop ratchet and the per-bar state machine.

pub mod machine;
pub mod plan;
pub mod position;
pub mod ratchet;

pub use machine::{ClosedPosition, ExitMachine, ExitReason, ExitState, OpenError, OpenRequest};
pub use plan::{
    Breakeven, BreakevenTrigger, ExitPlan, ExitPlanError, ProfitMode, ResolvedLevels, StopMode,
};
pub use position::{EntryContext, PositionState, StopOrigin};
pub use ratchet::RatchetState;
