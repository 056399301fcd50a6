//! Confluence Core: signal aggregation, entry gating, exit management and
//! trade records.
//!
//! This crate contains the per-bar decision pipeline:
//! - Domain types (bars, instruments, sides, trade records, sinks)
//! - Indicators and the bot (`SignalSource`) interface with reference bots
//! - Signal aggregator computing the confluence score
//! - Filter gate: session windows, regime tagging, chop veto
//! - Exit state machine with stop ratchet and breakeven promotion
//! - Strategy configuration, presets and the per-bar engine

pub mod aggregator;
pub mod components;
pub mod config;
pub mod domain;
pub mod engine;
pub mod exit;
pub mod gate;
pub mod indicators;
pub mod presets;
