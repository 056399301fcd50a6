//! Pluggable per-bar components: indicators, bots and market filters.

pub mod factory;
pub mod filter;
pub mod indicator;
pub mod signal;
