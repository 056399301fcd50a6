//! Confluence Runner: trade recording, run orchestration, bar replay and
//! trade-log summaries.
//!
//! This crate builds on `confluence-core` to provide:
//! - The trade recorder: CSV and JSONL sinks behind shared, lock-guarded
//!   per-file handles
//! - Run configuration (`RunConfig`) resolving presets and strategy files
//! - Bar loading from CSV with a seeded synthetic fallback
//! - Single and parallel (rayon) strategy runs against one recorder
//! - Summaries of a JSONL trade log grouped by source, regime or exit reason

pub mod config;
pub mod data_loader;
pub mod recorder;
pub mod runner;
pub mod summary;

pub use config::{DataConfig, OutputConfig, RunConfig, StrategyEntry};
pub use data_loader::{generate_synthetic_bars, load_csv, LoadError, LoadedBars};
pub use recorder::{CsvSink, JsonlSink, SinkHandle, SinkRegistry, TradeRecorder, TradeRow};
pub use runner::{execute, run_all, run_strategy, RunError, RunReport, RunSummary};
pub use summary::{read_jsonl, render_table, summarize, GroupBy, GroupStats, SummaryError, TradeLog};
