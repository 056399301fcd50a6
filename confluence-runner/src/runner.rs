//! Run orchestration: resolve strategies, load bars once, drive one engine
//! per strategy (in parallel) against a shared trade recorder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use confluence_core::config::{ConfigError, StrategyConfig};
use confluence_core::domain::{Bar, TradeSink};
use confluence_core::engine::{EngineError, EngineStats, StrategyEngine};
use confluence_core::presets::PresetRegistry;

use crate::config::RunConfig;
use crate::data_loader::{self, LoadError};
use crate::recorder::{SinkRegistry, TradeRecorder};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Outcome of one strategy over the bar series.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub strategy: String,
    pub account: String,
    pub config_hash: String,
    pub stats: EngineStats,
}

/// Outcome of a whole run configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dataset_hash: String,
    pub synthetic: bool,
    pub bar_count: usize,
    pub outputs: Vec<PathBuf>,
    pub summaries: Vec<RunSummary>,
}

/// Drive one strategy over `bars`, recording trades into `sink`.
pub fn run_strategy(
    config: StrategyConfig,
    bars: &[Bar],
    sink: Arc<dyn TradeSink>,
) -> Result<RunSummary, RunError> {
    let config_hash = config.config_hash()?;
    let strategy = config.name.clone();
    let account = config.account.clone();
    let mut engine = StrategyEngine::from_config(config, sink)?;
    let stats = engine.run(bars);
    info!(
        strategy = %strategy,
        bars = stats.bars,
        trades = stats.trades,
        rejections = stats.total_rejections(),
        net_profit = stats.net_profit,
        "strategy finished"
    );
    Ok(RunSummary {
        strategy,
        account,
        config_hash,
        stats,
    })
}

/// Run every strategy over the same bars. Results keep input order.
pub fn run_all(
    configs: &[StrategyConfig],
    bars: &[Bar],
    sink: Arc<dyn TradeSink>,
    parallel: bool,
) -> Result<Vec<RunSummary>, RunError> {
    if parallel {
        configs
            .par_iter()
            .map(|config| run_strategy(config.clone(), bars, Arc::clone(&sink)))
            .collect()
    } else {
        configs
            .iter()
            .map(|config| run_strategy(config.clone(), bars, Arc::clone(&sink)))
            .collect()
    }
}

/// Execute a run configuration end to end. Relative paths resolve against
/// `base_dir` (normally the directory holding the run file).
pub fn execute(
    run: &RunConfig,
    base_dir: &Path,
    presets: &PresetRegistry,
    registry: &SinkRegistry,
    parallel: bool,
) -> Result<RunReport, RunError> {
    let configs = run.resolve_strategies(presets, base_dir)?;
    let loaded = data_loader::load(&run.data, base_dir)?;

    let csv = run.output.csv.as_ref().map(|p| base_dir.join(p));
    let jsonl = run.output.jsonl.as_ref().map(|p| base_dir.join(p));
    let recorder = TradeRecorder::open(registry, csv.as_deref(), jsonl.as_deref());
    let outputs = recorder.paths();
    let sink: Arc<dyn TradeSink> = Arc::new(recorder);

    info!(
        strategies = configs.len(),
        bars = loaded.bars.len(),
        parallel,
        "starting run"
    );
    let summaries = run_all(&configs, &loaded.bars, sink, parallel)?;

    Ok(RunReport {
        dataset_hash: loaded.dataset_hash,
        synthetic: loaded.synthetic,
        bar_count: loaded.bars.len(),
        outputs,
        summaries,
    })
}
