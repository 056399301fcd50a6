//! Confluence CLI: run strategies, inspect presets, summarize trade logs.
//!
//! Commands:
//! - `run`: execute a run file (bars, outputs, strategies)
//! - `presets`: list built-in presets or print one as strategy TOML
//! - `summary`: group a JSONL trade log by source, regime or exit reason

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use confluence_core::presets::PresetRegistry;
use confluence_runner::runner::{execute, RunReport};
use confluence_runner::summary::{read_jsonl, render_table, summarize, GroupBy};
use confluence_runner::{RunConfig, SinkRegistry};

#[derive(Parser)]
#[command(
    name = "confluence",
    about = "Confluence: multi-bot signal aggregation and exit management"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a run file.
    Run {
        /// Path to the run TOML.
        #[arg(long)]
        config: PathBuf,

        /// Run strategies one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write the run report as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List built-in presets, or print one as a strategy TOML.
    Presets {
        /// Preset to print.
        #[arg(long)]
        show: Option<String>,
    },
    /// Summarize a JSONL trade log.
    Summary {
        /// JSONL file written by the recorder.
        #[arg(long)]
        trades: PathBuf,

        /// Grouping key.
        #[arg(long, value_enum, default_value_t = Grouping::Source)]
        by: Grouping,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "kebab-case")]
enum Grouping {
    Source,
    Regime,
    ExitReason,
    Strategy,
}

impl From<Grouping> for GroupBy {
    fn from(grouping: Grouping) -> Self {
        match grouping {
            Grouping::Source => GroupBy::Source,
            Grouping::Regime => GroupBy::Regime,
            Grouping::ExitReason => GroupBy::ExitReason,
            Grouping::Strategy => GroupBy::Strategy,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            sequential,
            report,
        } => run_cmd(&config, !sequential, report.as_deref()),
        Commands::Presets { show } => presets_cmd(show.as_deref()),
        Commands::Summary { trades, by } => summary_cmd(&trades, by.into()),
    }
}

/// Logs go to stderr so tables on stdout stay clean.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn run_cmd(config_path: &Path, parallel: bool, report_path: Option<&Path>) -> Result<()> {
    let run = RunConfig::load(config_path)
        .with_context(|| format!("loading run file {}", config_path.display()))?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    if run.output.csv.is_none() && run.output.jsonl.is_none() {
        info!("no [output] sinks configured; trades will not be persisted");
    }

    let report = execute(
        &run,
        &base_dir,
        &PresetRegistry::builtin(),
        &SinkRegistry::new(),
        parallel,
    )?;
    print_report(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run report {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!(
        "Bars: {}{}  dataset {}",
        report.bar_count,
        if report.synthetic { " (synthetic)" } else { "" },
        &report.dataset_hash[..16]
    );
    println!(
        "{:<20} {:>8} {:>8} {:>9} {:>8} {:>8} {:>12}",
        "strategy", "signals", "entries", "rejected", "trades", "failed", "net"
    );
    for s in &report.summaries {
        println!(
            "{:<20} {:>8} {:>8} {:>9} {:>8} {:>8} {:>12.2}",
            s.strategy,
            s.stats.signals,
            s.stats.entries,
            s.stats.total_rejections(),
            s.stats.trades,
            s.stats.record_failures,
            s.stats.net_profit
        );
        for (reason, count) in &s.stats.rejections {
            println!("    {reason}: {count}");
        }
    }
    for path in &report.outputs {
        println!("Trades appended to: {}", path.display());
    }
}

fn presets_cmd(show: Option<&str>) -> Result<()> {
    let registry = PresetRegistry::builtin();
    match show {
        Some(name) => {
            let preset = registry.get(name)?;
            print!("{}", toml::to_string_pretty(&preset)?);
        }
        None => {
            for preset in registry.iter() {
                let bots: Vec<&str> = preset.enabled_bots().map(|(id, _)| id.as_str()).collect();
                println!(
                    "{:<18} {:<6} {:?} min_score={} bots={}",
                    preset.name,
                    preset.instrument.symbol,
                    preset.confluence.method,
                    preset.confluence.min_score,
                    bots.join(",")
                );
            }
        }
    }
    Ok(())
}

fn summary_cmd(trades: &Path, by: GroupBy) -> Result<()> {
    let log = read_jsonl(trades)?;
    if log.trades.is_empty() {
        bail!("no trade records in {}", trades.display());
    }
    if log.skipped > 0 {
        info!(skipped = log.skipped, "ignored non-trade or malformed lines");
    }
    let groups = summarize(&log.trades, by);
    print!("{}", render_table(&groups, by, &log.trades));
    Ok(())
}
