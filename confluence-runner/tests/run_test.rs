//! End-to-end runs: run file → bars → parallel strategies → shared sinks →
//! trade-log summary.

use std::fs;

use confluence_core::presets::PresetRegistry;
use confluence_runner::config::RunConfig;
use confluence_runner::recorder::SinkRegistry;
use confluence_runner::runner::execute;
use confluence_runner::summary::{read_jsonl, render_table, summarize, GroupBy};

const RUN: &str = r#"
[data]
synthetic_bars = 3000
seed = 11

[output]
csv = "out/trades.csv"
jsonl = "out/trades.jsonl"

[[strategy]]
preset = "trend_rider"

[[strategy]]
preset = "momentum_scalper"

[[strategy]]
preset = "range_fader"
account = "Sim202"
"#;

#[test]
fn synthetic_run_records_every_trade_once() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::from_toml(RUN).unwrap();
    let report = execute(
        &run,
        dir.path(),
        &PresetRegistry::builtin(),
        &SinkRegistry::new(),
        true,
    )
    .unwrap();

    assert!(report.synthetic);
    assert_eq!(report.bar_count, 3000);
    assert_eq!(report.outputs.len(), 2);
    assert_eq!(report.summaries.len(), 3);
    assert_eq!(report.summaries[2].account, "Sim202");

    let total: u64 = report.summaries.iter().map(|s| s.stats.trades).sum();
    for summary in &report.summaries {
        assert_eq!(summary.stats.bars, 3000);
        assert_eq!(summary.stats.record_failures, 0);
        assert_eq!(summary.config_hash.len(), 64);
    }

    let csv = fs::read_to_string(dir.path().join("out/trades.csv")).unwrap();
    assert_eq!(csv.lines().count() as u64, total + 1);

    let log = read_jsonl(&dir.path().join("out/trades.jsonl")).unwrap();
    assert_eq!(log.trades.len() as u64, total);
    assert_eq!(log.skipped, 0);

    // Per-strategy trade numbers are 1..=n with no gaps.
    for summary in &report.summaries {
        let mut numbers: Vec<u64> = log
            .trades
            .iter()
            .filter(|t| t.strategy == summary.strategy)
            .map(|t| t.trade_number)
            .collect();
        numbers.sort_unstable();
        let expected: Vec<u64> = (1..=summary.stats.trades).collect();
        assert_eq!(numbers, expected, "{}", summary.strategy);
    }

    let by_strategy = summarize(&log.trades, GroupBy::Strategy);
    for summary in &report.summaries {
        let group_trades = by_strategy.get(&summary.strategy).map_or(0, |g| g.trades);
        assert_eq!(group_trades as u64, summary.stats.trades);
    }
    let table = render_table(&summarize(&log.trades, GroupBy::ExitReason), GroupBy::ExitReason, &log.trades);
    assert!(table.lines().last().unwrap().starts_with("TOTAL"));
}

#[test]
fn rerun_appends_without_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::from_toml(RUN).unwrap();
    let presets = PresetRegistry::builtin();
    let first = execute(&run, dir.path(), &presets, &SinkRegistry::new(), false).unwrap();
    let second = execute(&run, dir.path(), &presets, &SinkRegistry::new(), false).unwrap();

    let per_run: u64 = first.summaries.iter().map(|s| s.stats.trades).sum();
    let again: u64 = second.summaries.iter().map(|s| s.stats.trades).sum();
    assert_eq!(per_run, again);
    assert_eq!(first.dataset_hash, second.dataset_hash);

    let csv = fs::read_to_string(dir.path().join("out/trades.csv")).unwrap();
    assert_eq!(csv.lines().count() as u64, 2 * per_run + 1);
    assert_eq!(csv.lines().filter(|l| l.starts_with("strategy,")).count(), 1);
}

#[test]
fn csv_bar_file_drives_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let bars = confluence_runner::generate_synthetic_bars("ES", 800, 5);
    let mut text = String::from("timestamp,open,high,low,close,volume\n");
    for bar in &bars {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    fs::create_dir_all(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/es.csv"), text).unwrap();

    let run = RunConfig::from_toml(
        "[data]\nbars = \"data/es.csv\"\n\n[output]\njsonl = \"trades.jsonl\"\n\n[[strategy]]\npreset = \"trend_rider\"\n",
    )
    .unwrap();
    let report = execute(
        &run,
        dir.path(),
        &PresetRegistry::builtin(),
        &SinkRegistry::new(),
        true,
    )
    .unwrap();
    assert!(!report.synthetic);
    assert_eq!(report.bar_count, 800);
    assert_eq!(
        report.dataset_hash,
        confluence_runner::data_loader::dataset_hash(&bars)
    );
}

#[test]
fn unknown_preset_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let run = RunConfig::from_toml(
        "[data]\nsynthetic_bars = 10\n\n[output]\ncsv = \"t.csv\"\n\n[[strategy]]\npreset = \"nope\"\n",
    )
    .unwrap();
    let err = execute(
        &run,
        dir.path(),
        &PresetRegistry::builtin(),
        &SinkRegistry::new(),
        true,
    )
    .unwrap_err();
    assert!(err.to_string().contains("nope"));
    assert!(!dir.path().join("t.csv").exists());
}

#[test]
fn demo_run_file_resolves_and_runs() {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
    let mut run = RunConfig::load(&demos.join("run.toml")).unwrap();
    let out = tempfile::tempdir().unwrap();
    run.output.csv = Some(out.path().join("trades.csv"));
    run.output.jsonl = None;
    run.data.synthetic_bars = Some(1500);

    let report = execute(
        &run,
        &demos,
        &PresetRegistry::builtin(),
        &SinkRegistry::new(),
        true,
    )
    .unwrap();
    let names: Vec<&str> = report.summaries.iter().map(|s| s.strategy.as_str()).collect();
    assert_eq!(names, vec!["trend_rider", "momentum_scalper", "es_breakout"]);
    assert_eq!(report.summaries[1].account, "Sim102");
    assert_eq!(report.outputs.len(), 1);
    assert!(report.outputs[0].ends_with("trades.csv"));
    assert!(out.path().join("trades.csv").exists());
    assert!(!demos.join("out").exists());
}
