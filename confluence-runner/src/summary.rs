//! Trade-log analysis over the JSONL sink: which sources, regimes and exit
//! reasons actually pay.
//!
//! Lines that are blank, malformed or not `record_type = "trade"` are
//! skipped and counted, not fatal.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::recorder::{JsonLine, TradeRow, TRADE_RECORD_TYPE};

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("failed to read trade log {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown grouping `{0}` (expected source, regime, exit-reason or strategy)")]
    UnknownGrouping(String),
}

/// Grouping key for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Each contributing bot; a multi-source trade counts once per source.
    Source,
    Regime,
    ExitReason,
    Strategy,
}

impl GroupBy {
    fn keys(self, row: &TradeRow) -> Vec<String> {
        match self {
            GroupBy::Source => row
                .signal_source
                .split('+')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            GroupBy::Regime => vec![row.regime.clone()],
            GroupBy::ExitReason => vec![row.exit_reason.clone()],
            GroupBy::Strategy => vec![row.strategy.clone()],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GroupBy::Source => "source",
            GroupBy::Regime => "regime",
            GroupBy::ExitReason => "exit-reason",
            GroupBy::Strategy => "strategy",
        }
    }
}

impl FromStr for GroupBy {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" | "signal_source" => Ok(GroupBy::Source),
            "regime" => Ok(GroupBy::Regime),
            "exit-reason" | "exit_reason" => Ok(GroupBy::ExitReason),
            "strategy" => Ok(GroupBy::Strategy),
            other => Err(SummaryError::UnknownGrouping(other.to_string())),
        }
    }
}

/// Trades read back from a JSONL sink.
#[derive(Debug, Clone, Default)]
pub struct TradeLog {
    pub trades: Vec<TradeRow>,
    pub skipped: usize,
}

pub fn read_jsonl(path: &Path) -> Result<TradeLog, SummaryError> {
    let io_err = |source: io::Error| SummaryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut log = TradeLog::default();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonLine>(&line) {
            Ok(entry) if entry.record_type == TRADE_RECORD_TYPE => log.trades.push(entry.row),
            Ok(_) => log.skipped += 1,
            Err(e) => {
                debug!(line = i + 1, error = %e, "skipping malformed trade line");
                log.skipped += 1;
            }
        }
    }
    Ok(log)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub trades: usize,
    pub winners: usize,
    pub losers: usize,
    pub net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub total_ticks: f64,
    pub total_mfe_ticks: f64,
    pub total_mae_ticks: f64,
    pub total_bars: u64,
}

impl GroupStats {
    fn add(&mut self, row: &TradeRow) {
        self.trades += 1;
        if row.profit_currency > 0.0 {
            self.winners += 1;
            self.gross_profit += row.profit_currency;
        } else if row.profit_currency < 0.0 {
            self.losers += 1;
            self.gross_loss += -row.profit_currency;
        }
        self.net_profit += row.profit_currency;
        self.total_ticks += row.profit_ticks;
        self.total_mfe_ticks += row.mfe_ticks;
        self.total_mae_ticks += row.mae_ticks;
        self.total_bars += u64::from(row.bars_in_trade);
    }

    pub fn win_rate(&self) -> f64 {
        ratio(self.winners as f64, self.trades)
    }

    pub fn avg_profit(&self) -> f64 {
        ratio(self.net_profit, self.trades)
    }

    pub fn avg_ticks(&self) -> f64 {
        ratio(self.total_ticks, self.trades)
    }

    pub fn avg_mfe_ticks(&self) -> f64 {
        ratio(self.total_mfe_ticks, self.trades)
    }

    pub fn avg_mae_ticks(&self) -> f64 {
        ratio(self.total_mae_ticks, self.trades)
    }

    pub fn avg_bars(&self) -> f64 {
        ratio(self.total_bars as f64, self.trades)
    }

    /// Gross profit over gross loss; `None` without losses.
    pub fn profit_factor(&self) -> Option<f64> {
        (self.gross_loss > 0.0).then(|| self.gross_profit / self.gross_loss)
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Group trades by `by`. Keys come back sorted.
pub fn summarize(trades: &[TradeRow], by: GroupBy) -> BTreeMap<String, GroupStats> {
    let mut groups: BTreeMap<String, GroupStats> = BTreeMap::new();
    for row in trades {
        for key in by.keys(row) {
            groups.entry(key).or_default().add(row);
        }
    }
    groups
}

/// Plain-text table of a summary, one line per group plus a total.
pub fn render_table(groups: &BTreeMap<String, GroupStats>, by: GroupBy, trades: &[TradeRow]) -> String {
    let mut total = GroupStats::default();
    for row in trades {
        total.add(row);
    }

    let width = groups
        .keys()
        .map(String::len)
        .chain([by.label().len(), "TOTAL".len()])
        .max()
        .unwrap_or(8);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>6}  {:>6}  {:>12}  {:>10}  {:>9}  {:>8}  {:>8}  {:>6}  {:>6}",
        by.label(),
        "trades",
        "win%",
        "net",
        "avg",
        "avg_tick",
        "avg_mfe",
        "avg_mae",
        "bars",
        "pf",
    );
    let mut line = |name: &str, s: &GroupStats| {
        let pf = s
            .profit_factor()
            .map_or_else(|| "-".to_string(), |pf| format!("{pf:.2}"));
        let _ = writeln!(
            out,
            "{:<width$}  {:>6}  {:>6.1}  {:>12.2}  {:>10.2}  {:>9.2}  {:>8.2}  {:>8.2}  {:>6.1}  {:>6}",
            name,
            s.trades,
            s.win_rate() * 100.0,
            s.net_profit,
            s.avg_profit(),
            s.avg_ticks(),
            s.avg_mfe_ticks(),
            s.avg_mae_ticks(),
            s.avg_bars(),
            pf,
        );
    };
    for (name, stats) in groups {
        line(name, stats);
    }
    line("TOTAL", &total);
    out
}
