//! One flat, rounded row per trade. Both sinks encode the same `TradeRow`, so
//! the CSV text and the JSON numbers always agree.

use serde::{Deserialize, Serialize};

use confluence_core::domain::{RecordError, TradeRecord};

/// CSV column order.
pub const HEADER: [&str; 29] = [
    "strategy",
    "instrument",
    "account",
    "trade_number",
    "entry_time",
    "entry_price",
    "exit_time",
    "exit_price",
    "direction",
    "quantity",
    "exit_reason",
    "profit_ticks",
    "profit_currency",
    "commission",
    "mfe_ticks",
    "mae_ticks",
    "regime",
    "signal_source",
    "stop_mode",
    "target_mode",
    "confluence_score",
    "adx_at_exit",
    "atr_at_exit",
    "momentum_at_exit",
    "bars_in_trade",
    "initial_sl_ticks",
    "initial_tp_ticks",
    "breakeven_trigger_ticks",
    "slippage_ticks",
];

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub strategy: String,
    pub instrument: String,
    pub account: String,
    pub trade_number: u64,
    pub entry_time: String,
    pub entry_price: f64,
    pub exit_time: String,
    pub exit_price: f64,
    pub direction: String,
    pub quantity: f64,
    pub exit_reason: String,
    pub profit_ticks: f64,
    pub profit_currency: f64,
    pub commission: f64,
    pub mfe_ticks: f64,
    pub mae_ticks: f64,
    pub regime: String,
    pub signal_source: String,
    pub stop_mode: String,
    pub target_mode: String,
    pub confluence_score: f64,
    pub adx_at_exit: Option<f64>,
    pub atr_at_exit: Option<f64>,
    pub momentum_at_exit: Option<f64>,
    pub bars_in_trade: u32,
    pub initial_sl_ticks: f64,
    pub initial_tp_ticks: f64,
    pub breakeven_trigger_ticks: f64,
    pub slippage_ticks: f64,
}

impl TradeRow {
    /// Flatten and round a record. Fails before anything is encoded when a
    /// leg is missing.
    pub fn from_record(trade: &TradeRecord) -> Result<Self, RecordError> {
        let (entry, exit) = trade.legs()?;
        Ok(Self {
            strategy: sanitize(&trade.strategy),
            instrument: sanitize(&trade.instrument),
            account: sanitize(&trade.account),
            trade_number: trade.trade_number,
            entry_time: entry.time.format(TIME_FORMAT).to_string(),
            entry_price: round2(entry.price),
            exit_time: exit.time.format(TIME_FORMAT).to_string(),
            exit_price: round2(exit.price),
            direction: trade.side.name().to_string(),
            quantity: round2(trade.quantity),
            exit_reason: sanitize(&trade.exit_reason),
            profit_ticks: round2(trade.profit_ticks),
            profit_currency: round2(trade.profit_currency),
            commission: round2(trade.commission),
            mfe_ticks: round2(trade.mfe_ticks),
            mae_ticks: round2(trade.mae_ticks),
            regime: sanitize(&trade.regime),
            signal_source: sanitize(&trade.signal_source),
            stop_mode: sanitize(&trade.stop_mode),
            target_mode: sanitize(&trade.target_mode),
            confluence_score: round2(trade.confluence_score),
            adx_at_exit: trade.adx_at_exit.filter(|v| v.is_finite()).map(round2),
            atr_at_exit: trade.atr_at_exit.filter(|v| v.is_finite()).map(round2),
            momentum_at_exit: trade.momentum_at_exit.filter(|v| v.is_finite()).map(round2),
            bars_in_trade: trade.bars_in_trade,
            initial_sl_ticks: round2(trade.initial_sl_ticks),
            initial_tp_ticks: round2(trade.initial_tp_ticks),
            breakeven_trigger_ticks: round2(trade.breakeven_trigger_ticks),
            slippage_ticks: round2(trade.slippage_ticks),
        })
    }

    /// CSV fields in `HEADER` order. Absent indicators are empty.
    pub fn csv_fields(&self) -> Vec<String> {
        vec![
            self.strategy.clone(),
            self.instrument.clone(),
            self.account.clone(),
            self.trade_number.to_string(),
            self.entry_time.clone(),
            fixed(self.entry_price),
            self.exit_time.clone(),
            fixed(self.exit_price),
            self.direction.clone(),
            fixed(self.quantity),
            self.exit_reason.clone(),
            fixed(self.profit_ticks),
            fixed(self.profit_currency),
            fixed(self.commission),
            fixed(self.mfe_ticks),
            fixed(self.mae_ticks),
            self.regime.clone(),
            self.signal_source.clone(),
            self.stop_mode.clone(),
            self.target_mode.clone(),
            fixed(self.confluence_score),
            self.adx_at_exit.map(fixed).unwrap_or_default(),
            self.atr_at_exit.map(fixed).unwrap_or_default(),
            self.momentum_at_exit.map(fixed).unwrap_or_default(),
            self.bars_in_trade.to_string(),
            fixed(self.initial_sl_ticks),
            fixed(self.initial_tp_ticks),
            fixed(self.breakeven_trigger_ticks),
            fixed(self.slippage_ticks),
        ]
    }
}

/// Strip the CSV delimiter and line breaks from free text.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ',' => ';',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid "-0.00" in the CSV text.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn fixed(value: f64) -> String {
    format!("{value:.2}")
}
