//! Trade closer: turns a closed position plus the exit bar's context into a
//! complete `TradeRecord`.

use crate::components::signal::BarContext;
use crate::config::StrategyConfig;
use crate::domain::{Instrument, TradeLeg, TradeRecord};
use crate::exit::ClosedPosition;
use crate::indicators::{adx_key, atr_key, momentum_key};

/// Numbers trades and snapshots the decision context at exit.
#[derive(Debug, Clone)]
pub struct TradeCloser {
    strategy: String,
    account: String,
    instrument: Instrument,
    commission_per_contract: f64,
    adx_key: String,
    atr_key: String,
    momentum_key: String,
    next_trade_number: u64,
}

impl TradeCloser {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            strategy: config.name.clone(),
            account: config.account.clone(),
            instrument: config.instrument.clone(),
            commission_per_contract: config.execution.commission_per_contract,
            adx_key: adx_key(config.indicators.adx_period),
            atr_key: atr_key(config.indicators.atr_period),
            momentum_key: momentum_key(config.indicators.momentum_period),
            next_trade_number: 1,
        }
    }

    pub fn trades_closed(&self) -> u64 {
        self.next_trade_number - 1
    }

    pub fn close(&mut self, closed: &ClosedPosition, ctx: &BarContext<'_>) -> TradeRecord {
        let position = &closed.position;
        let trade_number = self.next_trade_number;
        self.next_trade_number += 1;

        let profit_ticks = position.unrealized_ticks(&self.instrument, closed.exit_price);
        let gross = profit_ticks * self.instrument.tick_value() * position.quantity;
        let commission = self.commission_per_contract * position.quantity;
        let plan = &position.plan;

        TradeRecord {
            strategy: self.strategy.clone(),
            instrument: self.instrument.symbol.clone(),
            account: self.account.clone(),
            trade_number,
            entry: Some(TradeLeg {
                time: position.entry_time,
                price: position.entry_price,
            }),
            exit: Some(TradeLeg {
                time: closed.exit_time,
                price: closed.exit_price,
            }),
            side: position.side,
            quantity: position.quantity,
            exit_reason: closed.reason.name().to_string(),
            profit_ticks,
            profit_currency: gross - commission,
            commission,
            mfe_ticks: position.mfe_ticks,
            mae_ticks: position.mae_ticks,
            regime: position.context.regime.name().to_string(),
            signal_source: position.context.sources.join("+"),
            stop_mode: plan.stop.name().to_string(),
            target_mode: plan.profit.name().to_string(),
            confluence_score: position.context.confluence_score,
            adx_at_exit: ctx.indicator(&self.adx_key),
            atr_at_exit: ctx.indicator(&self.atr_key),
            momentum_at_exit: ctx.indicator(&self.momentum_key),
            bars_in_trade: position.bars_in_trade,
            initial_sl_ticks: position.initial_stop_ticks,
            initial_tp_ticks: position.initial_target_ticks,
            breakeven_trigger_ticks: position.breakeven_trigger_ticks.unwrap_or(0.0),
            slippage_ticks: closed.slippage_ticks,
        }
    }
}
