//! Per-bar strategy engine.
//!
//! One engine drives one strategy over one bar stream. Each bar runs to
//! completion on the calling thread:
//!
//! - **Flat:** poll bots → aggregate → gate → open through the exit machine.
//! - **In a position:** advance the exit machine; then apply forced exits
//!   (session end, max bars) at the bar close.
//!
//! Closed positions become `TradeRecord`s handed to the shared sink. A sink
//! failure is logged and counted; it never stops the loop.

pub mod closer;

pub use closer::TradeCloser;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::aggregator::{Aggregation, SignalAggregator};
use crate::components::factory::create_bot;
use crate::components::filter::{AdxRegimeClassifier, EfficiencyChopDetector};
use crate::components::indicator::{Indicator, IndicatorValues};
use crate::components::signal::{BarContext, SignalSource};
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Bar, Side, TradeRecord, TradeSink};
use crate::exit::{ClosedPosition, EntryContext, ExitMachine, ExitReason, OpenError, OpenRequest};
use crate::gate::{FilterGate, GateDecision, RejectReason, SessionSchedule};
use crate::indicators::{atr_key, Adx, Atr, Momentum};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What happened on one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    /// Flat and no directional signal.
    Idle,
    /// Position carried into the next bar.
    Holding,
    Conflict,
    BelowThreshold,
    Rejected(RejectReason),
    Entered { side: Side, price: f64 },
    Exited(Box<TradeRecord>),
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub bars: u64,
    pub signals: u64,
    pub conflicts: u64,
    pub below_threshold: u64,
    pub rejections: BTreeMap<String, u64>,
    pub entries: u64,
    pub trades: u64,
    pub record_failures: u64,
    pub net_profit: f64,
}

impl EngineStats {
    pub fn total_rejections(&self) -> u64 {
        self.rejections.values().sum()
    }
}

pub struct StrategyEngine {
    config: StrategyConfig,
    bots: Vec<Box<dyn SignalSource>>,
    aggregator: SignalAggregator,
    gate: FilterGate,
    machine: ExitMachine,
    closer: TradeCloser,
    sink: Arc<dyn TradeSink>,
    atr_key: String,
    /// Index of the bar that last closed a position; no re-entry on it.
    last_exit_index: Option<usize>,
    stats: EngineStats,
}

impl StrategyEngine {
    /// Build every component from configuration.
    pub fn from_config(
        config: StrategyConfig,
        sink: Arc<dyn TradeSink>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut bots = Vec::new();
        for (id, bot) in config.enabled_bots() {
            let source =
                create_bot(id, bot.kind.as_deref(), &bot.params).map_err(ConfigError::from)?;
            bots.push(source);
        }

        let mut gate = FilterGate::new(SessionSchedule::new(config.gate.sessions.clone()));
        if config.gate.auto_regime {
            gate = gate.with_regime(Box::new(AdxRegimeClassifier::new(
                config.indicators.adx_period,
                config.gate.regime_adx_threshold,
            )));
        }
        if config.gate.chop.enabled {
            gate = gate.with_chop(Box::new(EfficiencyChopDetector::new(
                config.gate.chop.period,
                config.gate.chop.threshold,
            )));
        }

        Ok(Self::with_components(config, bots, gate, sink))
    }

    /// Assemble an engine from prebuilt bots and gate. Bots must match the
    /// enabled entries of `config.bots` for weights to apply; unlisted bots
    /// get weight 1.
    pub fn with_components(
        config: StrategyConfig,
        bots: Vec<Box<dyn SignalSource>>,
        gate: FilterGate,
        sink: Arc<dyn TradeSink>,
    ) -> Self {
        let weights: Vec<(String, f64)> = bots
            .iter()
            .map(|bot| {
                let weight = config.bots.get(bot.name()).map_or(1.0, |b| b.weight);
                (bot.name().to_string(), weight)
            })
            .collect();
        let aggregator = SignalAggregator::new(
            config.confluence.method,
            config.confluence.min_score,
            weights,
        );
        let machine = ExitMachine::new(config.instrument.clone(), config.execution.slippage_ticks);
        let closer = TradeCloser::new(&config);
        let atr_key = atr_key(config.indicators.atr_period);

        for (regime, plan) in [
            ("default", Some(&config.exits.default)),
            ("trending", config.exits.trending.as_ref()),
            ("ranging", config.exits.ranging.as_ref()),
        ] {
            if let Some(Err(e)) = plan.map(|p| p.validate()) {
                warn!(
                    strategy = %config.name,
                    regime,
                    error = %e,
                    "exit plan is invalid; entries using it will be rejected"
                );
            }
        }

        Self {
            config,
            bots,
            aggregator,
            gate,
            machine,
            closer,
            sink,
            atr_key,
            last_exit_index: None,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn machine(&self) -> &ExitMachine {
        &self.machine
    }

    /// Every indicator series the engine and its components read.
    pub fn required_indicators(&self) -> Vec<Box<dyn Indicator>> {
        let ind = &self.config.indicators;
        let mut out: Vec<Box<dyn Indicator>> = vec![
            Box::new(Atr::new(ind.atr_period)),
            Box::new(Adx::new(ind.adx_period)),
            Box::new(Momentum::new(ind.momentum_period)),
        ];
        for bot in &self.bots {
            out.extend(bot.indicators());
        }
        out.extend(self.gate.indicators());
        out
    }

    /// Process one bar.
    pub fn on_bar(&mut self, ctx: &BarContext<'_>) -> BarOutcome {
        self.stats.bars += 1;
        let bar = ctx.bar();
        if !self.machine.is_flat() {
            return self.manage_position(ctx);
        }
        if bar.is_void() || self.last_exit_index == Some(ctx.index) {
            return BarOutcome::Idle;
        }

        let signal = match self.aggregator.evaluate(&self.bots, ctx) {
            Aggregation::NoSignal => return BarOutcome::Idle,
            Aggregation::Conflict {
                long_sources,
                short_sources,
            } => {
                self.stats.conflicts += 1;
                debug!(
                    strategy = %self.config.name,
                    time = %bar.timestamp,
                    ?long_sources,
                    ?short_sources,
                    "conflicting signals, bar void"
                );
                return BarOutcome::Conflict;
            }
            Aggregation::BelowThreshold(s) => {
                self.stats.below_threshold += 1;
                debug!(
                    strategy = %self.config.name,
                    time = %bar.timestamp,
                    score = s.confluence_score,
                    "confluence below threshold"
                );
                return BarOutcome::BelowThreshold;
            }
            Aggregation::Signal(s) => s,
        };
        self.stats.signals += 1;

        let acceptance = match self.gate.evaluate(&signal, ctx) {
            GateDecision::Accept(a) => a,
            GateDecision::Reject(reason) => return self.reject(ctx, reason),
        };

        let request = OpenRequest {
            side: acceptance.side,
            reference_price: bar.close,
            time: bar.timestamp,
            quantity: self.config.quantity,
            plan: self.config.exits.for_regime(acceptance.regime).clone(),
            atr: ctx.indicator(&self.atr_key),
            context: EntryContext {
                sources: signal.contributing_sources.clone(),
                confluence_score: signal.confluence_score,
                regime: acceptance.regime,
                session: acceptance.session.clone(),
            },
        };
        match self.machine.open(request) {
            Ok(position) => {
                self.stats.entries += 1;
                info!(
                    strategy = %self.config.name,
                    time = %bar.timestamp,
                    side = %position.side,
                    price = position.entry_price,
                    stop = position.stop_price(),
                    target = position.target_price,
                    score = signal.confluence_score,
                    sources = %signal.source_label(),
                    regime = %acceptance.regime,
                    session = %acceptance.session,
                    "entered position"
                );
                BarOutcome::Entered {
                    side: position.side,
                    price: position.entry_price,
                }
            }
            Err(OpenError::InvalidPlan(e)) => {
                self.reject(ctx, RejectReason::InvalidExitPlan(e.to_string()))
            }
            // Only reachable if the caller bypassed the flat check.
            Err(OpenError::AlreadyOpen) => BarOutcome::Holding,
        }
    }

    fn reject(&mut self, ctx: &BarContext<'_>, reason: RejectReason) -> BarOutcome {
        *self
            .stats
            .rejections
            .entry(reason.name().to_string())
            .or_insert(0) += 1;
        debug!(strategy = %self.config.name, time = %ctx.bar().timestamp, %reason, "entry rejected");
        BarOutcome::Rejected(reason)
    }

    fn manage_position(&mut self, ctx: &BarContext<'_>) -> BarOutcome {
        let bar = ctx.bar();
        if let Some(closed) = self.machine.on_bar(bar, ctx.indicator(&self.atr_key)) {
            return BarOutcome::Exited(Box::new(self.record(&closed, ctx)));
        }
        if bar.is_void() {
            return BarOutcome::Holding;
        }

        let forced = if self.config.gate.flatten_outside_session && !self.gate.in_session(ctx) {
            Some(ExitReason::SessionEnd)
        } else {
            let max_bars = self.config.execution.max_bars_in_trade;
            let held = self.machine.position().map_or(0, |p| p.bars_in_trade);
            max_bars.filter(|max| held >= *max).map(|_| ExitReason::MaxBars)
        };
        match forced {
            Some(reason) => self
                .force_exit(ctx, reason)
                .map_or(BarOutcome::Holding, |r| BarOutcome::Exited(Box::new(r))),
            None => BarOutcome::Holding,
        }
    }

    /// Close any open position at the bar close for an external reason.
    pub fn force_exit(&mut self, ctx: &BarContext<'_>, reason: ExitReason) -> Option<TradeRecord> {
        let bar = ctx.bar();
        let closed = self.machine.force_exit(bar.timestamp, bar.close, reason)?;
        Some(self.record(&closed, ctx))
    }

    /// Manual flatten.
    pub fn flatten(&mut self, ctx: &BarContext<'_>) -> Option<TradeRecord> {
        self.force_exit(ctx, ExitReason::Manual)
    }

    /// End-of-data flatten on the final bar.
    pub fn finish(&mut self, ctx: &BarContext<'_>) -> Option<TradeRecord> {
        self.force_exit(ctx, ExitReason::EndOfData)
    }

    fn record(&mut self, closed: &ClosedPosition, ctx: &BarContext<'_>) -> TradeRecord {
        self.last_exit_index = Some(ctx.index);
        let record = self.closer.close(closed, ctx);
        self.stats.trades += 1;
        self.stats.net_profit += record.profit_currency;
        info!(
            strategy = %record.strategy,
            trade = record.trade_number,
            side = %record.side,
            reason = %record.exit_reason,
            exit_price = closed.exit_price,
            profit_ticks = record.profit_ticks,
            profit = record.profit_currency,
            bars = record.bars_in_trade,
            "closed position"
        );
        if let Err(e) = self.sink.record(&record) {
            self.stats.record_failures += 1;
            error!(
                strategy = %record.strategy,
                trade = record.trade_number,
                error = %e,
                "failed to record trade"
            );
        }
        record
    }

    /// Drive the engine over a whole bar series: precompute indicators, run
    /// every bar, flatten on the last one.
    pub fn run(&mut self, bars: &[Bar]) -> EngineStats {
        let indicators = IndicatorValues::compute_all(&self.required_indicators(), bars);
        for index in 0..bars.len() {
            let ctx = BarContext::new(bars, index, &indicators);
            self.on_bar(&ctx);
        }
        if let Some(last) = bars.len().checked_sub(1) {
            self.finish(&BarContext::new(bars, last, &indicators));
        }
        self.stats.clone()
    }
}
