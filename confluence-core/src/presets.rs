//! Named strategy presets.
//!
//! Presets are plain `StrategyConfig` values; the registry only stores and
//! hands out copies. Built-ins target a generic E-mini style contract.

use std::collections::BTreeMap;

use chrono::NaiveTime;

use crate::aggregator::ConfluenceMethod;
use crate::config::{
    BotConfig, ChopConfig, ConfigError, ConfluenceConfig, ExecutionConfig, ExitPlans, GateConfig,
    IndicatorSettings, StrategyConfig,
};
use crate::domain::Instrument;
use crate::exit::{Breakeven, BreakevenTrigger, ExitPlan, ProfitMode, StopMode};
use crate::gate::SessionWindow;

#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: BTreeMap<String, StrategyConfig>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in presets.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(trend_rider());
        registry.register(momentum_scalper());
        registry.register(range_fader());
        registry
    }

    /// Add or replace a preset under its config name.
    pub fn register(&mut self, config: StrategyConfig) {
        self.presets.insert(config.name.clone(), config);
    }

    pub fn get(&self, name: &str) -> Result<StrategyConfig, ConfigError> {
        self.presets
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyConfig> {
        self.presets.values()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn es() -> Instrument {
    Instrument::new("ES", 0.25, 50.0)
}

fn regular_hours() -> Vec<SessionWindow> {
    vec![
        SessionWindow::new("morning", time(9, 30), time(11, 30)),
        SessionWindow::new("afternoon", time(13, 30), time(15, 45)),
    ]
}

/// Trend following: EMA trend plus momentum, ATR trailing in trends.
fn trend_rider() -> StrategyConfig {
    let bots = BTreeMap::from([
        (
            "ema_cross".to_string(),
            BotConfig::enabled()
                .with_weight(2.0)
                .with_param("fast_period", 9.0)
                .with_param("slow_period", 21.0),
        ),
        ("momentum".to_string(), BotConfig::enabled()),
        ("breakout".to_string(), BotConfig::enabled().with_param("lookback", 30.0)),
    ]);
    StrategyConfig {
        name: "trend_rider".into(),
        account: "Sim101".into(),
        instrument: es(),
        quantity: 1.0,
        bots,
        confluence: ConfluenceConfig {
            method: ConfluenceMethod::Weighted,
            min_score: 60.0,
        },
        gate: GateConfig {
            sessions: regular_hours(),
            auto_regime: true,
            regime_adx_threshold: 25.0,
            chop: ChopConfig {
                enabled: true,
                period: 10,
                threshold: 0.25,
            },
            flatten_outside_session: true,
        },
        exits: ExitPlans {
            default: ExitPlan {
                initial_stop_ticks: 12.0,
                stop: StopMode::FixedStop,
                profit: ProfitMode::RiskRewardRatio { ratio: 1.5 },
                breakeven: Some(Breakeven {
                    trigger: BreakevenTrigger::ProfitTargetPercentage { percent: 50.0 },
                    offset_ticks: 1.0,
                }),
            },
            trending: Some(ExitPlan {
                initial_stop_ticks: 16.0,
                stop: StopMode::AtrTrail {
                    atr_multiplier: 2.5,
                },
                profit: ProfitMode::RiskRewardRatio { ratio: 3.0 },
                breakeven: Some(Breakeven {
                    trigger: BreakevenTrigger::FixedTicks { ticks: 12.0 },
                    offset_ticks: 2.0,
                }),
            }),
            ranging: None,
        },
        execution: ExecutionConfig {
            commission_per_contract: 4.5,
            slippage_ticks: 1.0,
            max_bars_in_trade: Some(120),
        },
        indicators: IndicatorSettings::default(),
    }
}

/// Short-horizon momentum with tight fixed exits and a high-low trail.
fn momentum_scalper() -> StrategyConfig {
    let bots = BTreeMap::from([
        (
            "momentum".to_string(),
            BotConfig::enabled()
                .with_param("period", 5.0)
                .with_param("threshold_pct", 0.05)
                .with_param("full_strength_pct", 0.3),
        ),
        (
            "ema_cross".to_string(),
            BotConfig::enabled()
                .with_param("fast_period", 5.0)
                .with_param("slow_period", 13.0),
        ),
    ]);
    StrategyConfig {
        name: "momentum_scalper".into(),
        account: "Sim101".into(),
        instrument: es(),
        quantity: 2.0,
        bots,
        confluence: ConfluenceConfig {
            method: ConfluenceMethod::Count,
            min_score: 100.0,
        },
        gate: GateConfig {
            sessions: vec![SessionWindow::new("rth", time(9, 30), time(16, 0))],
            auto_regime: false,
            regime_adx_threshold: 25.0,
            chop: ChopConfig::default(),
            flatten_outside_session: true,
        },
        exits: ExitPlans {
            default: ExitPlan {
                initial_stop_ticks: 8.0,
                stop: StopMode::HighLowTrail { offset_ticks: 10.0 },
                profit: ProfitMode::Fixed { target_ticks: 12.0 },
                breakeven: Some(Breakeven {
                    trigger: BreakevenTrigger::FixedTicks { ticks: 6.0 },
                    offset_ticks: 1.0,
                }),
            },
            trending: None,
            ranging: None,
        },
        execution: ExecutionConfig {
            commission_per_contract: 4.5,
            slippage_ticks: 1.0,
            max_bars_in_trade: Some(30),
        },
        indicators: IndicatorSettings {
            momentum_period: 5,
            ..IndicatorSettings::default()
        },
    }
}

/// Breakout confirmation in ranging markets with quick targets.
fn range_fader() -> StrategyConfig {
    let bots = BTreeMap::from([
        (
            "breakout".to_string(),
            BotConfig::enabled()
                .with_param("lookback", 15.0)
                .with_param("min_strength", 0.4),
        ),
        (
            "momentum".to_string(),
            BotConfig::enabled().with_param("period", 8.0),
        ),
    ]);
    StrategyConfig {
        name: "range_fader".into(),
        account: "Sim101".into(),
        instrument: es(),
        quantity: 1.0,
        bots,
        confluence: ConfluenceConfig {
            method: ConfluenceMethod::Strength,
            min_score: 50.0,
        },
        gate: GateConfig {
            sessions: regular_hours(),
            auto_regime: true,
            regime_adx_threshold: 20.0,
            chop: ChopConfig::default(),
            flatten_outside_session: false,
        },
        exits: ExitPlans {
            default: ExitPlan {
                initial_stop_ticks: 10.0,
                stop: StopMode::FixedStop,
                profit: ProfitMode::Fixed { target_ticks: 16.0 },
                breakeven: None,
            },
            trending: None,
            ranging: Some(ExitPlan {
                initial_stop_ticks: 8.0,
                stop: StopMode::FixedStop,
                profit: ProfitMode::RiskRewardRatio { ratio: 1.0 },
                breakeven: None,
            }),
        },
        execution: ExecutionConfig {
            commission_per_contract: 4.5,
            slippage_ticks: 0.0,
            max_bars_in_trade: None,
        },
        indicators: IndicatorSettings::default(),
    }
}
