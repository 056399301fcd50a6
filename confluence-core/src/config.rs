//! Strategy configuration: one `StrategyConfig` fully describes a strategy
//! instance (instrument, bots, confluence threshold, gate, exit plans and
//! execution costs). Loaded from TOML; presets are values of this type.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregator::ConfluenceMethod;
use crate::components::factory::{create_bot, FactoryError};
use crate::components::filter::Regime;
use crate::domain::{Instrument, InstrumentError};
use crate::exit::ExitPlan;
use crate::gate::SessionWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid instrument: {0}")]
    Instrument(#[from] InstrumentError),

    #[error(transparent)]
    Bot(#[from] FactoryError),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
}

/// One configured bot, keyed by its identifier in [`StrategyConfig::bots`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Implementation to build; defaults to the bot identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl BotConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            kind: None,
            weight: 1.0,
            params: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfluenceConfig {
    #[serde(default)]
    pub method: ConfluenceMethod,
    /// 0–100; aggregated signals below it are discarded.
    #[serde(default)]
    pub min_score: f64,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            method: ConfluenceMethod::Count,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChopConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_chop_period")]
    pub period: usize,
    /// Efficiency ratio below which the market counts as choppy.
    #[serde(default = "default_chop_threshold")]
    pub threshold: f64,
}

impl Default for ChopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: default_chop_period(),
            threshold: default_chop_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateConfig {
    #[serde(default)]
    pub sessions: Vec<SessionWindow>,
    #[serde(default)]
    pub auto_regime: bool,
    #[serde(default = "default_adx_threshold")]
    pub regime_adx_threshold: f64,
    #[serde(default)]
    pub chop: ChopConfig,
    /// Close any open position on the first bar outside every enabled window.
    #[serde(default)]
    pub flatten_outside_session: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            auto_regime: false,
            regime_adx_threshold: default_adx_threshold(),
            chop: ChopConfig::default(),
            flatten_outside_session: false,
        }
    }
}

/// Exit plans by regime. Overrides fall back to `default`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExitPlans {
    pub default: ExitPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trending: Option<ExitPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranging: Option<ExitPlan>,
}

impl ExitPlans {
    pub fn for_regime(&self, regime: Regime) -> &ExitPlan {
        let chosen = match regime {
            Regime::Trending => self.trending.as_ref(),
            Regime::Ranging => self.ranging.as_ref(),
            Regime::Undetected => None,
        };
        chosen.unwrap_or(&self.default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExecutionConfig {
    /// Round-turn commission per contract.
    #[serde(default)]
    pub commission_per_contract: f64,
    /// Ticks lost on every market fill.
    #[serde(default)]
    pub slippage_ticks: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bars_in_trade: Option<u32>,
}

/// Periods of the indicators the engine itself reads (exit ATR, regime ADX,
/// recorded momentum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSettings {
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    #[serde(default = "default_adx_period")]
    pub adx_period: usize,
    #[serde(default = "default_momentum_period")]
    pub momentum_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            atr_period: default_atr_period(),
            adx_period: default_adx_period(),
            momentum_period: default_momentum_period(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default = "default_account")]
    pub account: String,
    pub instrument: Instrument,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub bots: BTreeMap<String, BotConfig>,
    #[serde(default)]
    pub confluence: ConfluenceConfig,
    #[serde(default)]
    pub gate: GateConfig,
    pub exits: ExitPlans,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub indicators: IndicatorSettings,
}

fn default_true() -> bool {
    true
}
fn default_weight() -> f64 {
    1.0
}
fn default_chop_period() -> usize {
    10
}
fn default_chop_threshold() -> f64 {
    0.3
}
fn default_adx_threshold() -> f64 {
    25.0
}
fn default_atr_period() -> usize {
    14
}
fn default_adx_period() -> usize {
    14
}
fn default_momentum_period() -> usize {
    10
}
fn default_account() -> String {
    "Sim101".to_string()
}
fn default_quantity() -> f64 {
    1.0
}

impl StrategyConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Enabled bots in identifier order.
    pub fn enabled_bots(&self) -> impl Iterator<Item = (&String, &BotConfig)> {
        self.bots.iter().filter(|(_, bot)| bot.enabled)
    }

    /// Structural checks. Exit plans are checked per entry instead, where an
    /// inconsistent plan becomes a gate rejection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy name is empty".into()));
        }
        self.instrument.validate()?;
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }

        for (id, bot) in &self.bots {
            if !bot.weight.is_finite() || bot.weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "bot `{id}` weight must be non-negative, got {}",
                    bot.weight
                )));
            }
            create_bot(id, bot.kind.as_deref(), &bot.params)?;
        }

        let min_score = self.confluence.min_score;
        if !(0.0..=100.0).contains(&min_score) {
            return Err(ConfigError::Invalid(format!(
                "min_score must be within 0..=100, got {min_score}"
            )));
        }

        for window in &self.gate.sessions {
            if window.name.trim().is_empty() {
                return Err(ConfigError::Invalid("session window without a name".into()));
            }
            if window.start == window.end {
                return Err(ConfigError::Invalid(format!(
                    "session `{}` has identical start and end",
                    window.name
                )));
            }
        }
        let chop = &self.gate.chop;
        if chop.enabled && (chop.period == 0 || !(0.0..=1.0).contains(&chop.threshold)) {
            return Err(ConfigError::Invalid(
                "chop needs period >= 1 and threshold within 0..=1".into(),
            ));
        }
        if !self.gate.regime_adx_threshold.is_finite() || self.gate.regime_adx_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "regime_adx_threshold must be non-negative".into(),
            ));
        }

        let exec = &self.execution;
        if !exec.commission_per_contract.is_finite() || exec.commission_per_contract < 0.0 {
            return Err(ConfigError::Invalid(
                "commission_per_contract must be non-negative".into(),
            ));
        }
        if !exec.slippage_ticks.is_finite() || exec.slippage_ticks < 0.0 {
            return Err(ConfigError::Invalid("slippage_ticks must be non-negative".into()));
        }
        if exec.max_bars_in_trade == Some(0) {
            return Err(ConfigError::Invalid("max_bars_in_trade must be >= 1".into()));
        }

        let ind = &self.indicators;
        if ind.atr_period == 0 || ind.adx_period == 0 || ind.momentum_period == 0 {
            return Err(ConfigError::Invalid("indicator periods must be >= 1".into()));
        }
        Ok(())
    }

    /// BLAKE3 fingerprint of the canonical JSON form. Identical configs hash
    /// identically; any parameter change alters the hash.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
