//! Run configuration: where bars come from, where trades go, and which
//! strategies to run.
//!
//! ```toml
//! [data]
//! bars = "data/es_1m.csv"     # or: synthetic_bars = 5000
//! seed = 7
//!
//! [output]
//! csv = "out/trades.csv"
//! jsonl = "out/trades.jsonl"
//!
//! [[strategy]]
//! preset = "trend_rider"
//!
//! [[strategy]]
//! path = "strategies/custom.toml"
//! name = "custom_b"
//! account = "Sim102"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use confluence_core::config::{ConfigError, StrategyConfig};
use confluence_core::presets::PresetRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV bar file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bars: Option<PathBuf>,
    /// Number of generated bars when no file is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic_bars: Option<usize>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Symbol stamped on generated bars.
    #[serde(default = "default_symbol")]
    pub symbol: String,
}

fn default_seed() -> u64 {
    42
}

fn default_symbol() -> String {
    "ES".into()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonl: Option<PathBuf>,
}

/// One strategy instance: a built-in preset or a strategy TOML file, with
/// optional name/account overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl StrategyEntry {
    /// Resolve to a validated `StrategyConfig`. Relative paths resolve
    /// against `base_dir`.
    pub fn resolve(
        &self,
        presets: &PresetRegistry,
        base_dir: &Path,
    ) -> Result<StrategyConfig, ConfigError> {
        let mut config = match (&self.preset, &self.path) {
            (Some(preset), None) => presets.get(preset)?,
            (None, Some(path)) => StrategyConfig::load(&base_dir.join(path))?,
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "strategy entry sets both `preset` and `path`".into(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "strategy entry needs `preset` or `path`".into(),
                ))
            }
        };
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(account) = &self.account {
            config.account = account.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyEntry>,
}

impl RunConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Shape checks that need no file access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.data.bars, self.data.synthetic_bars) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid(
                    "data sets both `bars` and `synthetic_bars`".into(),
                ))
            }
            (None, None) => {
                return Err(ConfigError::Invalid(
                    "data needs `bars` or `synthetic_bars`".into(),
                ))
            }
            (None, Some(0)) => {
                return Err(ConfigError::Invalid("synthetic_bars must be > 0".into()))
            }
            _ => {}
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("no [[strategy]] entries".into()));
        }
        Ok(())
    }

    /// Resolve every entry. Strategy names must be unique so trade numbers
    /// stay unambiguous in shared sinks.
    pub fn resolve_strategies(
        &self,
        presets: &PresetRegistry,
        base_dir: &Path,
    ) -> Result<Vec<StrategyConfig>, ConfigError> {
        let configs = self
            .strategies
            .iter()
            .map(|entry| entry.resolve(presets, base_dir))
            .collect::<Result<Vec<_>, _>>()?;
        let mut names: Vec<&str> = configs.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::Invalid(format!(
                "duplicate strategy name `{}`",
                pair[0]
            )));
        }
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[data]
synthetic_bars = 500
seed = 9

[output]
csv = "out/trades.csv"

[[strategy]]
preset = "trend_rider"

[[strategy]]
preset = "trend_rider"
name = "trend_rider_b"
account = "Sim102"
"#;

    #[test]
    fn parses_sample() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.data.synthetic_bars, Some(500));
        assert_eq!(config.data.seed, 9);
        assert_eq!(config.data.symbol, "ES");
        assert_eq!(config.output.csv, Some(PathBuf::from("out/trades.csv")));
        assert_eq!(config.output.jsonl, None);
        assert_eq!(config.strategies.len(), 2);
    }

    #[test]
    fn overrides_apply() {
        let config = RunConfig::from_toml(SAMPLE).unwrap();
        let strategies = config
            .resolve_strategies(&PresetRegistry::builtin(), Path::new("."))
            .unwrap();
        assert_eq!(strategies[0].name, "trend_rider");
        assert_eq!(strategies[0].account, "Sim101");
        assert_eq!(strategies[1].name, "trend_rider_b");
        assert_eq!(strategies[1].account, "Sim102");
    }

    #[test]
    fn duplicate_names_rejected() {
        let text = SAMPLE.replace("name = \"trend_rider_b\"\n", "");
        let config = RunConfig::from_toml(&text).unwrap();
        let err = config
            .resolve_strategies(&PresetRegistry::builtin(), Path::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate strategy name"));
    }

    #[test]
    fn data_source_must_be_exactly_one() {
        let both = "[data]\nbars = \"a.csv\"\nsynthetic_bars = 10\n[[strategy]]\npreset = \"x\"\n";
        assert!(RunConfig::from_toml(both).is_err());
        let neither = "[data]\nseed = 1\n[[strategy]]\npreset = \"x\"\n";
        assert!(RunConfig::from_toml(neither).is_err());
    }

    #[test]
    fn entry_needs_exactly_one_source() {
        let registry = PresetRegistry::builtin();
        assert!(StrategyEntry::default().resolve(&registry, Path::new(".")).is_err());
        let both = StrategyEntry {
            preset: Some("trend_rider".into()),
            path: Some("x.toml".into()),
            ..Default::default()
        };
        assert!(both.resolve(&registry, Path::new(".")).is_err());
        let unknown = StrategyEntry {
            preset: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            unknown.resolve(&registry, Path::new(".")),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn strategy_file_resolves_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let preset = PresetRegistry::builtin().get("range_fader").unwrap();
        std::fs::write(dir.path().join("mine.toml"), toml::to_string(&preset).unwrap()).unwrap();
        let entry = StrategyEntry {
            path: Some("mine.toml".into()),
            name: Some("mine".into()),
            ..Default::default()
        };
        let config = entry.resolve(&PresetRegistry::builtin(), dir.path()).unwrap();
        assert_eq!(config.name, "mine");
        assert_eq!(config.exits, preset.exits);
    }
}
