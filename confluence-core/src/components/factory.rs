//! Bot factory: turns a configured bot kind plus its numeric params into a
//! `SignalSource` trait object.

use std::collections::BTreeMap;

use super::signal::{Breakout, EmaCross, MomentumBot, SignalSource};

/// Bot kinds the factory knows how to build.
pub const BOT_KINDS: &[&str] = &["ema_cross", "momentum", "breakout"];

/// Errors that can occur during bot construction.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FactoryError {
    #[error("Unknown bot kind: {0}")]
    UnknownBot(String),
    #[error("Invalid parameter `{param}` for bot `{bot}`: {reason}")]
    InvalidParam {
        bot: String,
        param: String,
        reason: String,
    },
}

fn param(params: &BTreeMap<String, f64>, name: &str, default: f64) -> f64 {
    params.get(name).copied().unwrap_or(default)
}

fn param_usize(params: &BTreeMap<String, f64>, name: &str, default: usize) -> usize {
    params
        .get(name)
        .copied()
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn invalid(bot: &str, param: &str, reason: &str) -> FactoryError {
    FactoryError::InvalidParam {
        bot: bot.to_string(),
        param: param.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a bot. `id` becomes the bot's source name; `kind` selects the
/// implementation (the id doubles as the kind when `kind` is `None`).
pub fn create_bot(
    id: &str,
    kind: Option<&str>,
    params: &BTreeMap<String, f64>,
) -> Result<Box<dyn SignalSource>, FactoryError> {
    if let Some((name, value)) = params.iter().find(|(_, v)| !v.is_finite()) {
        return Err(invalid(id, name, &format!("must be finite, got {value}")));
    }

    match kind.unwrap_or(id) {
        "ema_cross" => {
            let fast = param_usize(params, "fast_period", 9);
            let slow = param_usize(params, "slow_period", 21);
            let full = param(params, "full_strength_pct", 0.5);
            if fast < 1 {
                return Err(invalid(id, "fast_period", "must be >= 1"));
            }
            if slow <= fast {
                return Err(invalid(id, "slow_period", "must be > fast_period"));
            }
            if full <= 0.0 {
                return Err(invalid(id, "full_strength_pct", "must be > 0"));
            }
            Ok(Box::new(EmaCross::new(id, fast, slow, full)))
        }
        "momentum" => {
            let period = param_usize(params, "period", 10);
            let threshold = param(params, "threshold_pct", 0.1);
            let full = param(params, "full_strength_pct", 1.0);
            if period < 1 {
                return Err(invalid(id, "period", "must be >= 1"));
            }
            if threshold < 0.0 {
                return Err(invalid(id, "threshold_pct", "must be >= 0"));
            }
            if full <= 0.0 {
                return Err(invalid(id, "full_strength_pct", "must be > 0"));
            }
            Ok(Box::new(MomentumBot::new(id, period, threshold, full)))
        }
        "breakout" => {
            let lookback = param_usize(params, "lookback", 20);
            let min_strength = param(params, "min_strength", 0.5);
            if lookback < 2 {
                return Err(invalid(id, "lookback", "must be >= 2"));
            }
            if !(0.0..=1.0).contains(&min_strength) {
                return Err(invalid(id, "min_strength", "must be in [0, 1]"));
            }
            Ok(Box::new(Breakout::new(id, lookback, min_strength)))
        }
        other => Err(FactoryError::UnknownBot(other.to_string())),
    }
}
