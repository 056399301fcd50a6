//! Named trading-session windows.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A time-of-day window. A window whose end precedes its start wraps past
/// midnight. Start is inclusive, end exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(with = "time_of_day")]
    pub start: NaiveTime,
    #[serde(with = "time_of_day")]
    pub end: NaiveTime,
}

fn default_enabled() -> bool {
    true
}

impl SessionWindow {
    pub fn new(name: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            start,
            end,
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.wraps_midnight() {
            time >= self.start || time < self.end
        } else {
            time >= self.start && time < self.end
        }
    }
}

/// Ordered list of session windows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSchedule {
    windows: Vec<SessionWindow>,
}

impl SessionSchedule {
    pub fn new(windows: Vec<SessionWindow>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[SessionWindow] {
        &self.windows
    }

    pub fn any_enabled(&self) -> bool {
        self.windows.iter().any(|w| w.enabled)
    }

    /// First enabled window containing `time`, in configuration order.
    pub fn active_at(&self, time: NaiveTime) -> Option<&SessionWindow> {
        self.windows
            .iter()
            .find(|w| w.enabled && w.contains(time))
    }
}

/// Serde helpers accepting both `HH:MM` and `HH:MM:SS`.
pub(crate) mod time_of_day {
    use super::*;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time `{raw}`: {e}")))
    }
}
