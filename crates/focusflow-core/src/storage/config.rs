//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Focus-cycle phase lengths and auto-advance behaviour
//! - The minimum session length worth recording
//! - Display refresh interval
//! - The account whose ledger is loaded
//!
//! Configuration is stored at `~/.config/focusflow/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::recorder::DEFAULT_MIN_SESSION_MS;
use crate::timer::CycleConfig;

/// Focus-cycle configuration. Durations are in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSettings {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break: u32,
    #[serde(default = "default_long_break")]
    pub long_break: u32,
    #[serde(default = "default_pomodoros_before_long_break")]
    pub pomodoros_before_long_break: u32,
    #[serde(default = "default_near_end_secs")]
    pub near_end_secs: u64,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    #[serde(default = "default_auto_advance_delay_ms")]
    pub auto_advance_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_min_session_ms")]
    pub min_session_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSettings {
    #[serde(default = "default_user")]
    pub user: String,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cycle: CycleSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub account: AccountSettings,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_focus_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_pomodoros_before_long_break() -> u32 {
    4
}
fn default_near_end_secs() -> u64 {
    5
}
fn default_auto_advance_delay_ms() -> u64 {
    1_500
}
fn default_min_session_ms() -> u64 {
    DEFAULT_MIN_SESSION_MS
}
fn default_sample_interval_ms() -> u64 {
    250
}
fn default_user() -> String {
    "local".into()
}
fn default_true() -> bool {
    true
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            pomodoros_before_long_break: default_pomodoros_before_long_break(),
            near_end_secs: default_near_end_secs(),
            auto_advance: true,
            auto_advance_delay_ms: default_auto_advance_delay_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            min_session_ms: default_min_session_ms(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            user: default_user(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => value
                    .parse::<bool>()
                    .map(serde_json::Value::Bool)
                    .map_err(|e| invalid(e.to_string()))?,
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("cannot set a whole section".into()));
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Change a value in memory by dot-separated key.
    ///
    /// The new value is parsed according to the type already stored there.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set a value by key and save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Restore every setting to its default and save.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        *self = Self::default();
        self.save()
    }

    /// Phase lengths for the focus cycle.
    pub fn cycle_config(&self) -> CycleConfig {
        let mins = |m: u32| u64::from(m).saturating_mul(60);
        CycleConfig {
            work_secs: mins(self.cycle.focus_duration),
            short_break_secs: mins(self.cycle.short_break),
            long_break_secs: mins(self.cycle.long_break),
            long_break_every: self.cycle.pomodoros_before_long_break.max(1),
            near_end_secs: self.cycle.near_end_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.cycle.focus_duration, 25);
        assert_eq!(parsed.session.min_session_ms, 1_000);
        assert_eq!(parsed.account.user, "local");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[cycle]\nfocus_duration = 50\n").unwrap();
        assert_eq!(parsed.cycle.focus_duration, 50);
        assert_eq!(parsed.cycle.short_break, 5);
        assert!(parsed.cycle.auto_advance);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("cycle.auto_advance").as_deref(), Some("true"));
        assert_eq!(cfg.get("cycle.focus_duration").as_deref(), Some("25"));
        assert_eq!(cfg.get("account.user").as_deref(), Some("local"));
        assert!(cfg.get("cycle.missing_key").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("cycle.auto_advance", "false").unwrap();
        cfg.apply("session.min_session_ms", "5000").unwrap();
        cfg.apply("account.user", "ada").unwrap();
        assert!(!cfg.cycle.auto_advance);
        assert_eq!(cfg.session.min_session_ms, 5_000);
        assert_eq!(cfg.account.user, "ada");
    }

    #[test]
    fn apply_rejects_unknown_keys_and_bad_types() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("cycle.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.apply("cycle.auto_advance", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.apply("cycle", "1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.apply("", "1").is_err());
    }

    #[test]
    fn cycle_config_converts_minutes() {
        let cfg = Config::default();
        let cycle = cfg.cycle_config();
        assert_eq!(cycle.work_secs, 1_500);
        assert_eq!(cycle.short_break_secs, 300);
        assert_eq!(cycle.long_break_secs, 900);
        assert_eq!(cycle.long_break_every, 4);
    }

    #[test]
    fn load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.cycle.long_break, 15);
        assert!(path.exists());

        let mut cfg = cfg;
        cfg.apply("cycle.long_break", "20").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().cycle.long_break, 20);
    }
}
