//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - The calendar and backend to reconcile against
//! - Tracked habits with their themes and overrides
//! - Control-event feature flags and the counter ceiling
//! - Schedule, digest, mail and logging settings
//!
//! Configuration is stored at `config.toml` in the data directory.
//! [`Config::validate`] turns it into immutable [`Settings`].

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::habit::{Habit, Theme};

/// Where calendars live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalendarBackend {
    #[default]
    Local,
    Google,
}

/// How the digest is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailBackend {
    #[default]
    Outbox,
    Gmail,
}

/// Control-event toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub reset_by_event: bool,
    #[serde(default = "default_true")]
    pub skip_by_event: bool,
}

/// Scheduled job times (local).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_daily_hour")]
    pub daily_hour: u32,
    #[serde(default = "default_weekly_day")]
    pub weekly_day: String,
    #[serde(default = "default_weekly_hour")]
    pub weekly_hour: u32,
}

/// Weekly digest configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to the authenticated account when using Gmail.
    #[serde(default)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MailConfig {
    #[serde(default)]
    pub backend: MailBackend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// One `[[habits]]` entry as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitConfig {
    pub id: String,
    pub name: String,
    /// `YYYY-MM-DD`.
    pub start_date: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub custom_messages: Vec<String>,
    #[serde(default)]
    pub manual_counter: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `config.toml` in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_calendar_name")]
    pub calendar_name: String,
    #[serde(default)]
    pub backend: CalendarBackend,
    #[serde(default = "default_max_counter_days")]
    pub max_counter_days: u32,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_habits")]
    pub habits: Vec<HabitConfig>,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_calendar_name() -> String {
    "Habits".into()
}
fn default_max_counter_days() -> u32 {
    10_000
}
fn default_daily_hour() -> u32 {
    1
}
fn default_weekly_day() -> String {
    "mon".into()
}
fn default_weekly_hour() -> u32 {
    8
}
fn default_log_level() -> String {
    "info".into()
}
fn default_theme() -> String {
    "general".into()
}
fn default_habits() -> Vec<HabitConfig> {
    vec![HabitConfig {
        id: "general".into(),
        name: "General Habit".into(),
        start_date: "2025-01-01".into(),
        theme: default_theme(),
        custom_messages: Vec::new(),
        manual_counter: None,
        enabled: true,
    }]
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            reset_by_event: true,
            skip_by_event: true,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_hour: default_daily_hour(),
            weekly_day: default_weekly_day(),
            weekly_hour: default_weekly_hour(),
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calendar_name: default_calendar_name(),
            backend: CalendarBackend::default(),
            max_counter_days: default_max_counter_days(),
            features: FeatureFlags::default(),
            schedule: ScheduleConfig::default(),
            digest: DigestConfig::default(),
            mail: MailConfig::default(),
            logging: LoggingConfig::default(),
            habits: default_habits(),
        }
    }
}

/// Validated schedule times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub daily_hour: u32,
    pub weekly_day: Weekday,
    pub weekly_hour: u32,
}

/// Validated, immutable configuration passed into every core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub calendar_name: String,
    pub backend: CalendarBackend,
    pub max_counter_days: u32,
    pub features: FeatureFlags,
    /// All habits in configuration order, disabled ones included.
    pub habits: Vec<Habit>,
    pub schedule: ScheduleSettings,
    pub digest: DigestConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    pub fn habit(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    pub fn enabled_habits(&self) -> impl Iterator<Item = &Habit> {
        self.habits.iter().filter(|h| h.enabled)
    }
}

/// Parse a weekday name (`mon`, `Monday`, ...).
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    s.trim().parse::<Weekday>().ok()
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
            current = match current {
                serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::invalid(key, "unknown config key");
        let parts: Vec<&str> = key.split('.').collect();
        let Some((leaf, parents)) = parts.split_last() else {
            return Err(ConfigError::MissingKey(key.into()));
        };
        if leaf.is_empty() {
            return Err(ConfigError::MissingKey(key.into()));
        }

        let mut current = root;
        for part in parents {
            current = match current {
                serde_json::Value::Array(items) => {
                    let idx = part.parse::<usize>().map_err(|_| unknown())?;
                    items.get_mut(idx).ok_or_else(unknown)?
                }
                other => other.get_mut(*part).ok_or_else(unknown)?,
            };
        }

        let slot = match current {
            serde_json::Value::Array(items) => {
                let idx = leaf.parse::<usize>().map_err(|_| unknown())?;
                items.get_mut(idx).ok_or_else(unknown)?
            }
            serde_json::Value::Object(obj) => obj.get_mut(*leaf).ok_or_else(unknown)?,
            _ => return Err(unknown()),
        };

        *slot = Self::coerce(slot, key, value)?;
        Ok(())
    }

    /// Parse `value` into the JSON type already at `existing`.
    fn coerce(
        existing: &serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<serde_json::Value, ConfigError> {
        let parsed = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
            ),
            serde_json::Value::Number(_) if matches!(value, "none" | "null") => serde_json::Value::Null,
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{value}' as number")))?
                    .into(),
            ),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => serde_json::from_str(value)
                .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
            // `null` holds optional values; numbers stay numbers.
            serde_json::Value::Null => match value {
                "" | "none" | "null" => serde_json::Value::Null,
                v => v
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .unwrap_or_else(|_| serde_json::Value::String(v.into())),
            },
            serde_json::Value::String(_) => serde_json::Value::String(value.into()),
        };
        Ok(parsed)
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
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

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Check every invariant and build [`Settings`].
    ///
    /// # Errors
    /// The first invalid value found, keyed by its dot path.
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        if self.calendar_name.trim().is_empty() {
            return Err(ConfigError::invalid("calendar_name", "must not be empty"));
        }
        if self.max_counter_days == 0 {
            return Err(ConfigError::invalid("max_counter_days", "must be at least 1"));
        }
        if self.habits.is_empty() {
            return Err(ConfigError::MissingKey("habits".into()));
        }

        let schedule = self.validate_schedule()?;

        let mut seen = HashSet::new();
        let mut habits = Vec::with_capacity(self.habits.len());
        for (i, hc) in self.habits.iter().enumerate() {
            let key = |field: &str| format!("habits.{i}.{field}");

            let id = hc.id.trim();
            if id.is_empty() {
                return Err(ConfigError::invalid(key("id"), "must not be empty"));
            }
            if !seen.insert(id.to_string()) {
                return Err(ConfigError::invalid(key("id"), format!("duplicate habit id '{id}'")));
            }
            if hc.name.trim().is_empty() {
                return Err(ConfigError::invalid(key("name"), "must not be empty"));
            }
            let start = NaiveDate::parse_from_str(hc.start_date.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::invalid(
                    key("start_date"),
                    format!("'{}' is not a YYYY-MM-DD date", hc.start_date),
                )
            })?;
            let theme = Theme::from_config(&hc.theme, &hc.custom_messages).ok_or_else(|| {
                if hc.theme.trim().eq_ignore_ascii_case("custom") {
                    ConfigError::invalid(key("custom_messages"), "custom theme needs at least one message")
                } else {
                    ConfigError::invalid(
                        key("theme"),
                        format!("unknown theme '{}', expected one of {}", hc.theme, Theme::NAMES.join(", ")),
                    )
                }
            })?;

            let mut habit = Habit::new(id, hc.name.trim(), start).with_theme(theme);
            if let Some(manual) = hc.manual_counter {
                habit = habit.with_manual_counter(manual);
            }
            if !hc.enabled {
                habit = habit.disabled();
            }
            habits.push(habit);
        }

        Ok(Settings {
            calendar_name: self.calendar_name.trim().to_string(),
            backend: self.backend,
            max_counter_days: self.max_counter_days,
            features: self.features,
            habits,
            schedule,
            digest: self.digest.clone(),
            mail: self.mail.clone(),
            logging: self.logging.clone(),
        })
    }

    fn validate_schedule(&self) -> Result<ScheduleSettings, ConfigError> {
        if self.schedule.daily_hour > 23 {
            return Err(ConfigError::invalid("schedule.daily_hour", "must be 0-23"));
        }
        if self.schedule.weekly_hour > 23 {
            return Err(ConfigError::invalid("schedule.weekly_hour", "must be 0-23"));
        }
        let weekly_day = parse_weekday(&self.schedule.weekly_day).ok_or_else(|| {
            ConfigError::invalid(
                "schedule.weekly_day",
                format!("unknown weekday '{}'", self.schedule.weekly_day),
            )
        })?;
        Ok(ScheduleSettings {
            daily_hour: self.schedule.daily_hour,
            weekly_day,
            weekly_hour: self.schedule.weekly_hour,
        })
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
