//! Validated habit definitions.
//!
//! A [`Habit`] only exists after configuration validation, so every value
//! here already satisfies the invariants: non-empty id and name, a real
//! calendar start date, and a non-empty message pool for custom themes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::messages::{self, MilestoneTable, ThemePool};

/// Message theme for a habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "messages")]
pub enum Theme {
    General,
    Growth,
    Sobriety,
    Minimal,
    /// User-supplied pool, guaranteed non-empty.
    Custom(Vec<String>),
}

impl Theme {
    /// Theme names accepted in configuration.
    pub const NAMES: [&'static str; 5] = ["general", "growth", "sobriety", "minimal", "custom"];

    /// Build a theme from its configuration name.
    ///
    /// Returns `None` for unknown names, or for `custom` with an empty pool.
    pub fn from_config(name: &str, custom_messages: &[String]) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Theme::General),
            "growth" => Some(Theme::Growth),
            "sobriety" => Some(Theme::Sobriety),
            "minimal" => Some(Theme::Minimal),
            "custom" if !custom_messages.is_empty() => Some(Theme::Custom(custom_messages.to_vec())),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Theme::General => "general",
            Theme::Growth => "growth",
            Theme::Sobriety => "sobriety",
            Theme::Minimal => "minimal",
            Theme::Custom(_) => "custom",
        }
    }

    /// Cyclic message pool for this theme.
    pub fn pool(&self) -> ThemePool<'_> {
        match self {
            Theme::General => ThemePool::Builtin(messages::GENERAL),
            Theme::Growth => ThemePool::Builtin(messages::GROWTH),
            Theme::Sobriety => ThemePool::Builtin(messages::SOBRIETY),
            Theme::Minimal => ThemePool::Builtin(messages::MINIMAL),
            Theme::Custom(list) => ThemePool::Custom(list),
        }
    }

    /// Milestone table consulted before the pool.
    pub fn milestones(&self) -> MilestoneTable {
        match self {
            Theme::Sobriety => MilestoneTable::Sobriety,
            _ => MilestoneTable::Default,
        }
    }
}

/// One tracked behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub theme: Theme,
    /// Forces the day count on every run when set.
    pub manual_counter: Option<u32>,
    pub enabled: bool,
}

impl Habit {
    /// A minimal enabled habit with the general theme.
    pub fn new(id: impl Into<String>, name: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_date,
            theme: Theme::General,
            manual_counter: None,
            enabled: true,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_manual_counter(mut self, value: u32) -> Self {
        self.manual_counter = Some(value);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whole days from `start_date` to `today`; negative when the habit starts later.
    pub fn days_since_start(&self, today: NaiveDate) -> i64 {
        (today - self.start_date).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn theme_from_config_is_case_insensitive() {
        assert_eq!(Theme::from_config("Growth", &[]), Some(Theme::Growth));
        assert_eq!(Theme::from_config(" minimal ", &[]), Some(Theme::Minimal));
    }

    #[test]
    fn custom_theme_requires_messages() {
        assert_eq!(Theme::from_config("custom", &[]), None);
        let msgs = vec!["go".to_string()];
        assert_eq!(
            Theme::from_config("custom", &msgs),
            Some(Theme::Custom(msgs.clone()))
        );
    }

    #[test]
    fn unknown_theme_is_rejected() {
        assert_eq!(Theme::from_config("zen", &[]), None);
    }

    #[test]
    fn only_sobriety_uses_sobriety_milestones() {
        assert_eq!(Theme::Sobriety.milestones(), MilestoneTable::Sobriety);
        assert_eq!(Theme::Growth.milestones(), MilestoneTable::Default);
        assert_eq!(
            Theme::Custom(vec!["x".into()]).milestones(),
            MilestoneTable::Default
        );
    }

    #[test]
    fn days_since_start_can_be_negative() {
        let habit = Habit::new("h", "H", date("2026-10-20"));
        assert_eq!(habit.days_since_start(date("2026-10-19")), -1);
        assert_eq!(habit.days_since_start(date("2026-10-30")), 10);
    }
}
