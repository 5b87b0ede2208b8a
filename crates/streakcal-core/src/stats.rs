//! Per-habit tracking statistics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::Habit;
use crate::storage::Settings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub day: u32,
    pub message: String,
}

/// Snapshot of one habit's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStats {
    pub habit_id: String,
    pub habit_name: String,
    /// Manual override when set, else the persisted counter.
    pub current_count: u32,
    pub persisted_count: u32,
    pub start_date: NaiveDate,
    pub days_since_start: i64,
    pub theme: String,
    pub manual_counter: Option<u32>,
    pub enabled: bool,
    pub calendar_name: String,
    pub reset_by_event: bool,
    pub skip_by_event: bool,
    pub next_milestone: Option<Milestone>,
}

impl TrackingStats {
    pub fn for_habit(habit: &Habit, persisted: u32, today: NaiveDate, settings: &Settings) -> Self {
        let current = habit.manual_counter.unwrap_or(persisted);
        let next_milestone = habit
            .theme
            .milestones()
            .next_after(current)
            .map(|(day, message)| Milestone {
                day,
                message: message.to_string(),
            });

        Self {
            habit_id: habit.id.clone(),
            habit_name: habit.name.clone(),
            current_count: current,
            persisted_count: persisted,
            start_date: habit.start_date,
            days_since_start: habit.days_since_start(today),
            theme: habit.theme.name().to_string(),
            manual_counter: habit.manual_counter,
            enabled: habit.enabled,
            calendar_name: settings.calendar_name.clone(),
            reset_by_event: settings.features.reset_by_event,
            skip_by_event: settings.features.skip_by_event,
            next_milestone,
        }
    }
}
