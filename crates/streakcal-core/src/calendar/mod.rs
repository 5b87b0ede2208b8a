//! Calendar collaborator contract and backends.
//!
//! The core only talks to calendars through [`Calendar`]. Two backends are
//! shipped: a SQLite calendar store for local use and a Google Calendar
//! adapter.

pub mod google;
pub mod local;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::DayBounds;
use crate::error::CalendarError;

pub use google::{GoogleCalendar, GoogleCalendars};
pub use local::{LocalCalendar, LocalCalendars};

/// Prefix of the description line tagging a tracking event with its habit.
pub const HABIT_TAG_PREFIX: &str = "streakcal-habit:";

/// An event as returned by a calendar backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub all_day: bool,
    /// Local date the event starts on.
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    /// Habit id from the tag line in the description, if any.
    pub fn habit_tag(&self) -> Option<&str> {
        self.description
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(HABIT_TAG_PREFIX))
            .map(str::trim)
    }

    pub fn is_tagged_for(&self, habit_id: &str) -> bool {
        self.habit_tag() == Some(habit_id)
    }
}

/// Tag line for `habit_id`.
pub fn habit_tag(habit_id: &str) -> String {
    format!("{HABIT_TAG_PREFIX}{habit_id}")
}

/// Description with the tag line for `habit_id` appended.
pub fn with_habit_tag(description: &str, habit_id: &str) -> String {
    let tag = habit_tag(habit_id);
    if description.trim().is_empty() {
        tag
    } else {
        format!("{}\n{}", description.trim_end(), tag)
    }
}

/// One calendar, as seen by the reconciler.
pub trait Calendar {
    /// Display name.
    fn name(&self) -> &str;

    /// Events overlapping `range`. `search` is a hint backends may use to
    /// narrow the query; callers still filter the result themselves.
    fn query_events(
        &self,
        range: &DayBounds,
        search: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Create an all-day event covering `range`.
    fn create_all_day_event(
        &mut self,
        title: &str,
        range: &DayBounds,
        description: &str,
    ) -> Result<CalendarEvent, CalendarError>;

    fn delete_event(&mut self, event_id: &str) -> Result<(), CalendarError>;

    fn set_description(&mut self, event_id: &str, description: &str) -> Result<(), CalendarError>;
}

/// A calendar known to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
}

/// Resolve a calendar by exact name.
///
/// # Errors
/// Returns [`CalendarError::NotFound`] listing every available name.
pub fn find_calendar<'a>(
    available: &'a [CalendarInfo],
    name: &str,
) -> Result<&'a CalendarInfo, CalendarError> {
    available
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| CalendarError::NotFound {
            name: name.to_string(),
            available: available.iter().map(|c| c.name.clone()).collect(),
        })
}
