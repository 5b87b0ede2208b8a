//! RESET / SKIP control events.
//!
//! A control event is an all-day entry whose trimmed, upper-cased title is
//! exactly `RESET` or `SKIP`. Each scan consumes every match on the day.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::{Calendar, CalendarEvent};
use crate::dates::DayBounds;
use crate::error::CalendarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMarker {
    Reset,
    Skip,
}

impl ControlMarker {
    /// Title that triggers this marker.
    pub fn literal(self) -> &'static str {
        match self {
            ControlMarker::Reset => "RESET",
            ControlMarker::Skip => "SKIP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RESET" => Some(ControlMarker::Reset),
            "SKIP" => Some(ControlMarker::Skip),
            _ => None,
        }
    }

    pub fn matches(self, event: &CalendarEvent) -> bool {
        event.all_day && event.title.trim().to_uppercase() == self.literal()
    }
}

impl fmt::Display for ControlMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

/// Result of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlScan {
    pub marker: ControlMarker,
    pub deleted: usize,
}

impl ControlScan {
    pub fn found(&self) -> bool {
        self.deleted > 0
    }
}

/// Find and delete every `marker` event on `day`.
///
/// # Errors
/// Query or deletion failures. Events deleted before a failure stay deleted.
pub fn scan_control_events<C: Calendar + ?Sized>(
    calendar: &mut C,
    day: &DayBounds,
    marker: ControlMarker,
) -> Result<ControlScan, CalendarError> {
    let matches: Vec<CalendarEvent> = calendar
        .query_events(day, Some(marker.literal()))?
        .into_iter()
        .filter(|e| marker.matches(e) && day.contains_day(e.day))
        .collect();

    for event in &matches {
        calendar.delete_event(&event.id)?;
        debug!(%marker, event = %event.id, "control event deleted");
    }

    if !matches.is_empty() {
        info!(%marker, day = %day.first_day, count = matches.len(), "control event consumed");
    }
    Ok(ControlScan {
        marker,
        deleted: matches.len(),
    })
}
