//! Daily reconciliation of habits against the calendar.
//!
//! For each enabled habit the run makes sure exactly one tracking event
//! exists for the day. Existing events are found by their habit tag, or by
//! the legacy title heuristic for entries written before tagging (those get
//! tagged in place). Counter values are staged per habit and written in one
//! batch after every habit has been processed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::calendar::{habit_tag, with_habit_tag, Calendar, CalendarEvent};
use crate::control::{scan_control_events, ControlMarker};
use crate::counter::{ControlSignals, CounterEngine, Resolution};
use crate::dates::DayBounds;
use crate::error::{CalendarError, HabitError};
use crate::habit::Habit;
use crate::messages::{select_message, tracking_title};
use crate::storage::{read_counter, CounterBatch, KeyValueStore, Settings};

/// What happened to one habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HabitStatus {
    Created {
        event_id: String,
        title: String,
        day: u32,
    },
    AlreadyExists {
        event_id: String,
        title: String,
    },
    Failed {
        reason: String,
    },
}

impl HabitStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HabitStatus::Created { .. } => "created",
            HabitStatus::AlreadyExists { .. } => "exists",
            HabitStatus::Failed { .. } => "failed",
        }
    }
}

/// Successful reconciliation of one habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitOutcome {
    pub status: HabitStatus,
    pub signals: ControlSignals,
    /// `None` when the event already existed.
    pub rule: Option<Resolution>,
}

/// Per-habit entry of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitReport {
    pub habit_id: String,
    pub habit_name: String,
    #[serde(flatten)]
    pub status: HabitStatus,
    pub reset_applied: bool,
    pub skip_applied: bool,
    pub rule: Option<Resolution>,
}

/// Summary of one daily run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub date: NaiveDate,
    pub habits: Vec<HabitReport>,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
    pub counters_written: usize,
    pub counter_write_error: Option<String>,
}

impl RunReport {
    pub fn from_habits(date: NaiveDate, habits: Vec<HabitReport>) -> Self {
        let count = |label: &str| habits.iter().filter(|h| h.status.label() == label).count();
        Self {
            date,
            created: count("created"),
            existing: count("exists"),
            failed: count("failed"),
            habits,
            counters_written: 0,
            counter_write_error: None,
        }
    }

    /// No habit failed and the counter batch was written.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.counter_write_error.is_none()
    }
}

/// Untagged entry that looks like a tracking event for `habit`.
fn is_legacy_match(event: &CalendarEvent, habit: &Habit) -> bool {
    event.habit_tag().is_none()
        && event.all_day
        && event.title.contains(&habit.name)
        && event.title.contains("Day ")
        && event.title.contains('–')
}

/// Tagged for `habit`, or an untagged legacy entry for it.
pub fn is_tracking_event_for(event: &CalendarEvent, habit: &Habit) -> bool {
    event.is_tagged_for(&habit.id) || is_legacy_match(event, habit)
}

/// Find the tracking event for `habit` on `day`.
///
/// Tag match first. A legacy match is tagged in place; failing to tag it is
/// logged and does not change the result.
pub fn find_existing<C: Calendar + ?Sized>(
    calendar: &mut C,
    habit: &Habit,
    day: &DayBounds,
) -> Result<Option<CalendarEvent>, CalendarError> {
    // Backends return anything overlapping the window, which for all-day
    // events in another timezone includes the neighbouring days.
    let events: Vec<CalendarEvent> = calendar
        .query_events(day, None)?
        .into_iter()
        .filter(|e| !e.all_day || day.contains_day(e.day))
        .collect();

    if let Some(tagged) = events.iter().find(|e| e.is_tagged_for(&habit.id)) {
        return Ok(Some(tagged.clone()));
    }

    let Some(legacy) = events.into_iter().find(|e| is_legacy_match(e, habit)) else {
        return Ok(None);
    };

    let description = with_habit_tag(&legacy.description, &habit.id);
    match calendar.set_description(&legacy.id, &description) {
        Ok(()) => info!(habit = %habit.id, event = %legacy.id, "legacy event tagged"),
        Err(e) => warn!(habit = %habit.id, event = %legacy.id, error = %e, "failed to tag legacy event"),
    }
    Ok(Some(legacy))
}

/// Reconcile one habit for `day`.
///
/// Stages the new counter value in `batch` unless the habit has a manual
/// override. An existing event short-circuits everything: no scan, no
/// counter read, nothing staged.
///
/// # Errors
/// Calendar or storage failures, or [`HabitError::CounterOverflow`]. Control
/// events consumed before a failure stay consumed.
pub fn reconcile<C, S>(
    calendar: &mut C,
    habit: &Habit,
    day: &DayBounds,
    settings: &Settings,
    store: &S,
    batch: &mut CounterBatch,
) -> Result<HabitOutcome, HabitError>
where
    C: Calendar + ?Sized,
    S: KeyValueStore + ?Sized,
{
    if let Some(existing) = find_existing(calendar, habit, day)? {
        info!(habit = %habit.id, day = %day.first_day, "tracking event already exists");
        return Ok(HabitOutcome {
            status: HabitStatus::AlreadyExists {
                event_id: existing.id,
                title: existing.title,
            },
            signals: ControlSignals::default(),
            rule: None,
        });
    }

    let mut signals = ControlSignals::default();
    if settings.features.reset_by_event {
        signals.reset = scan_control_events(calendar, day, ControlMarker::Reset)?.found();
    }
    if settings.features.skip_by_event {
        signals.skip = scan_control_events(calendar, day, ControlMarker::Skip)?.found();
    }

    let persisted = match habit.manual_counter {
        Some(_) => 0,
        None => read_counter(store, &habit.id)?,
    };

    let engine = CounterEngine::new(settings.max_counter_days);
    let (count, rule) = engine.resolve(habit, persisted, signals, day.first_day)?;
    debug!(habit = %habit.id, persisted, count, ?rule, "counter resolved");

    let message = select_message(count, habit);
    let title = tracking_title(habit, count, &message);
    let event = calendar.create_all_day_event(&title, day, &habit_tag(&habit.id))?;
    info!(habit = %habit.id, day = count, event = %event.id, "tracking event created");

    if habit.manual_counter.is_none() {
        batch.stage(&habit.id, count);
    }

    Ok(HabitOutcome {
        status: HabitStatus::Created {
            event_id: event.id,
            title,
            day: count,
        },
        signals,
        rule: Some(rule),
    })
}

/// Reconcile every enabled habit, then write the counter batch once.
///
/// A failing habit is recorded in the report and never stops the others.
pub fn run_daily<C, S>(
    settings: &Settings,
    calendar: &mut C,
    store: &mut S,
    day: &DayBounds,
) -> RunReport
where
    C: Calendar + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let mut batch = CounterBatch::new();
    let mut reports = Vec::new();

    for habit in &settings.habits {
        if !habit.enabled {
            debug!(habit = %habit.id, "habit disabled, skipping");
            continue;
        }

        let report = match reconcile(calendar, habit, day, settings, &*store, &mut batch) {
            Ok(outcome) => HabitReport {
                habit_id: habit.id.clone(),
                habit_name: habit.name.clone(),
                status: outcome.status,
                reset_applied: outcome.signals.reset,
                skip_applied: outcome.signals.skip,
                rule: outcome.rule,
            },
            Err(e) => {
                error!(habit = %habit.id, error = %e, "habit failed");
                HabitReport {
                    habit_id: habit.id.clone(),
                    habit_name: habit.name.clone(),
                    status: HabitStatus::Failed {
                        reason: e.to_string(),
                    },
                    reset_applied: false,
                    skip_applied: false,
                    rule: None,
                }
            }
        };
        reports.push(report);
    }

    let mut run = RunReport::from_habits(day.first_day, reports);
    match batch.commit(store) {
        Ok(written) => run.counters_written = written,
        Err(e) => {
            error!(error = %e, "counter batch write failed");
            run.counter_write_error = Some(e.to_string());
        }
    }

    info!(
        day = %day.first_day,
        created = run.created,
        existing = run.existing,
        failed = run.failed,
        "daily run finished"
    );
    run
}
