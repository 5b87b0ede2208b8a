//! # Streakcal Core Library
//!
//! This library provides the core logic for streakcal, a habit streak
//! tracker that lives on a calendar. Each day it writes one all-day
//! "Day N" event per habit, driven by a persisted counter and by RESET/SKIP
//! control events the user drops on the calendar. The CLI binary is a thin
//! layer over this crate.
//!
//! ## Architecture
//!
//! - **Counter engine**: pure precedence rules (manual, reset, skip, cold
//!   start, increment) with a safety ceiling
//! - **Reconciler**: idempotent per-habit daily run with batched counter writes
//! - **Storage**: SQLite key-value store, run log and job registry, plus
//!   TOML configuration validated into [`Settings`]
//! - **Calendars**: a local SQLite calendar and a Google Calendar adapter
//!   behind the [`Calendar`] trait
//! - **Digest**: weekly summary delivered through a [`Mailer`]
//!
//! ## Key Components
//!
//! - [`CounterEngine`]: Counter resolution
//! - [`run_daily`]: The daily run over every enabled habit
//! - [`WeeklyDigest`]: Weekly aggregation and rendering
//! - [`Database`]: Counter, run log and job persistence
//! - [`Config`]: Application configuration management

pub mod calendar;
pub mod control;
pub mod counter;
pub mod dates;
pub mod digest;
pub mod error;
pub mod habit;
pub mod integrations;
pub mod mail;
pub mod messages;
pub mod reconcile;
pub mod scheduler;
pub mod stats;
pub mod storage;

pub use calendar::{Calendar, CalendarEvent, CalendarInfo, GoogleCalendars, LocalCalendars};
pub use control::{scan_control_events, ControlMarker, ControlScan};
pub use counter::{resolve_counter, ControlSignals, CounterEngine, Resolution};
pub use dates::{DayBounds, DayProvider, FixedDays, LocalDays};
pub use digest::{send_weekly_digest, WeeklyDigest};
pub use error::{
    CalendarError, ConfigError, CoreError, HabitError, MailError, OAuthError, StorageError,
};
pub use habit::{Habit, Theme};
pub use mail::{GmailMailer, MailMessage, Mailer, OutboxMailer};
pub use messages::{select_message, tracking_title};
pub use reconcile::{reconcile, run_daily, HabitReport, HabitStatus, RunReport};
pub use scheduler::{JobRecord, JobScheduler, JobSpec};
pub use stats::TrackingStats;
pub use storage::{Config, Database, KeyValueStore, MemoryStore, Settings};
