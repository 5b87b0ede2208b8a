//! Weekly habit digest.
//!
//! Summarizes the previous Monday-to-Monday week per habit: tracked and
//! missed days, skips and resets from the run log, the current streak and
//! the tracking entries themselves.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::Calendar;
use crate::dates::DayBounds;
use crate::error::{MailError, Result};
use crate::mail::{MailMessage, Mailer};
use crate::reconcile::is_tracking_event_for;
use crate::storage::{read_counter, KeyValueStore, RunLogEntry, Settings};

/// One habit's week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitWeek {
    pub habit_id: String,
    pub habit_name: String,
    pub tracked: usize,
    pub missed: usize,
    pub skips: usize,
    pub resets: usize,
    pub current_streak: u32,
    /// Tracking event titles in date order.
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestTotals {
    pub tracked: usize,
    pub missed: usize,
    pub skips: usize,
    pub resets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyDigest {
    /// Monday.
    pub week_start: NaiveDate,
    /// Sunday.
    pub week_end: NaiveDate,
    pub habits: Vec<HabitWeek>,
    pub totals: DigestTotals,
}

impl WeeklyDigest {
    /// Gather the digest for `week`.
    ///
    /// `run_log` may hold entries outside the week; they are ignored.
    pub fn collect<C, S>(
        settings: &Settings,
        calendar: &C,
        store: &S,
        run_log: &[RunLogEntry],
        week: &DayBounds,
    ) -> Result<Self>
    where
        C: Calendar + ?Sized,
        S: KeyValueStore + ?Sized,
    {
        let mut events = calendar.query_events(week, None)?;
        events.retain(|e| e.all_day && week.contains_day(e.day));
        events.sort_by(|a, b| (a.day, &a.title).cmp(&(b.day, &b.title)));
        let days_in_week = week.len_days().max(0) as usize;

        let mut habits = Vec::new();
        let mut totals = DigestTotals::default();
        for habit in settings.enabled_habits() {
            let mine: Vec<_> = events
                .iter()
                .filter(|e| is_tracking_event_for(e, habit))
                .collect();
            let tracked_days: BTreeSet<NaiveDate> = mine.iter().map(|e| e.day).collect();
            let logged = run_log
                .iter()
                .filter(|r| r.habit_id == habit.id && week.contains_day(r.run_date));
            let (skips, resets) = logged.fold((0, 0), |(s, r), entry| {
                (s + usize::from(entry.skip), r + usize::from(entry.reset))
            });
            let current_streak = match habit.manual_counter {
                Some(manual) => manual,
                None => read_counter(store, &habit.id)?,
            };

            let week_of = HabitWeek {
                habit_id: habit.id.clone(),
                habit_name: habit.name.clone(),
                tracked: tracked_days.len(),
                missed: days_in_week.saturating_sub(tracked_days.len()),
                skips,
                resets,
                current_streak,
                entries: mine.iter().map(|e| e.title.clone()).collect(),
            };
            debug!(habit = %habit.id, tracked = week_of.tracked, skips, resets, "habit week collected");

            totals.tracked += week_of.tracked;
            totals.missed += week_of.missed;
            totals.skips += week_of.skips;
            totals.resets += week_of.resets;
            habits.push(week_of);
        }

        Ok(Self {
            week_start: week.first_day,
            week_end: week.last_day(),
            habits,
            totals,
        })
    }

    pub fn subject(&self) -> String {
        format!("🗓️ Weekly Habit Report: {}", self.week_start.format("%Y-%m-%d"))
    }

    pub fn render_body(&self) -> String {
        let mut out = format!(
            "Weekly Habit Summary ({} – {})\n",
            self.week_start.format("%Y-%m-%d"),
            self.week_end.format("%Y-%m-%d")
        );

        for h in &self.habits {
            let _ = writeln!(out, "\n{}", h.habit_name);
            let _ = writeln!(out, "• Tracked days: {}", h.tracked);
            let _ = writeln!(out, "• Missed days: {}", h.missed);
            let _ = writeln!(out, "• Skips logged: {}", h.skips);
            let _ = writeln!(out, "• Resets triggered: {}", h.resets);
            let _ = writeln!(out, "• Current streak: {} days", h.current_streak);
            out.push_str("\nEntries:\n");
            if h.entries.is_empty() {
                out.push_str("No entries found\n");
            } else {
                for title in &h.entries {
                    let _ = writeln!(out, "{title}");
                }
            }
        }

        out.push_str("\nOverall\n");
        let _ = writeln!(out, "• Tracked days: {}", self.totals.tracked);
        let _ = writeln!(out, "• Missed days: {}", self.totals.missed);
        let _ = writeln!(out, "• Skips logged: {}", self.totals.skips);
        let _ = writeln!(out, "• Resets triggered: {}", self.totals.resets);
        out.push_str("\nKeep it up!");
        out
    }

    pub fn to_message(&self, to: impl Into<String>) -> MailMessage {
        MailMessage {
            to: to.into(),
            subject: self.subject(),
            body: self.render_body(),
        }
    }
}

/// Resolve the recipient, render the digest and send it.
///
/// The configured recipient wins; otherwise the mailer's default.
pub fn send_weekly_digest<M: Mailer + ?Sized>(
    settings: &Settings,
    digest: &WeeklyDigest,
    mailer: &mut M,
) -> std::result::Result<MailMessage, MailError> {
    let configured = settings
        .digest
        .recipient
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from);
    let to = match configured {
        Some(to) => to,
        None => mailer.default_recipient()?.ok_or(MailError::MissingRecipient)?,
    };

    let message = digest.to_message(to);
    mailer.send(&message)?;
    info!(to = %message.to, week = %digest.week_start, "weekly digest sent");
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{habit_tag, LocalCalendars};
    use crate::storage::{write_counter, Config, HabitConfig, MemoryStore};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn settings() -> Settings {
        let habit = |id: &str, name: &str| HabitConfig {
            id: id.into(),
            name: name.into(),
            start_date: "2026-01-01".into(),
            theme: "general".into(),
            custom_messages: Vec::new(),
            manual_counter: None,
            enabled: true,
        };
        Config {
            habits: vec![habit("read", "Read"), habit("walk", "Walk")],
            ..Config::default()
        }
        .validate()
        .unwrap()
    }

    fn log(day: &str, habit: &str, reset: bool, skip: bool) -> RunLogEntry {
        RunLogEntry {
            run_date: date(day),
            habit_id: habit.into(),
            status: "created".into(),
            day_count: Some(1),
            reset,
            skip,
            detail: String::new(),
        }
    }

    #[derive(Default)]
    struct Captured(Vec<MailMessage>, Option<String>);

    impl Mailer for Captured {
        fn send(&mut self, message: &MailMessage) -> std::result::Result<(), MailError> {
            self.0.push(message.clone());
            Ok(())
        }

        fn default_recipient(&self) -> std::result::Result<Option<String>, MailError> {
            Ok(self.1.clone())
        }
    }

    fn sample_digest() -> WeeklyDigest {
        let s = settings();
        let cals = LocalCalendars::open_memory().unwrap();
        cals.create_calendar("Habits").unwrap();
        let mut cal = cals.calendar("Habits").unwrap();
        for (d, n) in [("2026-10-12", 3), ("2026-10-14", 4), ("2026-10-19", 5)] {
            cal.create_all_day_event(
                &format!("Read - Day {n} – Keep going"),
                &DayBounds::utc_day(date(d)),
                &habit_tag("read"),
            )
            .unwrap();
        }
        let mut store = MemoryStore::new();
        write_counter(&mut store, "read", 5).unwrap();

        let run_log = vec![
            log("2026-10-13", "read", false, true),
            log("2026-10-15", "walk", true, false),
            log("2026-10-20", "read", true, false),
        ];
        let week = DayBounds::utc_previous_week(date("2026-10-21"));
        WeeklyDigest::collect(&s, &cal, &store, &run_log, &week).unwrap()
    }

    #[test]
    fn collect_counts_tracked_missed_and_log_signals() {
        let digest = sample_digest();
        assert_eq!(digest.week_start, date("2026-10-12"));
        assert_eq!(digest.week_end, date("2026-10-18"));

        let read = &digest.habits[0];
        assert_eq!(read.tracked, 2);
        assert_eq!(read.missed, 5);
        assert_eq!(read.skips, 1);
        assert_eq!(read.resets, 0);
        assert_eq!(read.current_streak, 5);
        assert_eq!(
            read.entries,
            vec!["Read - Day 3 – Keep going", "Read - Day 4 – Keep going"]
        );

        let walk = &digest.habits[1];
        assert_eq!(walk.tracked, 0);
        assert_eq!(walk.missed, 7);
        assert_eq!(walk.resets, 1);

        assert_eq!(
            digest.totals,
            DigestTotals {
                tracked: 2,
                missed: 12,
                skips: 1,
                resets: 1
            }
        );
    }

    #[test]
    fn body_and_subject_format() {
        let digest = sample_digest();
        assert_eq!(digest.subject(), "🗓️ Weekly Habit Report: 2026-10-12");
        let body = digest.render_body();
        assert!(body.starts_with("Weekly Habit Summary (2026-10-12 – 2026-10-18)\n"));
        assert!(body.contains("\nRead\n• Tracked days: 2\n• Missed days: 5\n"));
        assert!(body.contains("Entries:\nNo entries found\n"));
        assert!(body.contains("\nOverall\n• Tracked days: 2\n"));
        assert!(body.ends_with("Keep it up!"));
    }

    #[test]
    fn configured_recipient_wins() {
        let mut s = settings();
        s.digest.recipient = Some("me@example.com".into());
        let mut mailer = Captured(Vec::new(), Some("fallback@example.com".into()));
        let msg = send_weekly_digest(&s, &sample_digest(), &mut mailer).unwrap();
        assert_eq!(msg.to, "me@example.com");
        assert_eq!(mailer.0.len(), 1);
    }

    #[test]
    fn missing_recipient_is_an_error() {
        let mut mailer = Captured::default();
        let err = send_weekly_digest(&settings(), &sample_digest(), &mut mailer).unwrap_err();
        assert!(matches!(err, MailError::MissingRecipient));
        assert!(mailer.0.is_empty());
    }
}
