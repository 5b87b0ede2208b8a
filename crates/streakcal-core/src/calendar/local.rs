//! SQLite-backed calendar store.
//!
//! Holds any number of named calendars in `calendar.db` inside the data
//! directory. This is the default backend; it also lets the CLI add control
//! events (`RESET`, `SKIP`) without a remote calendar.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{find_calendar, Calendar, CalendarEvent, CalendarInfo};
use crate::dates::DayBounds;
use crate::error::CalendarError;
use crate::storage::data_dir;

/// All local calendars.
pub struct LocalCalendars {
    conn: Connection,
}

impl LocalCalendars {
    /// Open `calendar.db` in the data directory, creating it if needed.
    pub fn open() -> Result<Self, CalendarError> {
        let dir = data_dir().map_err(|e| CalendarError::Api(e.to_string()))?;
        Self::open_at(&dir.join("calendar.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, CalendarError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (tests and dry runs).
    pub fn open_memory() -> Result<Self, CalendarError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS calendars (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id          TEXT PRIMARY KEY,
                calendar_id TEXT NOT NULL REFERENCES calendars(id),
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                all_day     INTEGER NOT NULL,
                day         TEXT NOT NULL,
                start_at    TEXT NOT NULL,
                end_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_calendar_day ON events(calendar_id, day);
            CREATE INDEX IF NOT EXISTS idx_events_calendar_start ON events(calendar_id, start_at);",
        )?;
        Ok(())
    }

    /// Every calendar, ordered by name.
    pub fn list(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM calendars ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(CalendarInfo {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Create a calendar, or return the existing one with the same name.
    pub fn create_calendar(&self, name: &str) -> Result<CalendarInfo, CalendarError> {
        let existing = self
            .conn
            .query_row(
                "SELECT id FROM calendars WHERE name = ?1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(CalendarInfo {
                id,
                name: name.to_string(),
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO calendars (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, format_instant(Utc::now())],
        )?;
        debug!(calendar = name, "created local calendar");
        Ok(CalendarInfo {
            id,
            name: name.to_string(),
        })
    }

    /// Borrow the calendar named `name`.
    ///
    /// # Errors
    /// [`CalendarError::NotFound`] with the available names.
    pub fn calendar(&self, name: &str) -> Result<LocalCalendar<'_>, CalendarError> {
        let available = self.list()?;
        let info = find_calendar(&available, name)?.clone();
        Ok(LocalCalendar {
            conn: &self.conn,
            info,
        })
    }
}

/// One local calendar.
pub struct LocalCalendar<'a> {
    conn: &'a Connection,
    info: CalendarInfo,
}

impl LocalCalendar<'_> {
    pub fn info(&self) -> &CalendarInfo {
        &self.info
    }

    /// Create a timed (not all-day) event.
    pub fn create_timed_event(
        &mut self,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        description: &str,
    ) -> Result<CalendarEvent, CalendarError> {
        let event = CalendarEvent {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            all_day: false,
            day: start.date_naive(),
            start,
            end,
        };
        self.insert(&event)?;
        Ok(event)
    }

    /// Every event in this calendar, oldest first.
    pub fn all_events(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, all_day, day, start_at, end_at
             FROM events WHERE calendar_id = ?1 ORDER BY day, rowid",
        )?;
        let rows = stmt.query_map(params![self.info.id], row_to_event)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert(&self, event: &CalendarEvent) -> Result<(), CalendarError> {
        self.conn.execute(
            "INSERT INTO events (id, calendar_id, title, description, all_day, day, start_at, end_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                self.info.id,
                event.title,
                event.description,
                event.all_day,
                event.day.format("%Y-%m-%d").to_string(),
                format_instant(event.start),
                format_instant(event.end),
            ],
        )?;
        Ok(())
    }
}

impl Calendar for LocalCalendar<'_> {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn query_events(
        &self,
        range: &DayBounds,
        search: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, all_day, day, start_at, end_at
             FROM events
             WHERE calendar_id = ?1
               AND ((all_day = 1 AND day >= ?2 AND day < ?3)
                 OR (all_day = 0 AND start_at < ?5 AND end_at > ?4))
               AND (?6 IS NULL OR instr(upper(title), upper(?6)) > 0)
             ORDER BY day, rowid",
        )?;
        let rows = stmt.query_map(
            params![
                self.info.id,
                range.first_day.format("%Y-%m-%d").to_string(),
                range.end_day.format("%Y-%m-%d").to_string(),
                format_instant(range.start),
                format_instant(range.end),
                search,
            ],
            row_to_event,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_all_day_event(
        &mut self,
        title: &str,
        range: &DayBounds,
        description: &str,
    ) -> Result<CalendarEvent, CalendarError> {
        let event = CalendarEvent {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            all_day: true,
            day: range.first_day,
            start: range.start,
            end: range.end,
        };
        self.insert(&event)?;
        Ok(event)
    }

    fn delete_event(&mut self, event_id: &str) -> Result<(), CalendarError> {
        let removed = self.conn.execute(
            "DELETE FROM events WHERE id = ?1 AND calendar_id = ?2",
            params![event_id, self.info.id],
        )?;
        if removed == 0 {
            return Err(CalendarError::EventNotFound(event_id.to_string()));
        }
        Ok(())
    }

    fn set_description(&mut self, event_id: &str, description: &str) -> Result<(), CalendarError> {
        let updated = self.conn.execute(
            "UPDATE events SET description = ?1 WHERE id = ?2 AND calendar_id = ?3",
            params![description, event_id, self.info.id],
        )?;
        if updated == 0 {
            return Err(CalendarError::EventNotFound(event_id.to_string()));
        }
        Ok(())
    }
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn row_to_event(row: &rusqlite::Row) -> Result<CalendarEvent, rusqlite::Error> {
    let day: String = row.get(4)?;
    let start: String = row.get(5)?;
    let end: String = row.get(6)?;
    Ok(CalendarEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        all_day: row.get(3)?,
        day: NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| conversion_error(4, e))?,
        start: DateTime::parse_from_rfc3339(&start)
            .map_err(|e| conversion_error(5, e))?
            .with_timezone(&Utc),
        end: DateTime::parse_from_rfc3339(&end)
            .map_err(|e| conversion_error(6, e))?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(s: &str) -> DayBounds {
        DayBounds::utc_day(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn missing_calendar_lists_alternatives() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Work").unwrap();
        match store.calendar("Habits") {
            Err(CalendarError::NotFound { available, .. }) => assert_eq!(available, vec!["Work"]),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("calendar should not exist"),
        }
    }

    #[test]
    fn create_calendar_is_idempotent() {
        let store = LocalCalendars::open_memory().unwrap();
        let a = store.create_calendar("Habits").unwrap();
        let b = store.create_calendar("Habits").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn query_returns_only_events_in_range() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Habits").unwrap();
        let mut cal = store.calendar("Habits").unwrap();
        cal.create_all_day_event("RESET", &day("2026-10-19"), "").unwrap();
        cal.create_all_day_event("SKIP", &day("2026-10-20"), "").unwrap();

        let events = cal.query_events(&day("2026-10-19"), None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "RESET");
        assert!(events[0].all_day);
    }

    #[test]
    fn query_search_is_case_insensitive_substring() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Habits").unwrap();
        let mut cal = store.calendar("Habits").unwrap();
        let d = day("2026-10-19");
        cal.create_all_day_event(" reset ", &d, "").unwrap();
        cal.create_all_day_event("Dentist", &d, "").unwrap();

        let hits = cal.query_events(&d, Some("RESET")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, " reset ");
    }

    #[test]
    fn timed_events_overlap_by_instant() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Habits").unwrap();
        let mut cal = store.calendar("Habits").unwrap();
        let d = day("2026-10-19");
        cal.create_timed_event("RESET", d.start + Duration::hours(9), d.start + Duration::hours(10), "")
            .unwrap();
        let events = cal.query_events(&d, None).unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].all_day);
        assert!(cal.query_events(&day("2026-10-20"), None).unwrap().is_empty());
    }

    #[test]
    fn delete_and_describe_unknown_event_fail() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Habits").unwrap();
        let mut cal = store.calendar("Habits").unwrap();
        assert!(matches!(cal.delete_event("nope"), Err(CalendarError::EventNotFound(_))));
        assert!(matches!(
            cal.set_description("nope", "x"),
            Err(CalendarError::EventNotFound(_))
        ));
    }

    #[test]
    fn set_description_persists() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Habits").unwrap();
        let mut cal = store.calendar("Habits").unwrap();
        let d = day("2026-10-19");
        let e = cal.create_all_day_event("Read - Day 3 – x", &d, "").unwrap();
        cal.set_description(&e.id, "streakcal-habit:read").unwrap();
        let events = cal.query_events(&d, None).unwrap();
        assert_eq!(events[0].habit_tag(), Some("read"));
    }

    #[test]
    fn calendars_do_not_share_events() {
        let store = LocalCalendars::open_memory().unwrap();
        store.create_calendar("Habits").unwrap();
        store.create_calendar("Work").unwrap();
        let d = day("2026-10-19");
        store
            .calendar("Work")
            .unwrap()
            .create_all_day_event("RESET", &d, "")
            .unwrap();
        let habits = store.calendar("Habits").unwrap();
        assert!(habits.query_events(&d, None).unwrap().is_empty());
        assert!(habits.all_events().unwrap().is_empty());
    }
}
