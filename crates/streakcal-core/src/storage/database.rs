//! SQLite-backed persistence.
//!
//! Provides:
//! - Key-value store for habit counters
//! - Run log of per-habit daily outcomes
//! - Registry of scheduled jobs

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::kv::KeyValueStore;
use crate::error::StorageError;
use crate::reconcile::{HabitReport, HabitStatus, RunReport};
use crate::scheduler::{Cadence, JobRecord, JobScheduler, JobSpec};

/// One habit's outcome in one daily run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_date: NaiveDate,
    pub habit_id: String,
    /// `created`, `exists` or `failed`.
    pub status: String,
    pub day_count: Option<u32>,
    pub reset: bool,
    pub skip: bool,
    pub detail: String,
}

impl RunLogEntry {
    pub fn from_report(run_date: NaiveDate, report: &HabitReport) -> Self {
        let (day_count, detail) = match &report.status {
            HabitStatus::Created { day, title, .. } => (Some(*day), title.clone()),
            HabitStatus::AlreadyExists { title, .. } => (None, title.clone()),
            HabitStatus::Failed { reason } => (None, reason.clone()),
        };
        Self {
            run_date,
            habit_id: report.habit_id.clone(),
            status: report.status.label().to_string(),
            day_count,
            reset: report.reset_applied,
            skip: report.skip_applied,
            detail,
        }
    }
}

/// SQLite database for counters, the run log and scheduled jobs.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open `streakcal.db` in the data directory.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        Self::open_at(&data_dir()?.join("streakcal.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS run_log (
                run_date    TEXT NOT NULL,
                habit_id    TEXT NOT NULL,
                status      TEXT NOT NULL,
                day_count   INTEGER,
                reset       INTEGER NOT NULL DEFAULT 0,
                skip        INTEGER NOT NULL DEFAULT 0,
                detail      TEXT NOT NULL DEFAULT '',
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (run_date, habit_id)
            );

            CREATE TABLE IF NOT EXISTS jobs (
                name         TEXT PRIMARY KEY,
                handler      TEXT NOT NULL,
                cadence      TEXT NOT NULL,
                installed_at TEXT NOT NULL,
                last_run     TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_run_log_habit ON run_log(habit_id, run_date);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// All kv entries whose key starts with `prefix`.
    pub fn kv_prefixed(&self, prefix: &str) -> Result<Vec<(String, String)>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect()
    }

    /// Journal every habit outcome of `report`.
    ///
    /// A rerun on the same day does not overwrite a `created` entry.
    pub fn record_run(&self, report: &RunReport) -> Result<usize, StorageError> {
        let now = Utc::now().to_rfc3339();
        let mut written = 0;
        for habit in &report.habits {
            let entry = RunLogEntry::from_report(report.date, habit);
            written += self.conn.execute(
                "INSERT INTO run_log (run_date, habit_id, status, day_count, reset, skip, detail, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(run_date, habit_id) DO UPDATE SET
                    status = excluded.status,
                    day_count = excluded.day_count,
                    reset = excluded.reset,
                    skip = excluded.skip,
                    detail = excluded.detail,
                    recorded_at = excluded.recorded_at
                 WHERE run_log.status <> 'created'",
                params![
                    entry.run_date.format("%Y-%m-%d").to_string(),
                    entry.habit_id,
                    entry.status,
                    entry.day_count,
                    entry.reset,
                    entry.skip,
                    entry.detail,
                    now,
                ],
            )?;
        }
        Ok(written)
    }

    /// Run log entries with `first <= run_date < end`, oldest first.
    pub fn run_log_between(
        &self,
        first: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RunLogEntry>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT run_date, habit_id, status, day_count, reset, skip, detail
             FROM run_log
             WHERE run_date >= ?1 AND run_date < ?2
             ORDER BY run_date, habit_id",
        )?;
        let rows = stmt.query_map(
            params![
                first.format("%Y-%m-%d").to_string(),
                end.format("%Y-%m-%d").to_string()
            ],
            |row| {
                let date: String = row.get(0)?;
                Ok((
                    date,
                    RunLogEntry {
                        run_date: NaiveDate::MIN,
                        habit_id: row.get(1)?,
                        status: row.get(2)?,
                        day_count: row.get(3)?,
                        reset: row.get(4)?,
                        skip: row.get(5)?,
                        detail: row.get(6)?,
                    },
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            let (date, mut entry) = row?;
            entry.run_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|e| StorageError::QueryFailed(format!("bad run_date '{date}': {e}")))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.kv_get(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        Ok(self.kv_set(key, value)?)
    }

    fn set_batch(&mut self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::QueryFailed(format!("bad timestamp '{s}': {e}")))
}

impl JobScheduler for Database {
    fn jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, handler, cadence, installed_at, last_run FROM jobs ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            let (name, handler, cadence, installed_at, last_run) = row?;
            let cadence: Cadence = serde_json::from_str(&cadence)
                .map_err(|e| StorageError::QueryFailed(format!("bad cadence for job '{name}': {e}")))?;
            jobs.push(JobRecord {
                spec: JobSpec {
                    name,
                    handler,
                    cadence,
                },
                installed_at: parse_instant(&installed_at)?,
                last_run: last_run.as_deref().map(parse_instant).transpose()?,
            });
        }
        Ok(jobs)
    }

    fn install(&mut self, spec: &JobSpec, at: DateTime<Utc>) -> Result<(), StorageError> {
        let cadence = serde_json::to_string(&spec.cadence)
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO jobs (name, handler, cadence, installed_at, last_run)
             VALUES (?1, ?2, ?3, ?4, NULL)
             ON CONFLICT(name) DO UPDATE SET handler = excluded.handler, cadence = excluded.cadence",
            params![spec.name, spec.handler, cadence, at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn mark_ran(&mut self, name: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE jobs SET last_run = ?2 WHERE name = ?1",
            params![name, at.to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(StorageError::QueryFailed(format!("no job named '{name}'")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Resolution;
    use crate::storage::kv::{read_counter, CounterBatch};
    use chrono::{TimeZone, Weekday};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn report(date: NaiveDate, habits: Vec<HabitReport>) -> RunReport {
        RunReport::from_habits(date, habits)
    }

    fn created(id: &str, day: u32, reset: bool) -> HabitReport {
        HabitReport {
            habit_id: id.into(),
            habit_name: id.into(),
            status: HabitStatus::Created {
                event_id: "e".into(),
                title: format!("{id} - Day {day}"),
                day,
            },
            reset_applied: reset,
            skip_applied: false,
            rule: Some(Resolution::Increment),
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn batch_is_written_in_one_transaction() {
        let mut db = Database::open_memory().unwrap();
        let mut batch = CounterBatch::new();
        batch.stage("read", 5);
        batch.stage("walk", 2);
        assert_eq!(batch.commit(&mut db).unwrap(), 2);
        assert_eq!(read_counter(&db, "read").unwrap(), 5);
        assert_eq!(read_counter(&db, "walk").unwrap(), 2);
        assert_eq!(db.kv_prefixed("HABIT_COUNTER_").unwrap().len(), 2);
    }

    #[test]
    fn run_log_keeps_created_entry_on_rerun() {
        let db = Database::open_memory().unwrap();
        let day = date("2026-10-14");
        db.record_run(&report(day, vec![created("read", 3, true)])).unwrap();

        let rerun = HabitReport {
            status: HabitStatus::AlreadyExists {
                event_id: "e".into(),
                title: "read - Day 3".into(),
            },
            reset_applied: false,
            rule: None,
            ..created("read", 3, false)
        };
        db.record_run(&report(day, vec![rerun])).unwrap();

        let entries = db.run_log_between(day, date("2026-10-15")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, "created");
        assert!(entries[0].reset);
        assert_eq!(entries[0].day_count, Some(3));
    }

    #[test]
    fn run_log_range_is_half_open() {
        let db = Database::open_memory().unwrap();
        for d in ["2026-10-11", "2026-10-12", "2026-10-18", "2026-10-19"] {
            db.record_run(&report(date(d), vec![created("read", 1, false)])).unwrap();
        }
        let entries = db
            .run_log_between(date("2026-10-12"), date("2026-10-19"))
            .unwrap();
        let days: Vec<_> = entries.iter().map(|e| e.run_date).collect();
        assert_eq!(days, vec![date("2026-10-12"), date("2026-10-18")]);
    }

    #[test]
    fn jobs_install_and_mark_ran() {
        let mut db = Database::open_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let spec = JobSpec {
            name: "weekly-digest".into(),
            handler: "digest".into(),
            cadence: Cadence::Weekly {
                weekday: Weekday::Mon,
                hour: 8,
            },
        };
        db.install(&spec, at).unwrap();
        let jobs = db.jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].spec, spec);
        assert_eq!(jobs[0].installed_at, at);
        assert!(jobs[0].last_run.is_none());

        let ran = at + chrono::Duration::hours(9);
        db.mark_ran("weekly-digest", ran).unwrap();
        assert_eq!(db.jobs().unwrap()[0].last_run, Some(ran));
        assert!(db.mark_ran("missing", ran).is_err());
    }
}
