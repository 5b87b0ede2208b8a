//! Registry of recurring jobs.
//!
//! Two jobs drive the tool: the daily run and the weekly digest. They are
//! installed once into a [`JobScheduler`] and fired by `streakcal tick` (or
//! by system cron using [`crontab_lines`]).

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StorageError;
use crate::storage::ScheduleSettings;

pub const DAILY_RUN: &str = "daily-run";
pub const WEEKLY_DIGEST: &str = "weekly-digest";

/// When a job fires, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cadence {
    Daily { hour: u32 },
    Weekly { weekday: Weekday, hour: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    /// CLI subcommand the job runs.
    pub handler: String,
    pub cadence: Cadence,
}

impl JobSpec {
    pub fn daily_run(hour: u32) -> Self {
        Self {
            name: DAILY_RUN.into(),
            handler: "run".into(),
            cadence: Cadence::Daily { hour },
        }
    }

    pub fn weekly_digest(weekday: Weekday, hour: u32) -> Self {
        Self {
            name: WEEKLY_DIGEST.into(),
            handler: "digest".into(),
            cadence: Cadence::Weekly { weekday, hour },
        }
    }
}

/// An installed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub spec: JobSpec,
    pub installed_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
}

/// Persistent job registry.
pub trait JobScheduler {
    fn jobs(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// Insert or update the job named `spec.name`.
    fn install(&mut self, spec: &JobSpec, at: DateTime<Utc>) -> Result<(), StorageError>;

    fn mark_ran(&mut self, name: &str, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// The jobs for `schedule`.
pub fn default_jobs(schedule: &ScheduleSettings) -> Vec<JobSpec> {
    vec![
        JobSpec::daily_run(schedule.daily_hour),
        JobSpec::weekly_digest(schedule.weekly_day, schedule.weekly_hour),
    ]
}

/// Install every spec whose handler has no job yet. Returns the names installed.
pub fn ensure_jobs<J: JobScheduler + ?Sized>(
    scheduler: &mut J,
    specs: &[JobSpec],
    now: DateTime<Utc>,
) -> Result<Vec<String>, StorageError> {
    let existing = scheduler.jobs()?;
    let mut installed = Vec::new();
    for spec in specs {
        if existing.iter().any(|j| j.spec.handler == spec.handler) {
            continue;
        }
        scheduler.install(spec, now)?;
        info!(job = %spec.name, handler = %spec.handler, "job installed");
        installed.push(spec.name.clone());
    }
    Ok(installed)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, at: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&at).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        // Inside a DST gap: the hour after.
        None => tz
            .from_local_datetime(&(at + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&at)),
    }
}

/// Most recent firing time of `cadence` at or before `now`.
pub fn latest_occurrence<Tz: TimeZone>(cadence: Cadence, now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let local = now.naive_local();
    let today = local.date();

    let (mut day, hour, step) = match cadence {
        Cadence::Daily { hour } => (today, hour, 1),
        Cadence::Weekly { weekday, hour } => {
            let back = (i64::from(today.weekday().num_days_from_monday())
                - i64::from(weekday.num_days_from_monday()))
            .rem_euclid(7);
            (today - Duration::days(back), hour, 7)
        }
    };

    let at = |d: chrono::NaiveDate| d.and_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    if at(day) > local {
        day -= Duration::days(step);
    }
    resolve_local(&tz, at(day))
}

/// A job is due when its latest occurrence is after both its install time
/// and its last run.
pub fn is_due<Tz: TimeZone>(job: &JobRecord, now: &DateTime<Tz>) -> bool {
    let latest = latest_occurrence(job.spec.cadence, now);
    let since = job
        .last_run
        .map_or(job.installed_at, |ran| ran.max(job.installed_at));
    latest > since
}

/// Installed jobs that should fire at `now`.
pub fn due_jobs<J: JobScheduler + ?Sized, Tz: TimeZone>(
    scheduler: &J,
    now: &DateTime<Tz>,
) -> Result<Vec<JobRecord>, StorageError> {
    Ok(scheduler
        .jobs()?
        .into_iter()
        .filter(|j| is_due(j, now))
        .collect())
}

/// Equivalent system crontab entries.
pub fn crontab_lines(specs: &[JobSpec], program: &str) -> Vec<String> {
    specs
        .iter()
        .map(|spec| match spec.cadence {
            Cadence::Daily { hour } => format!("0 {hour} * * * {program} {}", spec.handler),
            Cadence::Weekly { weekday, hour } => format!(
                "0 {hour} * * {} {program} {}",
                weekday.num_days_from_sunday(),
                spec.handler
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VecScheduler {
        jobs: Vec<JobRecord>,
    }

    impl JobScheduler for VecScheduler {
        fn jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
            Ok(self.jobs.clone())
        }

        fn install(&mut self, spec: &JobSpec, at: DateTime<Utc>) -> Result<(), StorageError> {
            self.jobs.retain(|j| j.spec.name != spec.name);
            self.jobs.push(JobRecord {
                spec: spec.clone(),
                installed_at: at,
                last_run: None,
            });
            Ok(())
        }

        fn mark_ran(&mut self, name: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
            for job in self.jobs.iter_mut().filter(|j| j.spec.name == name) {
                job.last_run = Some(at);
            }
            Ok(())
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn schedule() -> ScheduleSettings {
        ScheduleSettings {
            daily_hour: 1,
            weekly_day: Weekday::Mon,
            weekly_hour: 8,
        }
    }

    #[test]
    fn ensure_jobs_is_install_if_absent() {
        let mut sched = VecScheduler::default();
        let specs = default_jobs(&schedule());
        let now = utc(2026, 10, 19, 0, 0);

        let first = ensure_jobs(&mut sched, &specs, now).unwrap();
        assert_eq!(first, vec![DAILY_RUN.to_string(), WEEKLY_DIGEST.to_string()]);

        let second = ensure_jobs(&mut sched, &specs, now + Duration::hours(1)).unwrap();
        assert!(second.is_empty());
        assert_eq!(sched.jobs.len(), 2);
        assert!(sched.jobs.iter().all(|j| j.installed_at == now));
    }

    #[test]
    fn daily_occurrence_rolls_back_before_hour() {
        let c = Cadence::Daily { hour: 1 };
        assert_eq!(latest_occurrence(c, &utc(2026, 10, 19, 0, 30)), utc(2026, 10, 18, 1, 0));
        assert_eq!(latest_occurrence(c, &utc(2026, 10, 19, 1, 0)), utc(2026, 10, 19, 1, 0));
        assert_eq!(latest_occurrence(c, &utc(2026, 10, 19, 23, 0)), utc(2026, 10, 19, 1, 0));
    }

    #[test]
    fn weekly_occurrence_finds_previous_weekday() {
        let c = Cadence::Weekly {
            weekday: Weekday::Mon,
            hour: 8,
        };
        // Wednesday
        assert_eq!(latest_occurrence(c, &utc(2026, 10, 21, 12, 0)), utc(2026, 10, 19, 8, 0));
        // Monday before 08:00
        assert_eq!(latest_occurrence(c, &utc(2026, 10, 19, 7, 0)), utc(2026, 10, 12, 8, 0));
    }

    #[test]
    fn due_only_after_install_and_last_run() {
        let mut job = JobRecord {
            spec: JobSpec::daily_run(1),
            installed_at: utc(2026, 10, 19, 0, 0),
            last_run: None,
        };
        assert!(!is_due(&job, &utc(2026, 10, 19, 0, 59)));
        assert!(is_due(&job, &utc(2026, 10, 19, 1, 0)));

        job.last_run = Some(utc(2026, 10, 19, 1, 0));
        assert!(!is_due(&job, &utc(2026, 10, 19, 22, 0)));
        assert!(is_due(&job, &utc(2026, 10, 20, 1, 5)));
    }

    #[test]
    fn installed_after_hour_waits_for_next_day() {
        let job = JobRecord {
            spec: JobSpec::daily_run(1),
            installed_at: utc(2026, 10, 19, 2, 0),
            last_run: None,
        };
        assert!(!is_due(&job, &utc(2026, 10, 19, 23, 0)));
        assert!(is_due(&job, &utc(2026, 10, 20, 1, 0)));
    }

    #[test]
    fn due_jobs_filters_registry() {
        let mut sched = VecScheduler::default();
        ensure_jobs(&mut sched, &default_jobs(&schedule()), utc(2026, 10, 18, 0, 0)).unwrap();
        let due = due_jobs(&sched, &utc(2026, 10, 19, 9, 0)).unwrap();
        assert_eq!(due.len(), 2);

        sched.mark_ran(DAILY_RUN, utc(2026, 10, 19, 9, 0)).unwrap();
        let due = due_jobs(&sched, &utc(2026, 10, 19, 10, 0)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].spec.name, WEEKLY_DIGEST);
    }

    #[test]
    fn crontab_uses_sunday_based_weekdays() {
        let lines = crontab_lines(&default_jobs(&schedule()), "streakcal");
        assert_eq!(lines, vec!["0 1 * * * streakcal run", "0 8 * * 1 streakcal digest"]);
    }
}
