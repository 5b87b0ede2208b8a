use chrono::{Local, Utc};
use clap::Subcommand;
use streakcal_core::scheduler::{crontab_lines, default_jobs, is_due, Cadence};
use streakcal_core::{Database, JobScheduler};

use super::{print_json, settings, CmdResult};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Install (or update) the daily run and weekly digest jobs
    Install,
    /// List installed jobs
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print equivalent system crontab entries
    Crontab {
        /// Program path used in the entries
        #[arg(long, default_value = "streakcal")]
        program: String,
    },
}

fn describe(cadence: Cadence) -> String {
    match cadence {
        Cadence::Daily { hour } => format!("daily at {hour:02}:00"),
        Cadence::Weekly { weekday, hour } => format!("every {weekday} at {hour:02}:00"),
    }
}

pub fn run(action: ScheduleAction) -> CmdResult {
    let settings = settings()?;
    let specs = default_jobs(&settings.schedule);

    match action {
        ScheduleAction::Install => {
            let mut db = Database::open()?;
            let now = Utc::now();
            for spec in &specs {
                db.install(spec, now)?;
                println!("installed {} ({})", spec.name, describe(spec.cadence));
            }
        }
        ScheduleAction::List { json } => {
            let db = Database::open()?;
            let jobs = db.jobs()?;
            if json {
                return print_json(&jobs);
            }
            if jobs.is_empty() {
                println!("no jobs installed");
            }
            let now = Local::now();
            for job in &jobs {
                let last = job
                    .last_run
                    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".into());
                println!(
                    "{:<14} {:<8} {:<22} last run: {}{}",
                    job.spec.name,
                    job.spec.handler,
                    describe(job.spec.cadence),
                    last,
                    if is_due(job, &now) { " (due)" } else { "" }
                );
            }
        }
        ScheduleAction::Crontab { program } => {
            for line in crontab_lines(&specs, &program) {
                println!("{line}");
            }
        }
    }
    Ok(())
}
