use chrono::{Local, Utc};
use streakcal_core::scheduler::{default_jobs, due_jobs, ensure_jobs};
use streakcal_core::{Database, DayProvider, JobScheduler, LocalDays};
use tracing::{error, info};

use super::digest::deliver;
use super::run::{daily, print_report};
use super::{settings, CmdResult};

/// Install missing jobs, then fire every due one.
///
/// A job is only marked as ran when it succeeded, so a failed daily run is
/// retried on the next tick.
pub fn run() -> CmdResult {
    let settings = settings()?;
    let mut db = Database::open()?;
    let now = Local::now();

    for name in ensure_jobs(&mut db, &default_jobs(&settings.schedule), Utc::now())? {
        println!("installed {name}");
    }

    let due = due_jobs(&db, &now)?;
    if due.is_empty() {
        println!("nothing due");
        return Ok(());
    }

    let mut failed = Vec::new();
    for job in due {
        let outcome: Result<(), Box<dyn std::error::Error>> = match job.spec.handler.as_str() {
            "run" => daily(&settings, LocalDays.day(0)).and_then(|report| {
                print_report(&report);
                if report.is_success() {
                    Ok(())
                } else {
                    Err(format!("{} habit(s) failed", report.failed).into())
                }
            }),
            "digest" => deliver(&settings, LocalDays.previous_week()).map(|sent| match sent {
                Some(message) => println!("digest sent to {}", message.to),
                None => println!("weekly digest disabled"),
            }),
            other => Err(format!("unknown job handler '{other}'").into()),
        };

        match outcome {
            Ok(()) => {
                db.mark_ran(&job.spec.name, Utc::now())?;
                info!(job = %job.spec.name, "job ran");
            }
            Err(e) => {
                error!(job = %job.spec.name, error = %e, "job failed");
                failed.push(format!("{}: {e}", job.spec.name));
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(failed.join("; ").into())
    }
}
