use chrono::NaiveDate;
use clap::Args;
use streakcal_core::{run_daily, Database, DayBounds, HabitStatus, RunReport, Settings};
use tracing::warn;

use super::{date_arg, days, print_json, settings, Calendars, CmdResult};

#[derive(Args)]
pub struct RunArgs {
    /// Day to reconcile (YYYY-MM-DD, default today)
    #[arg(long, value_parser = date_arg)]
    date: Option<NaiveDate>,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

/// Reconcile every enabled habit for `bounds` and record the run.
pub fn daily(settings: &Settings, bounds: DayBounds) -> Result<RunReport, Box<dyn std::error::Error>> {
    let calendars = Calendars::open(settings)?;
    let mut db = Database::open()?;
    let report = calendars.with_calendar(&settings.calendar_name, |cal| {
        run_daily(settings, cal, &mut db, &bounds)
    })?;
    if let Err(e) = db.record_run(&report) {
        warn!(error = %e, "failed to record run log");
    }
    Ok(report)
}

pub fn print_report(report: &RunReport) {
    println!("{}", report.date.format("%Y-%m-%d"));
    for habit in &report.habits {
        match &habit.status {
            HabitStatus::Created { title, .. } => println!("  created  {title}"),
            HabitStatus::AlreadyExists { title, .. } => println!("  exists   {title}"),
            HabitStatus::Failed { reason } => {
                println!("  failed   {}: {reason}", habit.habit_name)
            }
        }
    }
    if let Some(err) = &report.counter_write_error {
        println!("  counter write failed: {err}");
    }
}

pub fn run(args: RunArgs) -> CmdResult {
    let settings = settings()?;
    let report = daily(&settings, days(args.date).day(0))?;

    if args.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if !report.is_success() {
        return Err(format!(
            "{} habit(s) failed{}",
            report.failed,
            if report.counter_write_error.is_some() {
                ", counter write failed"
            } else {
                ""
            }
        )
        .into());
    }
    Ok(())
}
