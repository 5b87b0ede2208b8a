use chrono::NaiveDate;
use clap::Args;
use streakcal_core::{send_weekly_digest, Database, DayBounds, MailMessage, Settings, WeeklyDigest};
use tracing::info;

use super::{date_arg, days, mailer, print_json, settings, Calendars, CmdResult};

#[derive(Args)]
pub struct DigestArgs {
    /// Report on the week before this date (YYYY-MM-DD, default today)
    #[arg(long, value_parser = date_arg)]
    date: Option<NaiveDate>,
    /// Print the digest instead of sending it
    #[arg(long)]
    dry_run: bool,
    /// Print the digest as JSON
    #[arg(long)]
    json: bool,
}

/// Collect the digest for `week`.
pub fn collect(settings: &Settings, week: DayBounds) -> Result<WeeklyDigest, Box<dyn std::error::Error>> {
    let calendars = Calendars::open(settings)?;
    let db = Database::open()?;
    let log = db.run_log_between(week.first_day, week.end_day)?;
    let digest = calendars.with_calendar(&settings.calendar_name, |cal| {
        WeeklyDigest::collect(settings, &*cal, &db, &log, &week)
    })??;
    Ok(digest)
}

/// Collect and send. `None` when the digest is disabled.
pub fn deliver(
    settings: &Settings,
    week: DayBounds,
) -> Result<Option<MailMessage>, Box<dyn std::error::Error>> {
    if !settings.digest.enabled {
        info!("weekly digest disabled");
        return Ok(None);
    }
    let digest = collect(settings, week)?;
    let mut mailer = mailer(settings)?;
    Ok(Some(send_weekly_digest(settings, &digest, mailer.as_mut())?))
}

pub fn run(args: DigestArgs) -> CmdResult {
    let settings = settings()?;
    let week = days(args.date).previous_week();

    if args.dry_run {
        let digest = collect(&settings, week)?;
        if args.json {
            print_json(&digest)?;
        } else {
            println!("Subject: {}\n\n{}", digest.subject(), digest.render_body());
        }
        return Ok(());
    }

    match deliver(&settings, week)? {
        Some(message) if args.json => print_json(&message)?,
        Some(message) => println!("digest sent to {}", message.to),
        None => println!("weekly digest disabled"),
    }
    Ok(())
}
