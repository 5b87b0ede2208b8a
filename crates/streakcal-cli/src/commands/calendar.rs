use chrono::NaiveDate;
use clap::Subcommand;
use streakcal_core::{Calendar, ControlMarker};

use super::{date_arg, days, print_json, settings, Calendars, CmdResult};

#[derive(Subcommand)]
pub enum CalendarAction {
    /// List available calendars
    List,
    /// Create a calendar (local backend only)
    Create {
        /// Calendar name
        name: String,
    },
    /// Show the events on a day
    Events {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an all-day event
    Add {
        title: String,
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
    /// Drop a RESET or SKIP control event
    Mark {
        /// reset | skip
        #[arg(value_parser = marker_arg)]
        marker: ControlMarker,
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },
}

fn marker_arg(s: &str) -> Result<ControlMarker, String> {
    ControlMarker::parse(s).ok_or_else(|| format!("expected reset or skip, got '{s}'"))
}

pub fn run(action: CalendarAction) -> CmdResult {
    let settings = settings()?;
    let calendars = Calendars::open(&settings)?;
    let name = settings.calendar_name.as_str();

    match action {
        CalendarAction::List => {
            for info in calendars.list()? {
                let marker = if info.name == name { "*" } else { " " };
                println!("{marker} {}", info.name);
            }
        }
        CalendarAction::Create { name } => match &calendars {
            Calendars::Local(local) => {
                let info = local.create_calendar(&name)?;
                println!("calendar '{}' ready ({})", info.name, info.id);
            }
            Calendars::Google(_) => {
                return Err("create calendars in Google Calendar itself".into());
            }
        },
        CalendarAction::Events { date, json } => {
            let bounds = days(date).day(0);
            let events = calendars.with_calendar(name, |cal| cal.query_events(&bounds, None))??;
            if json {
                return print_json(&events);
            }
            if events.is_empty() {
                println!("no events on {}", bounds.first_day);
            }
            for e in &events {
                let kind = if e.all_day { "all-day" } else { "timed" };
                let tag = e.habit_tag().map(|t| format!("  [{t}]")).unwrap_or_default();
                println!("{:<8} {}{tag}", kind, e.title);
            }
        }
        CalendarAction::Add { title, date } => {
            let bounds = days(date).day(0);
            let event = calendars
                .with_calendar(name, |cal| cal.create_all_day_event(&title, &bounds, ""))??;
            println!("added '{}' on {}", event.title, event.day);
        }
        CalendarAction::Mark { marker, date } => {
            let bounds = days(date).day(0);
            let event = calendars.with_calendar(name, |cal| {
                cal.create_all_day_event(marker.literal(), &bounds, "")
            })??;
            println!("marked {} on {}", marker, event.day);
        }
    }
    Ok(())
}
