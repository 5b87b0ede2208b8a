pub mod auth;
pub mod calendar;
pub mod completions;
pub mod config;
pub mod counter;
pub mod digest;
pub mod habit;
pub mod run;
pub mod schedule;
pub mod tick;

use chrono::NaiveDate;
use streakcal_core::dates::parse_date;
use streakcal_core::storage::{CalendarBackend, MailBackend};
use streakcal_core::{
    Calendar, CalendarError, CalendarInfo, Config, DayProvider, FixedDays, GmailMailer,
    GoogleCalendars, LocalCalendars, LocalDays, Mailer, OutboxMailer, Settings,
};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Load and validate the configuration.
pub fn settings() -> Result<Settings, Box<dyn std::error::Error>> {
    Ok(Config::load()?.validate()?)
}

/// `--date` value parser.
pub fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("'{s}' is not a YYYY-MM-DD date"))
}

/// Days relative to `--date` when given, else the local today.
pub fn days(date: Option<NaiveDate>) -> Box<dyn DayProvider> {
    match date {
        Some(day) => Box::new(FixedDays::new(day)),
        None => Box::new(LocalDays),
    }
}

/// The configured calendar backend.
pub enum Calendars {
    Local(LocalCalendars),
    Google(GoogleCalendars),
}

impl Calendars {
    pub fn open(settings: &Settings) -> Result<Self, CalendarError> {
        Ok(match settings.backend {
            CalendarBackend::Local => Self::Local(LocalCalendars::open()?),
            CalendarBackend::Google => Self::Google(GoogleCalendars::connect()?),
        })
    }

    pub fn list(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        match self {
            Self::Local(local) => local.list(),
            Self::Google(google) => google.list(),
        }
    }

    /// Run `f` against the calendar named `name`.
    pub fn with_calendar<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut dyn Calendar) -> R,
    ) -> Result<R, CalendarError> {
        match self {
            Self::Local(local) => {
                let mut cal = local.calendar(name)?;
                Ok(f(&mut cal))
            }
            Self::Google(google) => {
                let mut cal = google.calendar(name)?;
                Ok(f(&mut cal))
            }
        }
    }
}

/// The configured digest transport.
pub fn mailer(settings: &Settings) -> Result<Box<dyn Mailer>, Box<dyn std::error::Error>> {
    Ok(match settings.mail.backend {
        MailBackend::Outbox => Box::new(OutboxMailer::open()?),
        MailBackend::Gmail => Box::new(GmailMailer::connect()?),
    })
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
