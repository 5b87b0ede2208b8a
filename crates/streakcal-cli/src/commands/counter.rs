use clap::Subcommand;
use streakcal_core::storage::{counter_key, read_counter, write_counter};
use streakcal_core::{Database, Settings};

use super::{settings, CmdResult};

#[derive(Subcommand)]
pub enum CounterAction {
    /// List every stored counter
    List,
    /// Show the persisted counter
    Get {
        /// Habit id
        habit: String,
    },
    /// Overwrite the persisted counter
    Set {
        /// Habit id
        habit: String,
        value: u32,
    },
    /// Reset the counter (0 back-fills from the start date on the next run)
    Reset {
        /// Habit id
        habit: String,
        #[arg(long, default_value_t = 0)]
        value: u32,
    },
}

fn known<'a>(settings: &'a Settings, id: &str) -> Result<&'a str, String> {
    settings
        .habit(id)
        .map(|h| h.id.as_str())
        .ok_or_else(|| format!("unknown habit '{id}'"))
}

fn within_ceiling(settings: &Settings, value: u32) -> Result<u32, String> {
    if value > settings.max_counter_days {
        return Err(format!(
            "{value} is above the maximum of {} days",
            settings.max_counter_days
        ));
    }
    Ok(value)
}

pub fn run(action: CounterAction) -> CmdResult {
    let settings = settings()?;
    let mut db = Database::open()?;

    match action {
        CounterAction::List => {
            let prefix = counter_key("");
            for (key, value) in db.kv_prefixed(&prefix)? {
                let id = key.trim_start_matches(prefix.as_str());
                let note = if settings.habit(id).is_some() { "" } else { "  (not configured)" };
                println!("{id:<16} {value}{note}");
            }
        }
        CounterAction::Get { habit } => {
            let id = known(&settings, &habit)?;
            println!("{}", read_counter(&db, id)?);
        }
        CounterAction::Set { habit, value } => {
            let id = known(&settings, &habit)?;
            let value = within_ceiling(&settings, value)?;
            write_counter(&mut db, id, value)?;
            println!("{id} = {value}");
        }
        CounterAction::Reset { habit, value } => {
            let id = known(&settings, &habit)?;
            let value = within_ceiling(&settings, value)?;
            write_counter(&mut db, id, value)?;
            println!("{id} reset to {value}");
        }
    }
    Ok(())
}
