use chrono::Local;
use clap::Subcommand;
use streakcal_core::storage::read_counter;
use streakcal_core::{Database, TrackingStats};

use super::{print_json, settings, CmdResult};

#[derive(Subcommand)]
pub enum HabitAction {
    /// List configured habits
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show tracking statistics for a habit
    Stats {
        /// Habit id
        habit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: HabitAction) -> CmdResult {
    let settings = settings()?;
    let db = Database::open()?;
    let today = Local::now().date_naive();

    match action {
        HabitAction::List { json } => {
            let stats = settings
                .habits
                .iter()
                .map(|h| Ok(TrackingStats::for_habit(h, read_counter(&db, &h.id)?, today, &settings)))
                .collect::<Result<Vec<_>, streakcal_core::StorageError>>()?;
            if json {
                return print_json(&stats);
            }
            for s in &stats {
                println!(
                    "{:<12} {:<24} {:<9} day {:>5}{}",
                    s.habit_id,
                    s.habit_name,
                    s.theme,
                    s.current_count,
                    if s.enabled { "" } else { "  (disabled)" }
                );
            }
        }
        HabitAction::Stats { habit, json } => {
            let h = settings
                .habit(&habit)
                .ok_or_else(|| format!("unknown habit '{habit}'"))?;
            let stats = TrackingStats::for_habit(h, read_counter(&db, &h.id)?, today, &settings);
            if json {
                return print_json(&stats);
            }
            println!("Habit:            {} ({})", stats.habit_name, stats.habit_id);
            println!("Calendar:         {}", stats.calendar_name);
            println!("Theme:            {}", stats.theme);
            println!("Start date:       {}", stats.start_date);
            println!("Days since start: {}", stats.days_since_start);
            println!("Current count:    {}", stats.current_count);
            if let Some(manual) = stats.manual_counter {
                println!("Manual override:  {manual} (persisted {})", stats.persisted_count);
            }
            println!("Reset by event:   {}", stats.reset_by_event);
            println!("Skip by event:    {}", stats.skip_by_event);
            match &stats.next_milestone {
                Some(m) => println!("Next milestone:   day {} – {}", m.day, m.message),
                None => println!("Next milestone:   none"),
            }
            println!("Enabled:          {}", stats.enabled);
        }
    }
    Ok(())
}
