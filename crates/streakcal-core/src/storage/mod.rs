mod config;
pub mod database;
pub mod kv;

pub use config::{
    parse_weekday, CalendarBackend, Config, DigestConfig, FeatureFlags, HabitConfig, LoggingConfig,
    MailBackend, MailConfig, ScheduleConfig, ScheduleSettings, Settings,
};
pub use database::{Database, RunLogEntry};
pub use kv::{counter_key, read_counter, write_counter, CounterBatch, KeyValueStore, MemoryStore};

use std::path::PathBuf;

use crate::error::StorageError;

/// Returns the data directory, creating it if needed.
///
/// `STREAKCAL_DATA_DIR` wins when set. Otherwise `~/.config/streakcal`, or
/// `~/.config/streakcal-dev` with `STREAKCAL_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StorageError> {
    let dir = match std::env::var_os("STREAKCAL_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STREAKCAL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("streakcal-dev")
            } else {
                base_dir.join("streakcal")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StorageError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
