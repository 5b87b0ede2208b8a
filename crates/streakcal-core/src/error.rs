//! Core error types for streakcal-core.
//!
//! Errors are split by blast radius: configuration and calendar lookup
//! failures abort a whole invocation, while [`HabitError`] is scoped to a
//! single habit and is recorded in that habit's run report.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for streakcal-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calendar collaborator errors
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Persistent storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Habit-scoped errors surfaced outside a batch run
    #[error("Habit error: {0}")]
    Habit(#[from] HabitError),

    /// Mail delivery errors
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// OAuth-related errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Calendar collaborator errors.
#[derive(Error, Debug)]
pub enum CalendarError {
    /// The configured calendar does not exist
    #[error("Calendar '{name}' not found. Available calendars: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    /// An event id did not resolve to an event
    #[error("Event '{0}' not found")]
    EventNotFound(String),

    /// Remote API failure
    #[error("Calendar API error: {0}")]
    Api(String),

    /// Local calendar store failure
    #[error("Calendar storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Credentials missing or rejected
    #[error("Calendar authentication failed: {0}")]
    Auth(String),
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        CalendarError::Api(err.to_string())
    }
}

/// Key-value and journal storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A stored counter could not be parsed
    #[error("Stored value for '{key}' is not a counter: {value:?}")]
    CorruptCounter { key: String, value: String },

    /// Data directory unavailable
    #[error("Data directory error: {0}")]
    DataDir(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Errors scoped to one habit's processing in a run.
#[derive(Error, Debug)]
pub enum HabitError {
    /// Resolved counter is above the configured ceiling
    #[error("Counter for habit '{habit_id}' would reach {value}, above the maximum of {max} days")]
    CounterOverflow { habit_id: String, value: u64, max: u32 },

    /// Calendar call failed while reconciling
    #[error("Calendar call failed: {0}")]
    Calendar(#[from] CalendarError),

    /// Counter store failed while reconciling
    #[error("Counter store failed: {0}")]
    Storage(#[from] StorageError),
}

/// Mail delivery errors.
#[derive(Error, Debug)]
pub enum MailError {
    /// No recipient could be determined
    #[error("No recipient configured for the weekly digest")]
    MissingRecipient,

    /// Remote API failure
    #[error("Mail API error: {0}")]
    Api(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        MailError::Api(err.to_string())
    }
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// Authorization failed
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Invalid callback
    #[error("Invalid OAuth callback: {0}")]
    InvalidCallback(String),

    /// Not authenticated
    #[error("Not authenticated with {service}")]
    NotAuthenticated { service: String },

    /// Credentials not configured
    #[error("OAuth credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    /// Keyring access failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// IO errors during the callback exchange
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for OAuthError {
    fn from(err: reqwest::Error) -> Self {
        OAuthError::TokenExchangeFailed(err.to_string())
    }
}

impl From<OAuthError> for CalendarError {
    fn from(err: OAuthError) -> Self {
        CalendarError::Auth(err.to_string())
    }
}

impl From<OAuthError> for MailError {
    fn from(err: OAuthError) -> Self {
        MailError::Api(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_available_calendars() {
        let err = CalendarError::NotFound {
            name: "Habits".to_string(),
            available: vec!["Personal".to_string(), "Work".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Calendar 'Habits' not found. Available calendars: Personal, Work"
        );
    }

    #[test]
    fn overflow_message_names_habit_and_ceiling() {
        let err = HabitError::CounterOverflow {
            habit_id: "read".to_string(),
            value: 11,
            max: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("'read'"));
        assert!(msg.contains("maximum of 10"));
    }

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            None,
        );
        assert!(matches!(StorageError::from(err), StorageError::Locked));
    }
}
