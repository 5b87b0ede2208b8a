//! Key-value persistence for habit counters.
//!
//! Counters are stored as decimal strings under `HABIT_COUNTER_{habit_id}`.
//! A missing key reads as `0`.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::StorageError;

const COUNTER_PREFIX: &str = "HABIT_COUNTER_";

/// String key-value store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Write every entry in one operation.
    fn set_batch(&mut self, entries: &BTreeMap<String, String>) -> Result<(), StorageError>;
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_batch(&mut self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        self.values
            .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

pub fn counter_key(habit_id: &str) -> String {
    format!("{COUNTER_PREFIX}{habit_id}")
}

/// Persisted counter for `habit_id`, `0` when absent.
///
/// # Errors
/// [`StorageError::CorruptCounter`] when the stored text is not a `u32`.
pub fn read_counter<S: KeyValueStore + ?Sized>(store: &S, habit_id: &str) -> Result<u32, StorageError> {
    let key = counter_key(habit_id);
    match store.get(&key)? {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| StorageError::CorruptCounter { key, value: raw }),
    }
}

pub fn write_counter<S: KeyValueStore + ?Sized>(
    store: &mut S,
    habit_id: &str,
    value: u32,
) -> Result<(), StorageError> {
    store.set(&counter_key(habit_id), &value.to_string())
}

/// Counter values staged during a run, written once at the end.
#[derive(Debug, Clone, Default)]
pub struct CounterBatch {
    entries: BTreeMap<String, String>,
}

impl CounterBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, habit_id: &str, value: u32) {
        self.entries.insert(counter_key(habit_id), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Staged value for `habit_id`.
    pub fn staged(&self, habit_id: &str) -> Option<u32> {
        self.entries
            .get(&counter_key(habit_id))
            .and_then(|v| v.parse().ok())
    }

    /// Write all staged values with a single `set_batch`. No-op when empty.
    pub fn commit<S: KeyValueStore + ?Sized>(self, store: &mut S) -> Result<usize, StorageError> {
        if self.entries.is_empty() {
            return Ok(0);
        }
        let count = self.entries.len();
        store.set_batch(&self.entries)?;
        debug!(count, "counter batch written");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_counter_reads_zero() {
        let store = MemoryStore::new();
        assert_eq!(read_counter(&store, "read").unwrap(), 0);
    }

    #[test]
    fn counter_roundtrips_through_store() {
        let mut store = MemoryStore::new();
        write_counter(&mut store, "read", 12).unwrap();
        assert_eq!(store.get("HABIT_COUNTER_read").unwrap().as_deref(), Some("12"));
        assert_eq!(read_counter(&store, "read").unwrap(), 12);
    }

    #[test]
    fn unparseable_counter_is_corrupt() {
        let mut store = MemoryStore::new();
        store.set("HABIT_COUNTER_read", "twelve").unwrap();
        match read_counter(&store, "read") {
            Err(StorageError::CorruptCounter { key, value }) => {
                assert_eq!(key, "HABIT_COUNTER_read");
                assert_eq!(value, "twelve");
            }
            other => panic!("unexpected: {other:?}"),
        }
        store.set("HABIT_COUNTER_read", "-1").unwrap();
        assert!(read_counter(&store, "read").is_err());
    }

    #[test]
    fn empty_batch_does_not_touch_store() {
        struct Refusing;
        impl KeyValueStore for Refusing {
            fn get(&self, _: &str) -> Result<Option<String>, StorageError> {
                Ok(None)
            }
            fn set(&mut self, _: &str, _: &str) -> Result<(), StorageError> {
                Err(StorageError::Locked)
            }
            fn set_batch(&mut self, _: &BTreeMap<String, String>) -> Result<(), StorageError> {
                Err(StorageError::Locked)
            }
        }
        assert_eq!(CounterBatch::new().commit(&mut Refusing).unwrap(), 0);
    }

    #[test]
    fn batch_commits_all_values() {
        let mut batch = CounterBatch::new();
        batch.stage("read", 3);
        batch.stage("walk", 9);
        batch.stage("read", 4);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.staged("read"), Some(4));

        let mut store = MemoryStore::new();
        assert_eq!(batch.commit(&mut store).unwrap(), 2);
        assert_eq!(read_counter(&store, "read").unwrap(), 4);
        assert_eq!(read_counter(&store, "walk").unwrap(), 9);
    }
}
