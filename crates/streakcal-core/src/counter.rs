//! Counter resolution engine.
//!
//! Decides the day count for a habit from its persisted counter and the
//! control signals found this run. Precedence, highest first, each rule
//! short-circuiting the rest:
//!
//! 1. manual override
//! 2. reset (restart at 1)
//! 3. skip (keep the persisted value)
//! 4. cold start (persisted 0: back-fill from the habit's start date)
//! 5. increment
//!
//! [`CounterEngine::resolve`] then enforces the configured ceiling.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::HabitError;
use crate::habit::Habit;

/// Control events consumed for a habit this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSignals {
    pub reset: bool,
    pub skip: bool,
}

/// Which precedence rule produced a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Manual,
    Reset,
    Skip,
    ColdStart,
    Increment,
}

/// A resolved counter together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub value: u64,
    pub rule: Resolution,
}

/// Apply the precedence rules without the ceiling check.
///
/// Values are widened to `u64` so `persisted + 1` cannot wrap.
pub fn resolve_counter(
    habit: &Habit,
    persisted: u32,
    signals: ControlSignals,
    today: NaiveDate,
) -> Resolved {
    if let Some(manual) = habit.manual_counter {
        return Resolved {
            value: u64::from(manual),
            rule: Resolution::Manual,
        };
    }
    if signals.reset {
        return Resolved {
            value: 1,
            rule: Resolution::Reset,
        };
    }
    if signals.skip {
        return Resolved {
            value: u64::from(persisted),
            rule: Resolution::Skip,
        };
    }
    if persisted == 0 {
        let elapsed = habit.days_since_start(today) + 1;
        return Resolved {
            value: elapsed.max(1) as u64,
            rule: Resolution::ColdStart,
        };
    }
    Resolved {
        value: u64::from(persisted) + 1,
        rule: Resolution::Increment,
    }
}

/// Counter engine bound to a safety ceiling.
#[derive(Debug, Clone, Copy)]
pub struct CounterEngine {
    max_counter_days: u32,
}

impl CounterEngine {
    pub fn new(max_counter_days: u32) -> Self {
        Self { max_counter_days }
    }

    pub fn max_counter_days(&self) -> u32 {
        self.max_counter_days
    }

    /// Resolve the day count for `habit`, failing with
    /// [`HabitError::CounterOverflow`] above the ceiling.
    pub fn resolve(
        &self,
        habit: &Habit,
        persisted: u32,
        signals: ControlSignals,
        today: NaiveDate,
    ) -> Result<(u32, Resolution), HabitError> {
        let resolved = resolve_counter(habit, persisted, signals, today);
        if resolved.value > u64::from(self.max_counter_days) {
            return Err(HabitError::CounterOverflow {
                habit_id: habit.id.clone(),
                value: resolved.value,
                max: self.max_counter_days,
            });
        }
        // Bounded by a u32 ceiling above.
        Ok((resolved.value as u32, resolved.rule))
    }
}
