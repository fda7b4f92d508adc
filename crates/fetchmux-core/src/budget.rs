//! Usage budget for the quota-limited provider.
//!
//! Usage is an estimate: each orchestrator attempt adds a configured number of
//! units for its operation rather than true token counts. An attempt is
//! charged once, before the call, however many HTTP requests the reader makes
//! for it while retrying transient failures. Counters roll over on UTC hour
//! and day boundaries.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::UtcDateTime;

/// Hour marker: calendar date plus hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourMarker {
    pub date: Date,
    pub hour: u8,
}

impl HourMarker {
    fn of(now: UtcDateTime) -> Self {
        Self {
            date: now.date(),
            hour: now.hour(),
        }
    }
}

/// Budget thresholds as percentages of the limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetThresholds {
    pub daily_pct: f64,
    pub hourly_pct: f64,
}

impl Default for BudgetThresholds {
    fn default() -> Self {
        Self {
            daily_pct: 80.0,
            hourly_pct: 85.0,
        }
    }
}

/// Usage counters against daily and hourly limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    pub daily_usage: u64,
    pub daily_limit: u64,
    pub hourly_usage: u64,
    pub hourly_limit: u64,
    pub thresholds: BudgetThresholds,
    pub last_reset_day: Date,
    pub last_reset_hour: HourMarker,
}

impl BudgetState {
    pub fn new(daily_limit: u64, hourly_limit: u64, thresholds: BudgetThresholds) -> Self {
        Self::starting_at(daily_limit, hourly_limit, thresholds, UtcDateTime::now())
    }

    pub fn starting_at(
        daily_limit: u64,
        hourly_limit: u64,
        thresholds: BudgetThresholds,
        now: UtcDateTime,
    ) -> Self {
        Self {
            daily_usage: 0,
            daily_limit: daily_limit.max(1),
            hourly_usage: 0,
            hourly_limit: hourly_limit.max(1),
            thresholds,
            last_reset_day: now.date(),
            last_reset_hour: HourMarker::of(now),
        }
    }

    pub fn with_usage(mut self, daily_usage: u64, hourly_usage: u64) -> Self {
        self.daily_usage = daily_usage;
        self.hourly_usage = hourly_usage;
        self
    }

    /// Resets each counter at most once per elapsed period boundary.
    pub fn roll_over(&mut self, now: UtcDateTime) {
        let today = now.date();
        if today != self.last_reset_day {
            self.daily_usage = 0;
            self.last_reset_day = today;
        }

        let hour = HourMarker::of(now);
        if hour != self.last_reset_hour {
            self.hourly_usage = 0;
            self.last_reset_hour = hour;
        }
    }

    pub fn record_usage(&mut self, units: u64, now: UtcDateTime) {
        self.roll_over(now);
        self.daily_usage = self.daily_usage.saturating_add(units);
        self.hourly_usage = self.hourly_usage.saturating_add(units);
    }

    pub fn daily_usage_pct(&self) -> f64 {
        self.daily_usage as f64 / self.daily_limit as f64 * 100.0
    }

    pub fn hourly_usage_pct(&self) -> f64 {
        self.hourly_usage as f64 / self.hourly_limit as f64 * 100.0
    }

    /// True when either period has crossed its threshold and traffic should
    /// move to the non-quota-limited provider.
    pub fn should_prefer_fallback(&self) -> bool {
        self.daily_usage_pct() > self.thresholds.daily_pct
            || self.hourly_usage_pct() > self.thresholds.hourly_pct
    }
}

/// Thread-safe wrapper around [`BudgetState`].
#[derive(Debug)]
pub struct BudgetTracker {
    state: Mutex<BudgetState>,
}

impl BudgetTracker {
    pub fn new(state: BudgetState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn record_usage(&self, units: u64) {
        self.lock().record_usage(units, UtcDateTime::now());
    }

    /// Current state with period roll-over applied.
    pub fn snapshot(&self) -> BudgetState {
        let mut state = self.lock();
        state.roll_over(UtcDateTime::now());
        state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
