//! Core domain types for cycle tracking.
//!
//! This module defines the fundamental types used throughout the system:
//! - Recorded period entries
//! - Inclusive date ranges (fertile windows)
//! - Cycle statistics and scalar preferences

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cycle length assumed when no usable history or preference exists
pub const DEFAULT_CYCLE_LENGTH: i64 = 28;

/// First day of the fertile window, counted from a period start
pub const FERTILE_WINDOW_START: i64 = 12;

/// Last day of the fertile window, counted from a period start
pub const FERTILE_WINDOW_END: i64 = 16;

/// Days from a predicted period start to its predicted end
pub const PREDICTED_PERIOD_DAYS: i64 = 5;

// ============================================================================
// Period Entries
// ============================================================================

/// One recorded menstrual period
///
/// `end`, when present, is expected to be on or after `start`. That is
/// checked by the caller-facing layer before an entry is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodEntry {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl PeriodEntry {
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Inclusive length of the period in days (end defaults to start)
    pub fn duration_days(&self) -> i64 {
        crate::calendar::period_length(Some(self.start), Some(self.end.unwrap_or(self.start)))
    }
}

// ============================================================================
// Date Ranges
// ============================================================================

/// An inclusive range of calendar dates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Check whether `date` falls within the range, both ends included
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Where a calendar day falls within its predicted cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Menstrual,
    Fertile,
    Other,
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayStatus::Menstrual => "menstrual",
            DayStatus::Fertile => "fertile",
            DayStatus::Other => "other",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Statistics and Preferences
// ============================================================================

/// Average, shortest and longest cycle length in days
///
/// With fewer than two recorded starts the values are `(28, 0, 0)`.
/// `min == 0 && max == 0` means "not enough data", never a real extreme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStatistics {
    pub average: i64,
    pub min: i64,
    pub max: i64,
}

impl CycleStatistics {
    pub fn new(average: i64, min: i64, max: i64) -> Self {
        Self { average, min, max }
    }

    /// Whether these statistics were computed from at least one interval
    pub fn has_data(&self) -> bool {
        !(self.min == 0 && self.max == 0)
    }
}

impl Default for CycleStatistics {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLE_LENGTH, 0, 0)
    }
}

impl fmt::Display for CycleStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Avg: {} | Min: {} | Max: {}", self.average, self.min, self.max)
    }
}

/// Scalar cycle preferences kept alongside the history
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePrefs {
    pub last_period_start: Option<NaiveDate>,
    pub manual_cycle_length: Option<i64>,
    pub derived_average_cycle_length: i64,
}

impl CyclePrefs {
    /// Manual cycle length when the user set one, otherwise the derived average
    pub fn effective_cycle_length(&self) -> i64 {
        self.manual_cycle_length
            .unwrap_or(self.derived_average_cycle_length)
    }
}

impl Default for CyclePrefs {
    fn default() -> Self {
        Self {
            last_period_start: None,
            manual_cycle_length: None,
            derived_average_cycle_length: DEFAULT_CYCLE_LENGTH,
        }
    }
}
