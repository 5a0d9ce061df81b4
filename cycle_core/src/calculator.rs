//! Cycle prediction from a reference period start.
//!
//! The calculator holds two values, the reference start and the cycle
//! length, and derives every prediction from them:
//! - Next period: reference start + cycle length
//! - Fertile window: days 12 through 16 after the reference start,
//!   independent of cycle length
//! - Predicted period: its start and the five days after it
//!
//! Queries that depend on "today" come in two forms: one reading the local
//! system clock and an `*_on` variant taking the date explicitly.

use crate::calendar::{add_days, days_between};
use crate::{
    DateRange, DayStatus, DEFAULT_CYCLE_LENGTH, FERTILE_WINDOW_END, FERTILE_WINDOW_START,
    PREDICTED_PERIOD_DAYS,
};
use chrono::{Local, NaiveDate};

/// Predicts period and fertile-window dates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleCalculator {
    reference_start: Option<NaiveDate>,
    cycle_length: i64,
}

impl CycleCalculator {
    /// Create a calculator; non-positive cycle lengths fall back to 28 days
    pub fn new(reference_start: Option<NaiveDate>, cycle_length: i64) -> Self {
        Self {
            reference_start,
            cycle_length: normalize_cycle_length(cycle_length),
        }
    }

    pub fn reference_start(&self) -> Option<NaiveDate> {
        self.reference_start
    }

    pub fn set_reference_start(&mut self, start: NaiveDate) {
        self.reference_start = Some(start);
    }

    pub fn cycle_length(&self) -> i64 {
        self.cycle_length
    }

    pub fn set_cycle_length(&mut self, cycle_length: i64) {
        self.cycle_length = normalize_cycle_length(cycle_length);
    }

    /// Predicted start of the next period
    pub fn next_period_date(&self) -> Option<NaiveDate> {
        add_days(self.reference_start?, self.cycle_length)
    }

    /// Predicted last day of the next period
    pub fn next_period_end(&self) -> Option<NaiveDate> {
        add_days(self.next_period_date()?, PREDICTED_PERIOD_DAYS)
    }

    /// Fertile window of the cycle beginning at the reference start
    pub fn fertile_window(&self) -> Option<DateRange> {
        fertile_window_from(self.reference_start?)
    }

    /// Fertile window `cycles` cycles away from the reference cycle
    ///
    /// `0` is the current cycle; negative values look back in time.
    pub fn fertile_window_for_cycle(&self, cycles: i64) -> Option<DateRange> {
        let offset = self.cycle_length.checked_mul(cycles)?;
        let cycle_start = add_days(self.reference_start?, offset)?;
        fertile_window_from(cycle_start)
    }

    /// Days from today until the next predicted period (negative once past)
    pub fn days_until_next_period(&self) -> Option<i64> {
        self.days_until_next_period_on(today())
    }

    pub fn days_until_next_period_on(&self, today: NaiveDate) -> Option<i64> {
        self.next_period_date()
            .map(|next| days_between(today, next))
    }

    /// Days from today until the fertile window opens (negative once past)
    pub fn days_until_fertile_window(&self) -> Option<i64> {
        self.days_until_fertile_window_on(today())
    }

    pub fn days_until_fertile_window_on(&self, today: NaiveDate) -> Option<i64> {
        self.fertile_window()
            .map(|window| days_between(today, window.start))
    }

    pub fn is_today_in_fertile_window(&self) -> bool {
        self.is_in_fertile_window_on(today())
    }

    pub fn is_in_fertile_window_on(&self, date: NaiveDate) -> bool {
        self.fertile_window()
            .is_some_and(|window| window.contains(date))
    }

    /// Classify `date` by its position in the repeating cycle
    ///
    /// Cycles repeat every `cycle_length` days from the reference start in
    /// both directions.
    pub fn day_status_on(&self, date: NaiveDate) -> Option<DayStatus> {
        let offset = days_between(self.reference_start?, date).rem_euclid(self.cycle_length);

        let status = if offset <= PREDICTED_PERIOD_DAYS {
            DayStatus::Menstrual
        } else if (FERTILE_WINDOW_START..=FERTILE_WINDOW_END).contains(&offset) {
            DayStatus::Fertile
        } else {
            DayStatus::Other
        };
        Some(status)
    }

    pub fn today_status(&self) -> Option<DayStatus> {
        self.day_status_on(today())
    }

    /// Day of the current cycle, counting the reference start as day 0
    pub fn cycle_day_on(&self, today: NaiveDate) -> Option<i64> {
        self.reference_start
            .map(|start| days_between(start, today))
    }
}

impl Default for CycleCalculator {
    fn default() -> Self {
        Self::new(None, DEFAULT_CYCLE_LENGTH)
    }
}

fn normalize_cycle_length(cycle_length: i64) -> i64 {
    if cycle_length > 0 {
        cycle_length
    } else {
        DEFAULT_CYCLE_LENGTH
    }
}

fn fertile_window_from(cycle_start: NaiveDate) -> Option<DateRange> {
    Some(DateRange::new(
        add_days(cycle_start, FERTILE_WINDOW_START)?,
        add_days(cycle_start, FERTILE_WINDOW_END)?,
    ))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
