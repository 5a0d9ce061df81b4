//! Cycle statistics and analytics over recorded period starts.
//!
//! All functions here expect start dates in ascending chronological order.
//! Intervals are taken as `dates[i + 1] - dates[i]`, so a descending input
//! yields negative lengths. [`crate::HistoryStore`] reverses its
//! newest-first history before calling in.

use crate::calendar::{add_days, days_between};
use crate::{CycleStatistics, PeriodEntry, DEFAULT_CYCLE_LENGTH};
use chrono::NaiveDate;
use serde::Serialize;

/// Shortest cycle considered by the weighted average
pub const MIN_CYCLE_LENGTH: i64 = 21;

/// Longest cycle considered by the weighted average
pub const MAX_CYCLE_LENGTH: i64 = 35;

/// A prediction landing within this many days of the actual start counts as accurate
pub const ACCURACY_TOLERANCE_DAYS: i64 = 2;

const MIN_CONFIDENCE: f64 = 0.3;

/// Lengths of the cycles between consecutive starts
pub fn cycle_lengths(ascending: &[NaiveDate]) -> Vec<i64> {
    ascending
        .windows(2)
        .map(|pair| days_between(pair[0], pair[1]))
        .collect()
}

/// Average, minimum and maximum cycle length
///
/// The average is the truncating integer mean of the intervals. With fewer
/// than two dates the `(28, 0, 0)` default is returned.
pub fn calculate_cycle_statistics(ascending: &[NaiveDate]) -> CycleStatistics {
    let lengths = cycle_lengths(ascending);
    let (Some(&min), Some(&max)) = (lengths.iter().min(), lengths.iter().max()) else {
        return CycleStatistics::default();
    };

    let average = lengths.iter().sum::<i64>() / lengths.len() as i64;
    CycleStatistics::new(average, min, max)
}

/// Spread of cycle lengths around their mean
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CycleVariance {
    pub average: f64,
    pub variance: f64,
    pub std_dev: f64,
}

/// Population variance and standard deviation of cycle lengths
pub fn cycle_variance(lengths: &[i64]) -> CycleVariance {
    if lengths.is_empty() {
        return CycleVariance {
            average: DEFAULT_CYCLE_LENGTH as f64,
            variance: 0.0,
            std_dev: 0.0,
        };
    }

    let n = lengths.len() as f64;
    let average = lengths.iter().sum::<i64>() as f64 / n;
    let variance = lengths
        .iter()
        .map(|&len| (len as f64 - average).powi(2))
        .sum::<f64>()
        / n;

    CycleVariance {
        average,
        variance,
        std_dev: variance.sqrt(),
    }
}

/// Average cycle length weighting recent cycles more heavily
///
/// The cycle at index `i` weighs `(i + 1) / n`, and each length is clamped
/// to 21..=35 days before weighting.
pub fn weighted_average_cycle_length(lengths: &[i64]) -> i64 {
    if lengths.is_empty() {
        return DEFAULT_CYCLE_LENGTH;
    }

    let n = lengths.len() as f64;
    let (weighted_sum, weight_sum) =
        lengths
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(sum, weights), (i, &len)| {
                let weight = (i + 1) as f64 / n;
                let clamped = len.clamp(MIN_CYCLE_LENGTH, MAX_CYCLE_LENGTH) as f64;
                (sum + clamped * weight, weights + weight)
            });

    (weighted_sum / weight_sum).round() as i64
}

/// The cycle length seen most often; ties go to the one reaching the count first
pub fn most_common_cycle_length(lengths: &[i64]) -> i64 {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    let mut most_common = DEFAULT_CYCLE_LENGTH;
    let mut best = 0;

    for &len in lengths {
        let count = match counts.iter_mut().find(|(value, _)| *value == len) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                counts.push((len, 1));
                1
            }
        };
        if count > best {
            best = count;
            most_common = len;
        }
    }

    most_common
}

/// Confidence in the next prediction, between 0.3 and 1.0
///
/// Derived from the coefficient of variation of the cycle lengths: the
/// steadier the cycles, the closer to 1.
pub fn prediction_confidence(lengths: &[i64]) -> f64 {
    let spread = cycle_variance(lengths);
    if spread.average <= 0.0 {
        return MIN_CONFIDENCE;
    }

    let cv = spread.std_dev / spread.average;
    (1.0 - cv).clamp(MIN_CONFIDENCE, 1.0)
}

/// Percentage of past cycles predicted within two days by `cycle_length`
///
/// Each start is projected forward by `cycle_length` and compared with the
/// following recorded start. Returns 0 with fewer than two starts.
pub fn historical_accuracy(ascending: &[NaiveDate], cycle_length: i64) -> f64 {
    if ascending.len() < 2 {
        return 0.0;
    }

    let pairs = ascending.len() - 1;
    let accurate = ascending
        .windows(2)
        .filter(|pair| {
            add_days(pair[0], cycle_length).is_some_and(|predicted| {
                days_between(predicted, pair[1]).abs() <= ACCURACY_TOLERANCE_DAYS
            })
        })
        .count();

    accurate as f64 / pairs as f64 * 100.0
}

/// Truncating mean period duration over entries that recorded an end
pub fn average_period_length(entries: &[PeriodEntry]) -> Option<i64> {
    let durations: Vec<i64> = entries
        .iter()
        .filter(|entry| entry.end.is_some())
        .map(PeriodEntry::duration_days)
        .collect();

    if durations.is_empty() {
        return None;
    }
    Some(durations.iter().sum::<i64>() / durations.len() as i64)
}

/// Summary of everything derivable from a set of period entries
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleAnalytics {
    pub statistics: CycleStatistics,
    pub variance: CycleVariance,
    pub weighted_average: i64,
    pub most_common: i64,
    pub confidence: f64,
    pub historical_accuracy: f64,
    pub average_period_length: Option<i64>,
}

impl CycleAnalytics {
    /// Build analytics from entries in any order
    pub fn from_entries(entries: &[PeriodEntry]) -> Self {
        let mut starts: Vec<NaiveDate> = entries.iter().map(|e| e.start).collect();
        starts.sort();

        let lengths = cycle_lengths(&starts);
        let statistics = calculate_cycle_statistics(&starts);

        Self {
            statistics,
            variance: cycle_variance(&lengths),
            weighted_average: weighted_average_cycle_length(&lengths),
            most_common: most_common_cycle_length(&lengths),
            confidence: prediction_confidence(&lengths),
            historical_accuracy: historical_accuracy(&starts, statistics.average),
            average_period_length: average_period_length(entries),
        }
    }
}
