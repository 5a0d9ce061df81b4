//! Text encoding of the period-entry log.
//!
//! The whole history is a single string of records joined by `|`. Each
//! record is an ISO-8601 start date, optionally followed by a separator and
//! the end date:
//!
//! ```text
//! 2026-01-15/2026-01-20|2026-02-12|2026-03-12/2026-03-16
//! ```
//!
//! New records use the ISO-8601 interval separator `/`. Logs written by
//! older versions join start and end with `-`, which collides with the
//! dashes inside the dates themselves; those records are still read by
//! position (ten characters of start date, a dash, then the end date).

use crate::{Error, PeriodEntry, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Separator between records in the log
pub const ENTRY_SEPARATOR: char = '|';

/// Separator between start and end in [`EntryFormat::Interval`] records
pub const INTERVAL_SEPARATOR: char = '/';

/// Separator between start and end in [`EntryFormat::Legacy`] records
pub const LEGACY_SEPARATOR: char = '-';

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_WIDTH: usize = 10;

/// How start and end are joined when a record is written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryFormat {
    /// `2026-01-15/2026-01-20`
    #[default]
    Interval,
    /// `2026-01-15-2026-01-20`, as written by older versions
    Legacy,
}

impl EntryFormat {
    fn separator(self) -> char {
        match self {
            EntryFormat::Interval => INTERVAL_SEPARATOR,
            EntryFormat::Legacy => LEGACY_SEPARATOR,
        }
    }
}

/// Format a date the way it is stored
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored `YYYY-MM-DD` date
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| Error::InvalidEntry(format!("bad date {:?}: {}", text, e)))
}

/// Encode one entry as a record
pub fn encode_entry(entry: &PeriodEntry, format: EntryFormat) -> String {
    let start = format_date(entry.start);
    match entry.end {
        Some(end) => format!("{}{}{}", start, format.separator(), format_date(end)),
        None => start,
    }
}

/// Decode one record in either format
///
/// Records are taken verbatim; surrounding whitespace makes a record unreadable.
pub fn decode_entry(record: &str) -> Result<PeriodEntry> {
    if record.trim() != record {
        return Err(Error::InvalidEntry(format!(
            "unexpected whitespace in record {:?}",
            record
        )));
    }

    let (start, end) = match record.split_once(INTERVAL_SEPARATOR) {
        Some((start, end)) => (start, Some(end)),
        None => split_legacy(record)?,
    };

    Ok(PeriodEntry {
        start: parse_date(start)?,
        end: end.map(parse_date).transpose()?,
    })
}

/// Split a record with no `/` into start and optional end by position
fn split_legacy(record: &str) -> Result<(&str, Option<&str>)> {
    if record.len() <= DATE_WIDTH {
        return Ok((record, None));
    }

    let start = record
        .get(..DATE_WIDTH)
        .ok_or_else(|| Error::InvalidEntry(format!("bad record {:?}", record)))?;
    match record[DATE_WIDTH..].strip_prefix(LEGACY_SEPARATOR) {
        Some(end) => Ok((start, Some(end))),
        None => Err(Error::InvalidEntry(format!(
            "unexpected text after start date in {:?}",
            record
        ))),
    }
}

/// Split a stored log into raw records, in stored order
///
/// An empty log has no records. Empty segments (`a||b`) are kept as empty
/// records so that rewriting the log does not silently change it.
pub fn split_records(log: &str) -> Vec<&str> {
    if log.is_empty() {
        return Vec::new();
    }
    log.split(ENTRY_SEPARATOR).collect()
}

/// Join raw records back into a stored log
pub fn join_records<'a, I>(records: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut log = String::new();
    for (i, record) in records.into_iter().enumerate() {
        if i > 0 {
            log.push(ENTRY_SEPARATOR);
        }
        log.push_str(record);
    }
    log
}

/// Append an encoded entry to a stored log
pub fn append_entry(log: &str, entry: &PeriodEntry, format: EntryFormat) -> String {
    let record = encode_entry(entry, format);
    if log.is_empty() {
        record
    } else {
        format!("{}{}{}", log, ENTRY_SEPARATOR, record)
    }
}

/// Decode every readable record, in stored order
///
/// A record that cannot be decoded is logged and skipped; it never fails
/// the rest of the log.
pub fn decode_log(log: &str) -> Vec<PeriodEntry> {
    let mut entries = Vec::new();

    for (index, record) in split_records(log).into_iter().enumerate() {
        match decode_entry(record) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Skipping period record {}: {}", index + 1, e);
            }
        }
    }

    entries
}

/// Encode a list of entries as a complete log
pub fn encode_log(entries: &[PeriodEntry], format: EntryFormat) -> String {
    let records: Vec<String> = entries.iter().map(|e| encode_entry(e, format)).collect();
    join_records(records.iter().map(String::as_str))
}
