//! Period history persistence and derived statistics.
//!
//! [`HistoryStore`] owns the encoded period log and the scalar cycle
//! preferences inside a [`PrefsStore`]. The log is the single source of
//! truth: the derived average cycle length is recomputed from it by
//! [`HistoryStore::refresh_statistics`] after every change.

use crate::codec::{self, EntryFormat};
use crate::statistics::calculate_cycle_statistics;
use crate::store::{self, Batch, FileStore, MemoryStore, PrefsStore, StoreMode};
use crate::{
    Config, CycleCalculator, CyclePrefs, CycleStatistics, PeriodEntry, Result,
    DEFAULT_CYCLE_LENGTH,
};
use chrono::NaiveDate;

/// Encoded period log
pub const KEY_PERIOD_ENTRIES: &str = "period_entries";

/// Start date of the most recently logged period
pub const KEY_LAST_PERIOD_START: &str = "last_period_start";

/// Cycle length set by the user
pub const KEY_CYCLE_LENGTH: &str = "cycle_length";

/// Average cycle length derived from the log
pub const KEY_AVERAGE_CYCLE: &str = "average_cycle";

/// CSV header written by [`HistoryStore::export_csv`]
pub const CSV_HEADER: [&str; 3] = ["Period Start", "Period End", "Duration (days)"];

/// Period history backed by a preference store
pub struct HistoryStore<S: PrefsStore> {
    store: S,
    format: EntryFormat,
    mode: StoreMode,
}

impl HistoryStore<Box<dyn PrefsStore>> {
    /// Open the history described by `config`
    ///
    /// Tries the owner-only store first when `storage.private` is set, then a
    /// plain store over the same file, then memory. See [`HistoryStore::mode`].
    pub fn open(config: &Config) -> Self {
        let path = config.prefs_path();

        let (store, mode) = if config.storage.private {
            let plain_path = path.clone();
            store::open_with_fallback(
                || Ok(Box::new(FileStore::open_private(path)?) as Box<dyn PrefsStore>),
                || Ok(Box::new(FileStore::open(plain_path)?) as Box<dyn PrefsStore>),
            )
        } else {
            match FileStore::open(path) {
                Ok(store) => (Box::new(store) as Box<dyn PrefsStore>, StoreMode::Plain),
                Err(e) => {
                    tracing::error!("Plain store unavailable ({}), keeping data in memory only", e);
                    (Box::new(MemoryStore::new()) as Box<dyn PrefsStore>, StoreMode::Memory)
                }
            }
        };

        HistoryStore::new(store, config.storage.entry_format, mode)
    }
}

impl<S: PrefsStore> HistoryStore<S> {
    /// Wrap an already opened store, recording which backend it is
    pub fn new(store: S, format: EntryFormat, mode: StoreMode) -> Self {
        Self {
            store,
            format,
            mode,
        }
    }

    /// Backend the history ended up on
    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn format(&self) -> EntryFormat {
        self.format
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn raw_log(&self) -> String {
        self.store.get_string(KEY_PERIOD_ENTRIES, "")
    }

    /// Record a period and refresh the derived average
    pub fn save_entry(&mut self, start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
        let entry = PeriodEntry::new(start, end);
        let log = codec::append_entry(&self.raw_log(), &entry, self.format);

        self.store.apply(
            Batch::new()
                .put_string(KEY_PERIOD_ENTRIES, log)
                .put_string(KEY_LAST_PERIOD_START, codec::format_date(start)),
        )?;
        tracing::debug!("Logged period starting {}", start);

        self.refresh_statistics()?;
        Ok(())
    }

    /// Every readable entry, most recent start first
    pub fn entries(&self) -> Vec<PeriodEntry> {
        let mut entries = codec::decode_log(&self.raw_log());
        entries.sort_by(|a, b| b.start.cmp(&a.start));
        entries
    }

    /// Every readable entry in the order it was logged
    pub fn stored_entries(&self) -> Vec<PeriodEntry> {
        codec::decode_log(&self.raw_log())
    }

    /// Period start dates, most recent first, duplicates included
    pub fn history(&self) -> Vec<NaiveDate> {
        self.entries().into_iter().map(|e| e.start).collect()
    }

    pub fn last_period_start(&self) -> Option<NaiveDate> {
        let text = self.store.get_string(KEY_LAST_PERIOD_START, "");
        if text.is_empty() {
            return None;
        }

        match codec::parse_date(&text) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!("Ignoring stored last period start: {}", e);
                None
            }
        }
    }

    /// Remove every record starting with `start`, then refresh the average
    ///
    /// A record is removed when its text begins with the date or when it
    /// decodes to an entry starting on it. Other unreadable records are kept.
    pub fn delete_entry(&mut self, start: NaiveDate) -> Result<()> {
        let log = self.raw_log();
        if log.is_empty() {
            return Ok(());
        }

        let key = codec::format_date(start);
        let records = codec::split_records(&log);
        let before = records.len();
        let kept: Vec<&str> = records
            .into_iter()
            .filter(|record| !matches_start(record, &key, start))
            .collect();
        let removed = before - kept.len();

        self.store.apply(
            Batch::new().put_string(KEY_PERIOD_ENTRIES, codec::join_records(kept)),
        )?;
        tracing::debug!("Deleted {} record(s) starting {}", removed, start);

        self.refresh_statistics()?;
        Ok(())
    }

    /// Statistics over the current history
    pub fn statistics(&self) -> CycleStatistics {
        let mut ascending = self.history();
        ascending.reverse();
        calculate_cycle_statistics(&ascending)
    }

    /// Recompute and persist the derived average cycle length
    ///
    /// Runs after every write to the log. With fewer than two starts the
    /// default of 28 days is stored.
    pub fn refresh_statistics(&mut self) -> Result<CycleStatistics> {
        let stats = self.statistics();
        self.store
            .apply(Batch::new().put_int(KEY_AVERAGE_CYCLE, stats.average))?;
        tracing::debug!("Cycle statistics refreshed: {}", stats);
        Ok(stats)
    }

    pub fn average_cycle_length(&self) -> i64 {
        self.store.get_int(KEY_AVERAGE_CYCLE, DEFAULT_CYCLE_LENGTH)
    }

    /// Store a user-chosen cycle length; non-positive values are ignored
    pub fn set_manual_cycle_length(&mut self, cycle_length: i64) -> Result<()> {
        if cycle_length <= 0 {
            tracing::debug!("Ignoring non-positive cycle length {}", cycle_length);
            return Ok(());
        }
        self.store
            .apply(Batch::new().put_int(KEY_CYCLE_LENGTH, cycle_length))
    }

    pub fn manual_cycle_length(&self) -> Option<i64> {
        if !self.store.contains(KEY_CYCLE_LENGTH) {
            return None;
        }
        Some(self.store.get_int(KEY_CYCLE_LENGTH, DEFAULT_CYCLE_LENGTH))
            .filter(|&len| len > 0)
    }

    pub fn prefs(&self) -> CyclePrefs {
        CyclePrefs {
            last_period_start: self.last_period_start(),
            manual_cycle_length: self.manual_cycle_length(),
            derived_average_cycle_length: self.average_cycle_length(),
        }
    }

    pub fn effective_cycle_length(&self) -> i64 {
        self.prefs().effective_cycle_length()
    }

    /// A calculator set to the last logged start and the effective cycle length
    pub fn calculator(&self) -> CycleCalculator {
        let prefs = self.prefs();
        CycleCalculator::new(prefs.last_period_start, prefs.effective_cycle_length())
    }

    /// Wipe the log and every preference in one batch
    pub fn clear_all(&mut self) -> Result<()> {
        self.store.apply(Batch::new().clear())?;
        tracing::info!("Cleared all stored period data");
        Ok(())
    }

    /// Stored entries as CSV, one row per record in logged order
    ///
    /// Duration counts both start and end day; an entry without an end
    /// lasts one day. Records that cannot be decoded are left out.
    pub fn export_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());

        writer.write_record(CSV_HEADER)?;
        for entry in self.stored_entries() {
            let end = entry.end.unwrap_or(entry.start);
            writer.write_record([
                codec::format_date(entry.start),
                codec::format_date(end),
                entry.duration_days().to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| crate::Error::Other(e.to_string()))
    }
}

fn matches_start(record: &str, key: &str, start: NaiveDate) -> bool {
    record.starts_with(key) || codec::decode_entry(record).is_ok_and(|e| e.start == start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn memory_history() -> HistoryStore<MemoryStore> {
        HistoryStore::new(MemoryStore::new(), EntryFormat::Interval, StoreMode::Memory)
    }

    fn log_regular_cycles(history: &mut HistoryStore<MemoryStore>) {
        history.save_entry(date(2026, 1, 15), None).unwrap();
        history.save_entry(date(2026, 2, 12), None).unwrap();
        history.save_entry(date(2026, 3, 12), None).unwrap();
    }

    #[test]
    fn test_end_to_end_prediction() {
        let mut history = memory_history();
        log_regular_cycles(&mut history);

        assert_eq!(history.average_cycle_length(), 28);

        let mut calc = CycleCalculator::default();
        calc.set_reference_start(date(2026, 3, 12));
        calc.set_cycle_length(history.average_cycle_length());

        assert_eq!(calc.next_period_date(), Some(date(2026, 4, 9)));
        let window = calc.fertile_window().unwrap();
        assert_eq!(window.start, date(2026, 3, 24));
        assert_eq!(window.end, date(2026, 3, 28));

        assert_eq!(history.calculator(), calc);
    }

    #[test]
    fn test_history_sorted_most_recent_first() {
        let mut history = memory_history();
        history.save_entry(date(2026, 2, 12), None).unwrap();
        history.save_entry(date(2026, 3, 12), None).unwrap();
        history.save_entry(date(2026, 1, 15), None).unwrap();

        assert_eq!(
            history.history(),
            vec![date(2026, 3, 12), date(2026, 2, 12), date(2026, 1, 15)]
        );
        // Average is computed over chronological order, not insertion order
        assert_eq!(history.average_cycle_length(), 28);
    }

    #[test]
    fn test_duplicate_starts_are_kept() {
        let mut history = memory_history();
        history.save_entry(date(2026, 1, 15), None).unwrap();
        history.save_entry(date(2026, 1, 15), Some(date(2026, 1, 19))).unwrap();

        assert_eq!(history.history(), vec![date(2026, 1, 15), date(2026, 1, 15)]);
    }

    #[test]
    fn test_save_entry_updates_last_period_start() {
        let mut history = memory_history();
        assert_eq!(history.last_period_start(), None);

        history.save_entry(date(2026, 3, 12), None).unwrap();
        assert_eq!(history.last_period_start(), Some(date(2026, 3, 12)));
    }

    #[test]
    fn test_entries_keep_end_dates() {
        let mut history = memory_history();
        history
            .save_entry(date(2026, 1, 15), Some(date(2026, 1, 19)))
            .unwrap();
        history.save_entry(date(2026, 2, 12), None).unwrap();

        assert_eq!(
            history.stored_entries(),
            vec![
                PeriodEntry::new(date(2026, 1, 15), Some(date(2026, 1, 19))),
                PeriodEntry::new(date(2026, 2, 12), None),
            ]
        );
        assert_eq!(history.entries()[0].start, date(2026, 2, 12));
    }

    #[test]
    fn test_delete_removes_matching_entries() {
        let mut history = memory_history();
        log_regular_cycles(&mut history);
        history.save_entry(date(2026, 2, 12), Some(date(2026, 2, 16))).unwrap();

        history.delete_entry(date(2026, 2, 12)).unwrap();
        assert_eq!(history.history(), vec![date(2026, 3, 12), date(2026, 1, 15)]);
        // 2026-01-15 -> 2026-03-12 is 56 days
        assert_eq!(history.average_cycle_length(), 56);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut history = memory_history();
        log_regular_cycles(&mut history);
        let before = history.history();

        history.delete_entry(date(2025, 6, 1)).unwrap();
        assert_eq!(history.history(), before);

        history.delete_entry(date(2026, 1, 15)).unwrap();
        history.delete_entry(date(2026, 1, 15)).unwrap();
        assert_eq!(history.history(), vec![date(2026, 3, 12), date(2026, 2, 12)]);
    }

    #[test]
    fn test_deleted_date_is_never_read_back() {
        let mut store = MemoryStore::new();
        store
            .apply(Batch::new().put_string(KEY_PERIOD_ENTRIES, "2026-01-15| 2026-02-12|2026-02-12"))
            .unwrap();
        let mut history = HistoryStore::new(store, EntryFormat::Interval, StoreMode::Memory);
        assert_eq!(history.history(), vec![date(2026, 2, 12), date(2026, 1, 15)]);

        history.delete_entry(date(2026, 2, 12)).unwrap();
        assert!(!history.history().contains(&date(2026, 2, 12)));
        assert_eq!(history.history(), vec![date(2026, 1, 15)]);

        // The padded record was never readable and stays in the log
        let store = history.into_inner();
        assert_eq!(store.get_string(KEY_PERIOD_ENTRIES, ""), "2026-01-15| 2026-02-12");
    }

    #[test]
    fn test_delete_on_empty_log_is_noop() {
        let mut history = memory_history();
        history.delete_entry(date(2026, 1, 15)).unwrap();
        assert!(history.history().is_empty());
        assert!(!history.into_inner().contains(KEY_PERIOD_ENTRIES));
    }

    #[test]
    fn test_average_resets_when_history_shrinks() {
        let mut history = memory_history();
        history.save_entry(date(2026, 1, 1), None).unwrap();
        history.save_entry(date(2026, 2, 1), None).unwrap();
        assert_eq!(history.average_cycle_length(), 31);

        history.delete_entry(date(2026, 2, 1)).unwrap();
        assert_eq!(history.average_cycle_length(), DEFAULT_CYCLE_LENGTH);
        assert_eq!(history.statistics(), CycleStatistics::default());
    }

    #[test]
    fn test_corrupt_record_does_not_break_history() {
        let mut store = MemoryStore::new();
        store
            .apply(Batch::new().put_string(
                KEY_PERIOD_ENTRIES,
                "2026-01-15|2026-99-99|2026-02-12-2026-02-16",
            ))
            .unwrap();
        let mut history = HistoryStore::new(store, EntryFormat::Interval, StoreMode::Memory);

        assert_eq!(history.history(), vec![date(2026, 2, 12), date(2026, 1, 15)]);

        // Appending keeps the unreadable record in place
        history.save_entry(date(2026, 3, 12), None).unwrap();
        assert_eq!(history.history().len(), 3);
        assert_eq!(history.average_cycle_length(), 28);
    }

    #[test]
    fn test_manual_cycle_length() {
        let mut history = memory_history();
        assert_eq!(history.manual_cycle_length(), None);
        assert_eq!(history.effective_cycle_length(), 28);

        history.set_manual_cycle_length(0).unwrap();
        assert_eq!(history.manual_cycle_length(), None);

        history.set_manual_cycle_length(31).unwrap();
        assert_eq!(history.manual_cycle_length(), Some(31));
        assert_eq!(history.effective_cycle_length(), 31);
        assert_eq!(history.average_cycle_length(), 28);
    }

    #[test]
    fn test_clear_all() {
        let mut history = memory_history();
        log_regular_cycles(&mut history);
        history.set_manual_cycle_length(30).unwrap();

        history.clear_all().unwrap();
        assert!(history.history().is_empty());
        assert_eq!(history.last_period_start(), None);
        assert_eq!(history.manual_cycle_length(), None);
        assert_eq!(history.average_cycle_length(), DEFAULT_CYCLE_LENGTH);
    }

    #[test]
    fn test_export_csv() {
        let mut history = memory_history();
        history
            .save_entry(date(2026, 2, 12), Some(date(2026, 2, 16)))
            .unwrap();
        history.save_entry(date(2026, 1, 15), None).unwrap();

        let csv = history.export_csv().unwrap();
        assert_eq!(
            csv,
            "Period Start,Period End,Duration (days)\n\
             2026-02-12,2026-02-16,5\n\
             2026-01-15,2026-01-15,1\n"
        );
    }

    #[test]
    fn test_export_csv_empty_has_header_only() {
        let history = memory_history();
        assert_eq!(
            history.export_csv().unwrap(),
            "Period Start,Period End,Duration (days)\n"
        );
    }

    #[test]
    fn test_legacy_format_is_written_bit_for_bit() {
        let mut history = HistoryStore::new(MemoryStore::new(), EntryFormat::Legacy, StoreMode::Memory);
        history
            .save_entry(date(2026, 1, 15), Some(date(2026, 1, 20)))
            .unwrap();
        history.save_entry(date(2026, 2, 12), None).unwrap();

        let store = history.into_inner();
        assert_eq!(
            store.get_string(KEY_PERIOD_ENTRIES, ""),
            "2026-01-15-2026-01-20|2026-02-12"
        );
        assert_eq!(store.get_string(KEY_LAST_PERIOD_START, ""), "2026-02-12");
    }

    #[test]
    fn test_file_backed_history_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().to_path_buf();

        {
            let mut history = HistoryStore::open(&config);
            history.save_entry(date(2026, 1, 15), None).unwrap();
            history.save_entry(date(2026, 2, 12), None).unwrap();
        }

        let history = HistoryStore::open(&config);
        assert_eq!(history.history(), vec![date(2026, 2, 12), date(2026, 1, 15)]);
        assert_eq!(history.average_cycle_length(), 28);
        assert!(temp_dir.path().join("prefs.json").exists());
    }

    #[test]
    fn test_wrapped_store_reports_given_mode() {
        let history = memory_history();
        assert_eq!(history.mode(), StoreMode::Memory);
        assert!(history.mode().is_degraded());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_config_reports_private_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().to_path_buf();

        let history = HistoryStore::open(&config);
        assert_eq!(history.mode(), StoreMode::Private);
    }

    #[test]
    fn test_plain_config_reports_plain_mode() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().to_path_buf();
        config.storage.private = false;

        let history = HistoryStore::open(&config);
        assert_eq!(history.mode(), StoreMode::Plain);
    }
}
