#![forbid(unsafe_code)]

//! Core domain model and business logic for cycle tracking.
//!
//! This crate provides:
//! - Domain types (period entries, date ranges, statistics)
//! - Cycle prediction (next period, fertile window)
//! - Cycle statistics and analytics
//! - Persistence (entry codec, storage port, history store)

pub mod types;
pub mod error;
pub mod calendar;
pub mod config;
pub mod logging;
pub mod calculator;
pub mod statistics;
pub mod codec;
pub mod store;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use calculator::CycleCalculator;
pub use statistics::{calculate_cycle_statistics, CycleAnalytics};
pub use codec::EntryFormat;
pub use store::{Batch, FileStore, MemoryStore, PrefsStore, StoreMode};
pub use history::HistoryStore;
