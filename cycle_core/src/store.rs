//! Key-value storage port and its backends.
//!
//! The history store keeps all of its state in a small set of string and
//! integer preferences. [`PrefsStore`] is the port it depends on:
//! - [`MemoryStore`] keeps values in memory (tests, last-resort fallback)
//! - [`FileStore`] persists them as a JSON object with atomic writes
//!
//! Stores are **not** safe for concurrent mutation. Every write is a
//! read-modify-write of the whole value set, so callers must funnel all
//! access through a single owner.

use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A stored preference value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Int(i64),
    Str(String),
}

type PrefMap = BTreeMap<String, PrefValue>;

/// One change inside a [`Batch`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    PutString(String, String),
    PutInt(String, i64),
    Remove(String),
    Clear,
}

/// A group of edits applied atomically, in order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    edits: Vec<Edit>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_string(mut self, key: &str, value: impl Into<String>) -> Self {
        self.edits.push(Edit::PutString(key.into(), value.into()));
        self
    }

    pub fn put_int(mut self, key: &str, value: i64) -> Self {
        self.edits.push(Edit::PutInt(key.into(), value));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.edits.push(Edit::Remove(key.into()));
        self
    }

    pub fn clear(mut self) -> Self {
        self.edits.push(Edit::Clear);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    fn apply_to(self, values: &mut PrefMap) {
        for edit in self.edits {
            match edit {
                Edit::PutString(key, value) => {
                    values.insert(key, PrefValue::Str(value));
                }
                Edit::PutInt(key, value) => {
                    values.insert(key, PrefValue::Int(value));
                }
                Edit::Remove(key) => {
                    values.remove(&key);
                }
                Edit::Clear => values.clear(),
            }
        }
    }
}

/// Storage port for scalar preferences
///
/// Reads never fail: a missing key or a value of the other type yields
/// `default`. Writes go through [`PrefsStore::apply`], which commits a whole
/// batch or nothing.
///
/// Implementations are single-writer. Concurrent `apply` calls from
/// different owners can lose updates.
pub trait PrefsStore {
    fn get_string(&self, key: &str, default: &str) -> String;

    fn get_int(&self, key: &str, default: i64) -> i64;

    fn contains(&self, key: &str) -> bool;

    fn apply(&mut self, batch: Batch) -> Result<()>;
}

impl<S: PrefsStore + ?Sized> PrefsStore for Box<S> {
    fn get_string(&self, key: &str, default: &str) -> String {
        (**self).get_string(key, default)
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        (**self).get_int(key, default)
    }

    fn contains(&self, key: &str) -> bool {
        (**self).contains(key)
    }

    fn apply(&mut self, batch: Batch) -> Result<()> {
        (**self).apply(batch)
    }
}

fn lookup_string(values: &PrefMap, key: &str, default: &str) -> String {
    match values.get(key) {
        Some(PrefValue::Str(value)) => value.clone(),
        _ => default.to_string(),
    }
}

fn lookup_int(values: &PrefMap, key: &str, default: i64) -> i64 {
    match values.get(key) {
        Some(PrefValue::Int(value)) => *value,
        _ => default,
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Preferences held in memory only
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: PrefMap,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsStore for MemoryStore {
    fn get_string(&self, key: &str, default: &str) -> String {
        lookup_string(&self.values, key, default)
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        lookup_int(&self.values, key, default)
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn apply(&mut self, batch: Batch) -> Result<()> {
        batch.apply_to(&mut self.values);
        Ok(())
    }
}

// ============================================================================
// File store
// ============================================================================

/// Preferences persisted as a JSON object in a single file
///
/// The file is read once when opened. Each [`PrefsStore::apply`] writes the
/// full value set to a temp file in the same directory and renames it over
/// the original, so readers never see a partial write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: PrefMap,
    private: bool,
}

impl FileStore {
    /// Open a plain store at `path`
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is
    /// logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(parent_dir(&path))?;

        let values = load_values(&path);
        tracing::info!("Opened preference store at {:?}", path);
        Ok(Self {
            path,
            values,
            private: false,
        })
    }

    /// Open a store readable only by the current user
    ///
    /// Restricts the file to 0600, and every rewrite keeps it that way. Fails
    /// when the permissions cannot be applied or the platform has no such
    /// notion.
    pub fn open_private(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::create_dir_all(parent_dir(&path))?;
        restrict_permissions(&path)?;

        let values = load_values(&path);
        tracing::info!("Opened private preference store at {:?}", path);
        Ok(Self {
            path,
            values,
            private: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    fn persist(&self, values: &PrefMap) -> Result<()> {
        let temp = NamedTempFile::new_in(parent_dir(&self.path))?;

        // Hold an exclusive lock while the temp file is being written
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(values)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        if self.private {
            set_mode(temp.path(), 0o600)?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} preferences to {:?}", values.len(), self.path);
        Ok(())
    }
}

impl PrefsStore for FileStore {
    fn get_string(&self, key: &str, default: &str) -> String {
        lookup_string(&self.values, key, default)
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        lookup_int(&self.values, key, default)
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn apply(&mut self, batch: Batch) -> Result<()> {
        let mut updated = self.values.clone();
        batch.apply_to(&mut updated);
        self.persist(&updated)?;
        self.values = updated;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_values(path: &Path) -> PrefMap {
    if !path.exists() {
        tracing::info!("No preference file at {:?}, starting empty", path);
        return PrefMap::new();
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Unable to open preference file {:?}: {}. Starting empty.", path, e);
            return PrefMap::new();
        }
    };

    if let Err(e) = file.lock_shared() {
        tracing::warn!("Unable to lock preference file {:?}: {}. Starting empty.", path, e);
        return PrefMap::new();
    }

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    let _ = file.unlock();

    if let Err(e) = read {
        tracing::warn!("Failed to read preference file {:?}: {}. Starting empty.", path, e);
        return PrefMap::new();
    }

    if contents.trim().is_empty() {
        return PrefMap::new();
    }

    match serde_json::from_str::<PrefMap>(&contents) {
        Ok(values) => {
            tracing::debug!("Loaded {} preferences from {:?}", values.len(), path);
            values
        }
        Err(e) => {
            tracing::warn!("Failed to parse preference file {:?}: {}. Starting empty.", path, e);
            PrefMap::new()
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(path: &Path, _mode: u32) -> Result<()> {
    Err(Error::Storage(format!(
        "owner-only permissions are not supported for {:?} on this platform",
        path
    )))
}

fn restrict_permissions(file: &Path) -> Result<()> {
    if !cfg!(unix) {
        return Err(Error::Storage(
            "owner-only permissions are not supported on this platform".into(),
        ));
    }
    if file.exists() {
        set_mode(file, 0o600)
            .map_err(|e| Error::Storage(format!("cannot restrict {:?}: {}", file, e)))?;
    }
    Ok(())
}

// ============================================================================
// Fallback
// ============================================================================

/// Which backend a store ended up on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// Owner-only file store
    Private,
    /// Plain file store, used when the private store could not be opened
    Plain,
    /// Nothing could be opened on disk; changes are lost on exit
    Memory,
}

impl StoreMode {
    pub fn is_degraded(self) -> bool {
        self != StoreMode::Private
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreMode::Private => "private",
            StoreMode::Plain => "plain",
            StoreMode::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Open the private store, falling back to the plain one, then to memory
///
/// Keeping the data available wins over keeping it private: failures are
/// logged and reflected in the returned [`StoreMode`], never returned.
pub fn open_with_fallback<P, F>(private: P, plain: F) -> (Box<dyn PrefsStore>, StoreMode)
where
    P: FnOnce() -> Result<Box<dyn PrefsStore>>,
    F: FnOnce() -> Result<Box<dyn PrefsStore>>,
{
    let private_err = match private() {
        Ok(store) => return (store, StoreMode::Private),
        Err(e) => e,
    };
    tracing::warn!("Private store unavailable ({}), falling back to plain store", private_err);

    match plain() {
        Ok(store) => (store, StoreMode::Plain),
        Err(e) => {
            tracing::error!("Plain store unavailable ({}), keeping data in memory only", e);
            (Box::new(MemoryStore::new()) as Box<dyn PrefsStore>, StoreMode::Memory)
        }
    }
}
