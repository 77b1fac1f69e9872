//! # Allow-List Store
//!
//! The set of display names treated as openable containers. The engine
//! depends only on [`AllowListStore`]; where the list lives is the
//! front-end's business.
//!
//! ## File Format
//!
//! ```toml
//! names = ["Halloween box", "Winter box"]
//! ```
//!
//! Saves go to a sibling temp file, are synced, then renamed over the old
//! file.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::error::{EngineError, EngineResult};

/// Names used when no list has been saved yet.
pub const DEFAULT_CONTAINER_NAMES: &[&str] = &["Halloween box"];

/// Container display names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowList {
    names: BTreeSet<String>,
}

impl AllowList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// The built-in default list.
    #[must_use]
    pub fn defaults() -> Self {
        DEFAULT_CONTAINER_NAMES.iter().copied().collect()
    }

    /// Returns true if `name` is a container.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Adds a name. Returns false if it was already present.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Removes a name. Returns false if it was absent.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of names.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no name is listed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Narrow persistence contract for the allow-list.
pub trait AllowListStore: Send + Sync {
    /// Loads the current list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the list exists but cannot be read.
    fn load(&self) -> EngineResult<AllowList>;

    /// Replaces the stored list.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the list cannot be written.
    fn save(&self, list: &AllowList) -> EngineResult<()>;
}

/// Replaces the stored list with the names of a catalog query.
///
/// An empty catalog leaves the stored list untouched.
///
/// # Errors
///
/// Propagates store failures.
pub fn refresh_from_catalog<S: AllowListStore + ?Sized>(
    store: &S,
    entries: &[CatalogEntry],
) -> EngineResult<AllowList> {
    if entries.is_empty() {
        tracing::warn!("catalog was empty, allow-list left unchanged");
        return store.load();
    }
    let list: AllowList = entries.iter().map(|e| e.name.clone()).collect();
    store.save(&list)?;
    tracing::info!(names = list.len(), "allow-list refreshed from catalog");
    Ok(list)
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Allow-list kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryAllowList {
    list: Mutex<AllowList>,
}

impl MemoryAllowList {
    /// Creates a store holding `list`.
    #[must_use]
    pub fn new(list: AllowList) -> Self {
        Self {
            list: Mutex::new(list),
        }
    }
}

impl AllowListStore for MemoryAllowList {
    fn load(&self) -> EngineResult<AllowList> {
        Ok(self.list.lock().clone())
    }

    fn save(&self, list: &AllowList) -> EngineResult<()> {
        *self.list.lock() = list.clone();
        Ok(())
    }
}

// =============================================================================
// TOML FILE STORE
// =============================================================================

#[derive(Serialize, Deserialize)]
struct AllowListFile {
    #[serde(default)]
    names: Vec<String>,
}

/// Allow-list persisted as a TOML file.
#[derive(Debug)]
pub struct TomlAllowList {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TomlAllowList {
    /// Creates a store backed by `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl AllowListStore for TomlAllowList {
    fn load(&self) -> EngineResult<AllowList> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AllowList::defaults()),
            Err(e) => {
                return Err(EngineError::Store(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let file: AllowListFile = toml::from_str(&text).map_err(|e| {
            EngineError::Store(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        Ok(file.names.into_iter().collect())
    }

    fn save(&self, list: &AllowList) -> EngineResult<()> {
        let _guard = self.write_lock.lock();
        let file = AllowListFile {
            names: list.names().map(str::to_string).collect(),
        };
        let text = toml::to_string_pretty(&file)
            .map_err(|e| EngineError::Store(format!("failed to serialize allow-list: {e}")))?;

        let io_err = |e: std::io::Error| {
            EngineError::Store(format!("failed to write {}: {e}", self.path.display()))
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let temp = self.temp_path();
        {
            let mut out = fs::File::create(&temp).map_err(io_err)?;
            out.write_all(text.as_bytes()).map_err(io_err)?;
            out.sync_all().map_err(io_err)?;
        }
        fs::rename(&temp, &self.path).map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), names = list.len(), "allow-list saved");
        Ok(())
    }
}
