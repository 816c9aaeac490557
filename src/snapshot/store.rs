//! File-listing abstraction over the traced directory.
//!
//! The scanner never touches `std::fs` directly, so tests can feed it
//! synthetic listings through [`MemoryStore`].

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// Source of snapshot files.
///
/// Only the interpreter creates files; the engine only lists and deletes.
pub trait SnapshotStore: Send + Sync {
    /// Directory this store represents (for logging and init properties).
    fn location(&self) -> &Path;

    /// List all regular files in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing itself fails. Per-entry problems are
    /// skipped by implementations.
    fn list(&self) -> io::Result<Vec<PathBuf>>;

    /// Delete one file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be removed.
    fn delete(&self, path: &Path) -> io::Result<()>;
}

/// Store backed by a real directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    directory: PathBuf,
}

impl DirectoryStore {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl SnapshotStore for DirectoryStore {
    fn location(&self) -> &Path {
        &self.directory
    }

    fn list(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            // Entries can vanish between readdir and stat while the producer writes.
            let Ok(entry) = entry else { continue };
            match entry.file_type() {
                Ok(kind) if kind.is_file() => files.push(entry.path()),
                _ => trace!(path = %entry.path().display(), "Skipping non-file entry"),
            }
        }
        Ok(files)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug)]
pub struct MemoryStore {
    root: PathBuf,
    files: Mutex<BTreeSet<PathBuf>>,
    locked: Mutex<HashSet<PathBuf>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Mutex::new(BTreeSet::new()),
            locked: Mutex::new(HashSet::new()),
        }
    }

    /// Create a store pre-populated with file names relative to `root`.
    #[must_use]
    pub fn with_files<I, S>(root: impl Into<PathBuf>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new(root);
        for name in names {
            store.add(name.as_ref());
        }
        store
    }

    /// Add a file by name and return its full path.
    pub fn add(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone());
        path
    }

    /// Make every delete of `name` fail until [`MemoryStore::unlock`].
    pub fn lock_file(&self, name: &str) {
        self.locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(self.root.join(name));
    }

    pub fn unlock(&self, name: &str) {
        self.locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.root.join(name));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&self.root.join(name))
    }

    /// File names currently present, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(String::from))
            .collect()
    }
}

impl SnapshotStore for MemoryStore {
    fn location(&self) -> &Path {
        &self.root
    }

    fn list(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        if self
            .locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
        {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file is locked"));
        }
        let removed = self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        if removed {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }
}
