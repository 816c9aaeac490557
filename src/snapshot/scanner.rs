//! Directory scanning and duplicate reduction for snapshot files.
//!
//! Lists a [`SnapshotStore`], parses file names into snapshots, keeps one
//! winner per `(type, number)` and deletes everything else.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, trace};

use super::schema::{Snapshot, SnapshotType, SnapshotsUpdate, SNAPSHOT_EXTENSION};
use super::store::{DirectoryStore, SnapshotStore};
use crate::error::{GraphicsError, Result};

/// Result of scanning a traced directory.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Winners for this scan.
    pub update: SnapshotsUpdate,
    /// True if the identity list differs from the previous update.
    pub changed: bool,
    /// Files removed by this scan (sketches and losing versions).
    pub deleted: usize,
    /// Files skipped because their names don't follow the grammar.
    pub ignored: usize,
}

/// Which version of a group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Winner {
    /// Highest version. A newer render of the same slot replaces older ones.
    Latest,
    /// Lowest version. A zoomed view stays pinned to the render it was opened on.
    Earliest,
}

/// Scan a store and reduce it to the current snapshot set.
///
/// # Arguments
///
/// * `store` - The traced directory (or a synthetic listing).
/// * `previous` - The last published update, for change detection.
///
/// # Returns
///
/// A `ScanOutcome` whose `update` holds:
/// - `normal`: the highest version per plot number, ascending by number.
/// - `zoomed`: the lowest version per plot number, ascending by number.
///
/// Sketch files are always deleted. Deletion failures are ignored; the next
/// scan will try again.
///
/// # Errors
///
/// Returns [`GraphicsError::Scan`] if the store cannot be listed.
#[instrument(skip_all, fields(dir = %store.location().display()))]
pub fn scan(store: &dyn SnapshotStore, previous: &SnapshotsUpdate) -> Result<ScanOutcome> {
    trace!("Starting snapshot scan");

    let mut files: Vec<PathBuf> = store
        .list()
        .map_err(|source| GraphicsError::Scan {
            path: store.location().to_path_buf(),
            source,
        })?
        .into_iter()
        .filter(|path| has_snapshot_extension(path))
        .collect();

    // Sorted so that ties resolve the same way on every scan
    files.sort();

    let mut normal = Vec::new();
    let mut zoomed = Vec::new();
    let mut sketches = Vec::new();
    let mut ignored = 0;

    for path in files {
        match Snapshot::from_path(&path) {
            Some(snapshot) => match snapshot.kind {
                SnapshotType::Normal => normal.push(snapshot),
                SnapshotType::Zoomed => zoomed.push(snapshot),
                SnapshotType::Sketch => sketches.push(snapshot),
                SnapshotType::Export => ignored += 1,
            },
            None => {
                trace!(path = %path.display(), "File doesn't match snapshot pattern");
                ignored += 1;
            }
        }
    }

    let mut deleted = 0;
    for sketch in &sketches {
        if delete_quietly(store, &sketch.file) {
            deleted += 1;
        }
    }

    let (normal, removed) = reduce(store, normal, Winner::Latest);
    deleted += removed;
    let (zoomed, removed) = reduce(store, zoomed, Winner::Earliest);
    deleted += removed;

    let update = SnapshotsUpdate::new(normal, zoomed);
    let changed = !update.same_identities(previous);

    if changed {
        info!(
            normal = %update.normal.len(),
            zoomed = %update.zoomed.len(),
            deleted = %deleted,
            "Snapshot set changed"
        );
    } else {
        debug!(deleted = %deleted, ignored = %ignored, "Snapshot set unchanged");
    }

    Ok(ScanOutcome {
        update,
        changed,
        deleted,
        ignored,
    })
}

/// Scan a real directory.
///
/// # Errors
///
/// Returns [`GraphicsError::Scan`] if the directory cannot be listed.
pub fn scan_directory(directory: &Path, previous: &SnapshotsUpdate) -> Result<ScanOutcome> {
    scan(&DirectoryStore::new(directory), previous)
}

/// Keep one snapshot per number, delete the rest.
///
/// Returns the winners ascending by number and the count of deleted files.
fn reduce(
    store: &dyn SnapshotStore,
    snapshots: Vec<Snapshot>,
    winner: Winner,
) -> (Vec<Snapshot>, usize) {
    let mut groups: BTreeMap<u32, Vec<Snapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        groups.entry(snapshot.number()).or_default().push(snapshot);
    }

    let mut winners = Vec::with_capacity(groups.len());
    let mut deleted = 0;

    for (number, mut group) in groups {
        group.sort_by(|a, b| {
            a.version()
                .cmp(&b.version())
                .then_with(|| a.file.cmp(&b.file))
        });
        let keep = match winner {
            Winner::Latest => group.len() - 1,
            Winner::Earliest => 0,
        };
        for (index, snapshot) in group.iter().enumerate() {
            if index != keep && delete_quietly(store, &snapshot.file) {
                deleted += 1;
            }
        }
        trace!(number = %number, versions = %group.len(), ?winner, "Reduced snapshot group");
        winners.push(group.swap_remove(keep));
    }

    (winners, deleted)
}

fn delete_quietly(store: &dyn SnapshotStore, path: &Path) -> bool {
    match store.delete(path) {
        Ok(()) => {
            trace!(path = %path.display(), "Deleted snapshot file");
            true
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Snapshot cleanup failed, will retry on next scan");
            false
        }
    }
}

fn has_snapshot_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == SNAPSHOT_EXTENSION)
}
