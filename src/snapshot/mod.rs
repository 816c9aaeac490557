//! Snapshot files produced by the interpreter's graphics device.
//!
//! The interpreter writes every rendering into a traced directory; this
//! module parses those files, reduces duplicate versions and garbage-collects
//! stale ones.
//!
//! # Directory Structure
//!
//! ```text
//! <traced>/
//! ├── snapshot_normal_0_0.png    # plot slot 0, first render
//! ├── snapshot_normal_0_1.png    # slot 0 redrawn after a rescale (wins)
//! ├── snapshot_sketch_1_0.png    # preview, deleted on every scan
//! └── snapshot_zoomed_0_0.png    # zoomed view pinned to its first render
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rplot::snapshot::{scan_directory, SnapshotsUpdate};
//!
//! let outcome = scan_directory(traced_dir, &SnapshotsUpdate::empty())?;
//! if outcome.changed {
//!     for snapshot in &outcome.update.normal {
//!         println!("#{} -> {}", snapshot.number(), snapshot.file.display());
//!     }
//! }
//! ```

mod scanner;
mod schema;
mod store;

pub use scanner::{scan, scan_directory, ScanOutcome};
pub use schema::{Snapshot, SnapshotIdentity, SnapshotType, SnapshotsUpdate, SNAPSHOT_EXTENSION};
pub use store::{DirectoryStore, MemoryStore, SnapshotStore};
