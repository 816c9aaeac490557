//! Snapshot value types and the on-disk naming convention.
//!
//! The interpreter writes one PNG per rendering of a plot into the traced
//! directory. The file name carries everything the engine knows about it:
//!
//! ```text
//! snapshot_<type>_<number>_<version>.png
//!          │      │        └── redraw counter for this plot slot
//!          │      └─────────── logical plot slot (one per plot() call)
//!          └────────────────── normal | sketch | zoomed
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extension of every file the producer writes.
pub const SNAPSHOT_EXTENSION: &str = "png";

const SNAPSHOT_PREFIX: &str = "snapshot";

/// Kind of rendering a snapshot file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotType {
    /// Regular plot rendering shown in the plots view.
    Normal,
    /// Low-fidelity preview. Always transient.
    Sketch,
    /// Magnified render of the same logical plot.
    Zoomed,
    /// Reserved for exports. Has no file-name suffix.
    Export,
}

impl SnapshotType {
    /// Returns the file-name suffix for this type, if it has one.
    #[must_use]
    pub const fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Normal => Some("normal"),
            Self::Sketch => Some("sketch"),
            Self::Zoomed => Some("zoomed"),
            Self::Export => None,
        }
    }

    /// Parse a file-name suffix back into a type.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "normal" => Some(Self::Normal),
            "sketch" => Some(Self::Sketch),
            "zoomed" => Some(Self::Zoomed),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix().unwrap_or("export"))
    }
}

/// Logical plot slot plus redraw counter.
///
/// Ordered by `(number, version)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotIdentity {
    /// Plot slot, one per `plot()`/`ggplot()` call in sequence.
    pub number: u32,
    /// Incremented every time the same slot is redrawn.
    pub version: u32,
}

impl SnapshotIdentity {
    #[must_use]
    pub const fn new(number: u32, version: u32) -> Self {
        Self { number, version }
    }
}

/// One rendered plot image in the traced directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Backing file, owned by the traced directory.
    pub file: PathBuf,
    /// Rendering kind.
    #[serde(rename = "type")]
    pub kind: SnapshotType,
    /// Slot and version.
    pub identity: SnapshotIdentity,
}

impl Snapshot {
    /// Parse a snapshot from a file path.
    ///
    /// Returns `None` for anything that doesn't follow the naming grammar.
    /// Leftover temp files are routine, so this never errors.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (kind, identity) = parse_file_name(name)?;
        Some(Self {
            file: path.to_path_buf(),
            kind,
            identity,
        })
    }

    /// Build the canonical file name for a snapshot.
    ///
    /// `Export` has no suffix and yields `None`.
    #[must_use]
    pub fn file_name(kind: SnapshotType, identity: SnapshotIdentity) -> Option<String> {
        let suffix = kind.suffix()?;
        Some(format!(
            "{SNAPSHOT_PREFIX}_{suffix}_{}_{}.{SNAPSHOT_EXTENSION}",
            identity.number, identity.version
        ))
    }

    #[must_use]
    pub const fn number(&self) -> u32 {
        self.identity.number
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.identity.version
    }
}

/// Parse `snapshot_<type>_<number>_<version>.png`.
fn parse_file_name(name: &str) -> Option<(SnapshotType, SnapshotIdentity)> {
    let stem = name.strip_suffix(SNAPSHOT_EXTENSION)?.strip_suffix('.')?;
    let mut parts = stem.split('_');
    if parts.next()? != SNAPSHOT_PREFIX {
        return None;
    }
    let kind = SnapshotType::from_suffix(parts.next()?)?;
    let number = parse_counter(parts.next()?)?;
    let version = parse_counter(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((kind, SnapshotIdentity::new(number, version)))
}

/// Non-negative decimal without sign or padding rules.
fn parse_counter(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// The observable plot set of a device at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotsUpdate {
    /// Winning normal renders, ascending by number.
    pub normal: Vec<Snapshot>,
    /// Winning zoomed renders, ascending by number.
    pub zoomed: Vec<Snapshot>,
}

impl SnapshotsUpdate {
    /// The canonical initial/reset state.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(normal: Vec<Snapshot>, zoomed: Vec<Snapshot>) -> Self {
        Self { normal, zoomed }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.zoomed.is_empty()
    }

    /// Ordered `(type, identity)` list used for change detection.
    #[must_use]
    pub fn identities(&self) -> Vec<(SnapshotType, SnapshotIdentity)> {
        self.normal
            .iter()
            .chain(&self.zoomed)
            .map(|s| (s.kind, s.identity))
            .collect()
    }

    /// True if both updates describe the same identities in the same order.
    #[must_use]
    pub fn same_identities(&self, other: &Self) -> bool {
        self.identities() == other.identities()
    }

    /// Backing files of normal snapshots, ascending by number.
    #[must_use]
    pub fn normal_files(&self) -> Vec<PathBuf> {
        self.normal.iter().map(|s| s.file.clone()).collect()
    }

    /// Every backing file in this update.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.normal
            .iter()
            .chain(&self.zoomed)
            .map(|s| s.file.clone())
            .collect()
    }

    /// Find the normal snapshot for a plot slot.
    #[must_use]
    pub fn find(&self, number: u32) -> Option<&Snapshot> {
        self.normal.iter().find(|s| s.number() == number)
    }

    /// Highest normal plot slot, if any.
    #[must_use]
    pub fn last_number(&self) -> Option<u32> {
        self.normal.last().map(Snapshot::number)
    }
}
