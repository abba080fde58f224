//! Metadata records and record identity.
//!
//! One [`Metadata`] record exists per tracked filesystem object. The record
//! captures the reconciliation state between the two sides: what the object
//! looks like, how many times each side has acknowledged that state, and
//! which remote document it corresponds to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the two replicas being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideName {
    /// The local filesystem.
    Local,
    /// The remote document store.
    Remote,
}

impl SideName {
    /// Returns the lowercase side name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SideName::Local => "local",
            SideName::Remote => "remote",
        }
    }
}

impl fmt::Display for SideName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of filesystem object a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocType {
    /// A regular file.
    File,
    /// A directory.
    Folder,
}

/// Stat information attached to a watcher event.
///
/// The inode number is the correlation key linking an unlink at one path to
/// an add at another; it is a hint, not an ownership relation, since inode
/// reuse across unrelated objects is possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Platform inode / file-index number.
    pub ino: u64,
    /// Byte length, when known.
    pub size: Option<u64>,
    /// Modification time in epoch milliseconds, when known.
    pub mtime: Option<u64>,
}

impl Stats {
    /// Creates stats carrying only an inode number.
    #[must_use]
    pub const fn with_ino(ino: u64) -> Self {
        Self {
            ino,
            size: None,
            mtime: None,
        }
    }
}

/// Reference to the corresponding document in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    /// Remote document id.
    pub id: String,
    /// Remote document revision.
    pub rev: String,
}

/// Per-side revision counters.
///
/// Each counter tracks how many times that side has acknowledged the
/// record's current state. A record is *converged* once both counters are
/// equal; deletions may only propagate past convergence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sides {
    /// Local acknowledgement counter.
    pub local: u64,
    /// Remote acknowledgement counter.
    pub remote: u64,
}

impl Sides {
    /// Creates counters with the given values.
    #[must_use]
    pub const fn new(local: u64, remote: u64) -> Self {
        Self { local, remote }
    }

    /// Returns true when no side has ever acknowledged the record.
    #[must_use]
    pub const fn is_missing(self) -> bool {
        self.local == 0 && self.remote == 0
    }

    /// Returns true when both sides agree on the record's current state.
    #[must_use]
    pub const fn is_converged(self) -> bool {
        self.local == self.remote
    }

    /// Bumps the counter of the given side.
    pub fn increment(&mut self, side: SideName) {
        match side {
            SideName::Local => self.local += 1,
            SideName::Remote => self.remote += 1,
        }
    }
}

/// Stable identifier derived from a record's normalized path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalizes a relative path to `/` separators with no trailing separator.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified.trim_end_matches('/').to_string()
}

/// Derives the stable record identifier for a path.
///
/// Identity is case-insensitive: `foo` and `FOO` resolve to the same
/// record, which is what makes an unlink+add pair on a case-folding rename
/// indistinguishable from a plain addition.
#[must_use]
pub fn record_id(path: &str) -> RecordId {
    RecordId(normalize_path(path).to_uppercase())
}

/// Reconciliation state of one tracked filesystem object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Current relative path, normalized.
    pub path: String,
    /// File or folder.
    pub doc_type: DocType,
    /// Inode number; absent for remote-only records.
    pub ino: Option<u64>,
    /// Content checksum, present for files with known content.
    pub md5sum: Option<String>,
    /// Byte length, for files.
    pub size: Option<u64>,
    /// User tags.
    pub tags: BTreeSet<String>,
    /// Per-side acknowledgement counters.
    pub sides: Sides,
    /// Reference to the remote document, if ever synced remotely.
    pub remote: Option<RemoteRef>,
    /// Last-modification timestamp in epoch milliseconds.
    pub updated_at: u64,
    /// Retry counter, bumped when a sync attempt for this record fails.
    pub errors: u32,
    /// Tombstone flag.
    pub deleted: bool,
    /// Store revision, for optimistic concurrency. Zero until first stored.
    pub rev: u64,
}

impl Metadata {
    /// Creates a fresh record for a path.
    #[must_use]
    pub fn new(path: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            path: normalize_path(&path.into()),
            doc_type,
            ino: None,
            md5sum: None,
            size: None,
            tags: BTreeSet::new(),
            sides: Sides::default(),
            remote: None,
            updated_at: 0,
            errors: 0,
            deleted: false,
            rev: 0,
        }
    }

    /// Returns the record's stable identifier.
    #[must_use]
    pub fn id(&self) -> RecordId {
        record_id(&self.path)
    }

    /// Returns true for file records.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.doc_type == DocType::File
    }

    /// Returns true when this record's state may replace `other`'s.
    ///
    /// On conflicting updates the later timestamp always wins, never the
    /// one asserted first.
    #[must_use]
    pub fn wins_over(&self, other: &Metadata) -> bool {
        self.updated_at >= other.updated_at
    }

    /// Returns true once the record may be hard-removed: both sides have
    /// converged on the same revision, or it was never synced to one side.
    #[must_use]
    pub fn is_removable(&self) -> bool {
        self.sides.is_converged() || self.sides.local == 0 || self.sides.remote == 0
    }
}
