//! Semantic changes.
//!
//! A [`Change`] is the analyzer's verdict about what actually happened to
//! one filesystem object, distilled from one or more raw watcher events.
//! Each variant carries only the fields that are meaningful for it; code
//! that consumes changes matches exhaustively instead of probing optional
//! fields on a flat record.

use crate::metadata::{DocType, Metadata, SideName, Stats};

/// A content change that arrived on the same inode while a move was still
/// settling. It is reported together with the move and must be replayed
/// after it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingUpdate {
    /// Path of the updated file, rewritten to the move destination.
    pub path: String,
    /// Stats of the update event.
    pub stats: Stats,
    /// Checksum after the update.
    pub md5sum: Option<String>,
}

/// A finalized (or pending) semantic change on one side.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A file appeared.
    FileAddition {
        /// Originating side.
        side: SideName,
        /// Path of the new file.
        path: String,
        /// Inode of the new file.
        ino: u64,
        /// Stats from the watcher event.
        stats: Stats,
        /// Content checksum, when known.
        md5sum: Option<String>,
        /// Prior record, when the addition shadows an existing document
        /// (identical-path rename loopback).
        old: Option<Metadata>,
        /// Whether the underlying write had not settled yet.
        wip: bool,
    },

    /// A file's content changed in place.
    FileUpdate {
        /// Originating side.
        side: SideName,
        /// Path of the updated file.
        path: String,
        /// Inode of the updated file.
        ino: u64,
        /// Stats from the watcher event.
        stats: Stats,
        /// Checksum after the update.
        md5sum: Option<String>,
        /// Prior record, when the enrichment step found one.
        old: Option<Metadata>,
        /// Whether the underlying write had not settled yet.
        wip: bool,
    },

    /// A file disappeared.
    FileDeletion {
        /// Originating side.
        side: SideName,
        /// Path of the deleted file.
        path: String,
        /// Inode, when the prior record knew it.
        ino: Option<u64>,
        /// The record being deleted.
        old: Metadata,
    },

    /// A file moved from `old.path` to `path`.
    FileMove {
        /// Originating side.
        side: SideName,
        /// Destination path.
        path: String,
        /// Inode linking the unlink and add events.
        ino: u64,
        /// Stats of the destination.
        stats: Stats,
        /// Checksum at the destination, when known.
        md5sum: Option<String>,
        /// The source-side record being moved.
        old: Metadata,
        /// Whether the move is still provisional.
        wip: bool,
        /// Content change to replay after the move, if one arrived while
        /// the move was settling.
        update: Option<TrailingUpdate>,
    },

    /// A directory appeared.
    DirAddition {
        /// Originating side.
        side: SideName,
        /// Path of the new directory.
        path: String,
        /// Inode of the new directory.
        ino: u64,
        /// Stats from the watcher event.
        stats: Stats,
        /// Prior record, when the addition shadows an existing document.
        old: Option<Metadata>,
        /// Whether the addition is still provisional.
        wip: bool,
    },

    /// A directory disappeared.
    DirDeletion {
        /// Originating side.
        side: SideName,
        /// Path of the deleted directory.
        path: String,
        /// Inode, when the prior record knew it.
        ino: Option<u64>,
        /// The record being deleted.
        old: Metadata,
    },

    /// A directory moved from `old.path` to `path`.
    DirMove {
        /// Originating side.
        side: SideName,
        /// Destination path.
        path: String,
        /// Inode linking the unlink and add events.
        ino: u64,
        /// Stats of the destination.
        stats: Stats,
        /// The source-side record being moved.
        old: Metadata,
        /// Whether the move is still provisional.
        wip: bool,
    },

    /// Events that cancelled out (e.g. a temporary file that was created
    /// and deleted within one batch).
    Ignored {
        /// Originating side.
        side: SideName,
        /// Path the events referred to.
        path: String,
        /// Inode the events referred to.
        ino: u64,
        /// Stats of the last event seen.
        stats: Stats,
    },
}

impl Change {
    /// Returns the side this change originated from.
    #[must_use]
    pub fn side(&self) -> SideName {
        match self {
            Change::FileAddition { side, .. }
            | Change::FileUpdate { side, .. }
            | Change::FileDeletion { side, .. }
            | Change::FileMove { side, .. }
            | Change::DirAddition { side, .. }
            | Change::DirDeletion { side, .. }
            | Change::DirMove { side, .. }
            | Change::Ignored { side, .. } => *side,
        }
    }

    /// Returns the change's target path (the destination, for moves).
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Change::FileAddition { path, .. }
            | Change::FileUpdate { path, .. }
            | Change::FileDeletion { path, .. }
            | Change::FileMove { path, .. }
            | Change::DirAddition { path, .. }
            | Change::DirDeletion { path, .. }
            | Change::DirMove { path, .. }
            | Change::Ignored { path, .. } => path,
        }
    }

    /// Returns the source path, for moves.
    #[must_use]
    pub fn source_path(&self) -> Option<&str> {
        match self {
            Change::FileMove { old, .. } | Change::DirMove { old, .. } => Some(&old.path),
            _ => None,
        }
    }

    /// Returns the inode this change refers to, when known.
    #[must_use]
    pub fn ino(&self) -> Option<u64> {
        match self {
            Change::FileAddition { ino, .. }
            | Change::FileUpdate { ino, .. }
            | Change::FileMove { ino, .. }
            | Change::DirAddition { ino, .. }
            | Change::DirMove { ino, .. }
            | Change::Ignored { ino, .. } => Some(*ino),
            Change::FileDeletion { ino, .. } | Change::DirDeletion { ino, .. } => *ino,
        }
    }

    /// Returns true for file and directory moves.
    #[must_use]
    pub fn is_move(&self) -> bool {
        matches!(self, Change::FileMove { .. } | Change::DirMove { .. })
    }

    /// Returns true for pure content updates.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self, Change::FileUpdate { .. })
    }

    /// Returns true for file and directory deletions.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        matches!(self, Change::FileDeletion { .. } | Change::DirDeletion { .. })
    }

    /// Returns true while the change is provisional and must stay in the
    /// pending queue instead of being emitted.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        match self {
            Change::FileAddition { wip, .. }
            | Change::FileUpdate { wip, .. }
            | Change::FileMove { wip, .. }
            | Change::DirAddition { wip, .. }
            | Change::DirMove { wip, .. } => *wip,
            Change::FileDeletion { .. } | Change::DirDeletion { .. } | Change::Ignored { .. } => {
                false
            }
        }
    }

    /// Returns the kind of object this change concerns.
    #[must_use]
    pub fn doc_type(&self) -> DocType {
        match self {
            Change::FileAddition { .. }
            | Change::FileUpdate { .. }
            | Change::FileDeletion { .. }
            | Change::FileMove { .. }
            | Change::Ignored { .. } => DocType::File,
            Change::DirAddition { .. } | Change::DirDeletion { .. } | Change::DirMove { .. } => {
                DocType::Folder
            }
        }
    }

    /// Returns a short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Change::FileAddition { .. } => "FileAddition",
            Change::FileUpdate { .. } => "FileUpdate",
            Change::FileDeletion { .. } => "FileDeletion",
            Change::FileMove { .. } => "FileMove",
            Change::DirAddition { .. } => "DirAddition",
            Change::DirDeletion { .. } => "DirDeletion",
            Change::DirMove { .. } => "DirMove",
            Change::Ignored { .. } => "Ignored",
        }
    }
}
