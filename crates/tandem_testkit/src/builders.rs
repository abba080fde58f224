//! Builders for metadata records and raw watcher events.

use tandem_local::{EventKind, RawEvent};
use tandem_model::{DocType, Metadata, RemoteRef, Sides, Stats};

/// Starts building a file record.
#[must_use]
pub fn metafile(path: &str) -> MetadataBuilder {
    MetadataBuilder::new(path, DocType::File)
}

/// Starts building a folder record.
#[must_use]
pub fn metadir(path: &str) -> MetadataBuilder {
    MetadataBuilder::new(path, DocType::Folder)
}

/// Builds [`Metadata`] records with test-friendly defaults: local-only
/// sides and, for files, a deterministic checksum derived from the path.
#[derive(Debug)]
pub struct MetadataBuilder {
    record: Metadata,
}

impl MetadataBuilder {
    fn new(path: &str, doc_type: DocType) -> Self {
        let mut record = Metadata::new(path, doc_type);
        record.sides = Sides::new(1, 0);
        if doc_type == DocType::File {
            record.md5sum = Some(default_checksum(path));
        }
        Self { record }
    }

    /// Sets the record path.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.record.path = tandem_model::normalize_path(path);
        if self.record.doc_type == DocType::File {
            self.record.md5sum = Some(default_checksum(path));
        }
        self
    }

    /// Sets the inode number.
    #[must_use]
    pub fn ino(mut self, ino: u64) -> Self {
        self.record.ino = Some(ino);
        self
    }

    /// Sets the content checksum.
    #[must_use]
    pub fn md5sum(mut self, md5sum: &str) -> Self {
        self.record.md5sum = Some(md5sum.to_string());
        self
    }

    /// Sets the file size.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.record.size = Some(size);
        self
    }

    /// Sets the side counters.
    #[must_use]
    pub fn sides(mut self, local: u64, remote: u64) -> Self {
        self.record.sides = Sides::new(local, remote);
        self
    }

    /// Attaches a generated remote reference and marks both sides
    /// acknowledged once.
    #[must_use]
    pub fn remote(mut self) -> Self {
        self.record.remote = Some(RemoteRef {
            id: uuid::Uuid::new_v4().simple().to_string(),
            rev: format!("1-{}", uuid::Uuid::new_v4().simple()),
        });
        self.record.sides = Sides::new(1, 1);
        self
    }

    /// Attaches a specific remote id.
    #[must_use]
    pub fn remote_id(mut self, id: &str) -> Self {
        self.record.remote = Some(RemoteRef {
            id: id.to_string(),
            rev: "1-seeded".to_string(),
        });
        self.record.sides = Sides::new(1, 1);
        self
    }

    /// Sets the last-modification timestamp.
    #[must_use]
    pub fn updated_at(mut self, updated_at: u64) -> Self {
        self.record.updated_at = updated_at;
        self
    }

    /// Marks the record deleted.
    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.record.deleted = true;
        self
    }

    /// Returns the built record.
    #[must_use]
    pub fn build(self) -> Metadata {
        self.record
    }
}

fn default_checksum(path: &str) -> String {
    // Deterministic placeholder, unique per path; not a real digest.
    let mut acc: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in path.bytes() {
        acc ^= u64::from(byte);
        acc = acc.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{acc:016x}{acc:016x}")
}

/// Builds [`RawEvent`]s.
#[derive(Debug)]
pub struct EventBuilder {
    event: RawEvent,
}

impl EventBuilder {
    /// Starts an `Add` event.
    #[must_use]
    pub fn add(path: &str) -> Self {
        Self {
            event: RawEvent::new(EventKind::Add, path),
        }
    }

    /// Starts an `AddDir` event.
    #[must_use]
    pub fn add_dir(path: &str) -> Self {
        Self {
            event: RawEvent::new(EventKind::AddDir, path),
        }
    }

    /// Starts a `Change` event.
    #[must_use]
    pub fn change(path: &str) -> Self {
        Self {
            event: RawEvent::new(EventKind::Change, path),
        }
    }

    /// Starts an `Unlink` event.
    #[must_use]
    pub fn unlink(path: &str) -> Self {
        Self {
            event: RawEvent::new(EventKind::Unlink, path),
        }
    }

    /// Starts an `UnlinkDir` event.
    #[must_use]
    pub fn unlink_dir(path: &str) -> Self {
        Self {
            event: RawEvent::new(EventKind::UnlinkDir, path),
        }
    }

    /// Attaches stats carrying only an inode.
    #[must_use]
    pub fn ino(mut self, ino: u64) -> Self {
        self.event.stats = Some(Stats::with_ino(ino));
        self
    }

    /// Attaches full stats.
    #[must_use]
    pub fn stats(mut self, stats: Stats) -> Self {
        self.event.stats = Some(stats);
        self
    }

    /// Attaches a checksum.
    #[must_use]
    pub fn md5sum(mut self, md5sum: &str) -> Self {
        self.event.md5sum = Some(md5sum.to_string());
        self
    }

    /// Attaches the prior metadata record.
    #[must_use]
    pub fn old(mut self, old: Metadata) -> Self {
        self.event.old = Some(old);
        self
    }

    /// Marks the event write-in-progress.
    #[must_use]
    pub fn wip(mut self) -> Self {
        self.event.wip = true;
        self
    }

    /// Returns the built event.
    #[must_use]
    pub fn build(self) -> RawEvent {
        self.event
    }
}
