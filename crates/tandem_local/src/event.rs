//! Raw watcher events.

use tandem_model::{Metadata, Stats};

/// What the watcher reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A file appeared.
    Add,
    /// A directory appeared.
    AddDir,
    /// A file's content changed.
    Change,
    /// A file disappeared.
    Unlink,
    /// A directory disappeared.
    UnlinkDir,
}

/// One stat-enriched watcher event.
///
/// Events reach the analyzer already enriched by an upstream step: stats
/// carry the inode for add/change events, and `old` holds the prior
/// metadata record when the enrichment step found one. The analyzer
/// trusts this data as given.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Path the event refers to.
    pub path: String,
    /// Stat data, present on add/change events.
    pub stats: Option<Stats>,
    /// Content checksum, when the enrichment step computed one.
    pub md5sum: Option<String>,
    /// The prior metadata record, when one exists.
    pub old: Option<Metadata>,
    /// Write-in-progress: the underlying write had not settled when the
    /// event was observed, so it is provisional.
    pub wip: bool,
}

impl RawEvent {
    /// Creates a bare event of the given kind.
    #[must_use]
    pub fn new(kind: EventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            stats: None,
            md5sum: None,
            old: None,
            wip: false,
        }
    }

    /// Returns the inode this event refers to, from its stats or its
    /// prior record.
    #[must_use]
    pub fn ino(&self) -> Option<u64> {
        self.stats.map(|s| s.ino).or_else(|| self.old.as_ref().and_then(|o| o.ino))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ino_prefers_stats_over_old_record() {
        let mut event = RawEvent::new(EventKind::Add, "doc");
        assert_eq!(event.ino(), None);

        let mut old = Metadata::new("doc", tandem_model::DocType::File);
        old.ino = Some(9);
        event.old = Some(old);
        assert_eq!(event.ino(), Some(9));

        event.stats = Some(Stats::with_ino(4));
        assert_eq!(event.ino(), Some(4));
    }
}
