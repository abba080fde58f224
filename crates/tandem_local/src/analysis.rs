//! Batch analysis of watcher events.
//!
//! Correlation is driven by inodes: an unlink at one path and an add at
//! another claiming the same inode are one move. A batch is processed
//! event by event into a set of working slots, one per distinct object;
//! later events for the same inode refine or override the slot (last
//! writer wins). Once the batch is exhausted, moves implied by a parent
//! directory move are squashed, the result is ordered, and everything
//! still provisional goes back to the caller's pending queue.

use crate::event::{EventKind, RawEvent};
use crate::pending::PendingChanges;
use std::collections::HashMap;
use tandem_model::{
    normalize_path, record_id, sort, Change, DocType, Metadata, SideName, Stats, TrailingUpdate,
};

const SIDE: SideName = SideName::Local;

/// Analyzes one batch of raw events.
///
/// `pending` carries not-yet-finalized changes between invocations; it is
/// drained at the start and refilled with whatever is still provisional
/// when the batch ends. The function is pure given its inputs: it never
/// reads the store, and the `old` records on events come from the
/// caller's enrichment step.
pub fn analyze(events: &[RawEvent], pending: &mut PendingChanges) -> Vec<Change> {
    let mut batch = Batch::seeded_from(pending.drain());

    for event in events {
        batch.process(event);
    }

    let mut changes = batch.into_changes();
    squash_child_moves(&mut changes);
    sort::sort(&mut changes);

    let mut finalized = Vec::with_capacity(changes.len());
    for change in changes {
        if change.is_pending() {
            tracing::debug!(kind = change.kind(), path = change.path(), "kept pending");
            pending.push(change);
        } else {
            finalized.push(change);
        }
    }
    finalized
}

/// Working state for one batch.
struct Batch {
    /// One slot per distinct object; `None` marks a dropped slot.
    slots: Vec<Option<Change>>,
    /// Inode -> slot index.
    by_ino: HashMap<u64, usize>,
    /// Record id -> slot index; later claims overwrite earlier ones.
    by_path: HashMap<String, usize>,
}

impl Batch {
    fn seeded_from(carried: Vec<Change>) -> Self {
        let mut batch = Self {
            slots: Vec::new(),
            by_ino: HashMap::new(),
            by_path: HashMap::new(),
        };
        for change in carried {
            batch.insert(change);
        }
        batch
    }

    fn process(&mut self, event: &RawEvent) {
        match event.kind {
            EventKind::Add => self.on_add(event, DocType::File),
            EventKind::AddDir => self.on_add(event, DocType::Folder),
            EventKind::Change => self.on_change(event),
            EventKind::Unlink => self.on_unlink(event, DocType::File),
            EventKind::UnlinkDir => self.on_unlink(event, DocType::Folder),
        }
    }

    fn on_add(&mut self, event: &RawEvent, doc_type: DocType) {
        let Some(stats) = event.stats else {
            tracing::warn!(path = %event.path, "add event without stats dropped");
            return;
        };
        let ino = stats.ino;

        let Some(slot) = self.slot_by_ino(ino) else {
            // No in-batch claim on this inode. An inline `old` at another
            // path is the only evidence left: the rename happened while
            // the watcher was not running.
            if let Some(old) = &event.old {
                if old.path != normalize_path(&event.path) {
                    tracing::debug!(from = %old.path, to = %event.path, "offline move detected");
                    self.insert(make_move(doc_type, event, stats, old.clone(), None));
                    return;
                }
            }
            self.insert(make_addition(doc_type, event, stats, event.old.clone()));
            return;
        };

        let existing = self.take(slot);
        let replacement = match existing {
            Change::FileDeletion { old, .. } | Change::DirDeletion { old, .. } => {
                if record_id(&old.path) == record_id(&event.path) {
                    // Identical-path loopback rename: there is no distinct
                    // source document to build a move from.
                    tracing::debug!(path = %event.path, "loopback rename treated as addition");
                    make_addition(doc_type, event, stats, event.old.clone().or(Some(old)))
                } else {
                    tracing::debug!(from = %old.path, to = %event.path, "unlink+add correlated into move");
                    make_move(doc_type, event, stats, old, None)
                }
            }
            Change::FileMove { old, update, .. } => {
                // The move's target changed again; the latest add wins.
                make_move(doc_type, event, stats, old, update)
            }
            Change::DirMove { old, .. } => make_move(doc_type, event, stats, old, None),
            Change::FileAddition {
                path: prior_path,
                old: prior_old,
                ..
            }
            | Change::DirAddition {
                path: prior_path,
                old: prior_old,
                ..
            } => self.add_over_add(event, doc_type, stats, prior_path, prior_old),
            Change::FileUpdate { .. } | Change::Ignored { .. } => {
                // Unrelated earlier claim on this inode; the add wins.
                make_addition(doc_type, event, stats, event.old.clone())
            }
        };
        self.put(slot, replacement);
    }

    /// A second add claiming an inode already claimed by an addition.
    fn add_over_add(
        &self,
        event: &RawEvent,
        doc_type: DocType,
        stats: Stats,
        prior_path: String,
        prior_old: Option<Metadata>,
    ) -> Change {
        if prior_path == normalize_path(&event.path) {
            // Same path reported twice: collapse, most recent stats win.
            make_addition(doc_type, event, stats, event.old.clone().or(prior_old))
        } else if let Some(old) = prior_old {
            // The earlier addition knew its document, so the second add is
            // a rename of it (case-only renames included).
            tracing::debug!(from = %old.path, to = %event.path, "add+add correlated into move");
            make_move(doc_type, event, stats, old, None)
        } else {
            // A write-in-progress addition alone is not evidence of
            // identity; the later add simply overrides it.
            tracing::debug!(dropped = %prior_path, "wip addition overridden by later add");
            make_addition(doc_type, event, stats, event.old.clone())
        }
    }

    fn on_change(&mut self, event: &RawEvent) {
        let Some(stats) = event.stats else {
            tracing::warn!(path = %event.path, "change event without stats dropped");
            return;
        };
        let ino = stats.ino;

        let Some(slot) = self.slot_by_ino(ino) else {
            self.insert(make_update(event, stats));
            return;
        };

        let existing = self.take(slot);
        let existing_doc_type = existing.doc_type();
        match existing {
            Change::FileMove {
                side,
                path,
                ino,
                stats: move_stats,
                md5sum,
                old,
                wip,
                ..
            } => {
                // A content change right after the move: report both
                // together, update replayed after the move itself.
                tracing::debug!(path = %path, "trailing update attached to move");
                let update = TrailingUpdate {
                    path: path.clone(),
                    stats,
                    md5sum: event.md5sum.clone(),
                };
                self.put(
                    slot,
                    Change::FileMove {
                        side,
                        path,
                        ino,
                        stats: move_stats,
                        md5sum,
                        old,
                        wip,
                        update: Some(update),
                    },
                );
            }
            Change::FileAddition {
                path: prior_path,
                old: prior_old,
                ..
            }
            | Change::DirAddition {
                path: prior_path,
                old: prior_old,
                ..
            } => {
                if record_id(&prior_path) == record_id(&event.path) {
                    // The freshly added object settled with new content.
                    let mut folded = make_addition(existing_doc_type, event, stats, prior_old);
                    if let Change::FileAddition { path, .. } | Change::DirAddition { path, .. } =
                        &mut folded
                    {
                        *path = prior_path;
                    }
                    self.put(slot, folded);
                } else {
                    // Inode collision with an unrelated provisional
                    // addition: drop it, the change stands alone.
                    tracing::debug!(dropped = %prior_path, "wip addition overridden by change");
                    self.put(slot, make_update(event, stats));
                }
            }
            mv @ Change::DirMove { .. } => {
                // A file change cannot refine a directory move; keep the
                // move and report the update separately.
                self.put(slot, mv);
                self.insert_unindexed(make_update(event, stats));
            }
            Change::FileUpdate { old: prior_old, .. } => {
                let mut update = make_update(event, stats);
                if let Change::FileUpdate { old, .. } = &mut update {
                    if old.is_none() {
                        *old = prior_old;
                    }
                }
                self.put(slot, update);
            }
            Change::FileDeletion { .. } | Change::DirDeletion { .. } | Change::Ignored { .. } => {
                // Ambiguous inode claim; the most recent event wins.
                self.put(slot, make_update(event, stats));
            }
        }
    }

    fn on_unlink(&mut self, event: &RawEvent, doc_type: DocType) {
        if let Some(old) = event.old.clone() {
            let old_ino = old.ino;
            if let Some(slot) = old_ino.and_then(|ino| self.slot_by_ino(ino)) {
                let existing = self.take(slot);
                let replacement = match existing {
                    Change::FileAddition {
                        path,
                        ino,
                        stats,
                        md5sum,
                        wip,
                        ..
                    } => {
                        // The add we saw earlier was the destination of a
                        // rename whose unlink arrived late.
                        tracing::debug!(from = %old.path, to = %path, "add+unlink correlated into move");
                        Change::FileMove {
                            side: SIDE,
                            path,
                            ino,
                            stats,
                            md5sum,
                            old,
                            wip,
                            update: None,
                        }
                    }
                    Change::DirAddition {
                        path,
                        ino,
                        stats,
                        wip,
                        ..
                    } => Change::DirMove {
                        side: SIDE,
                        path,
                        ino,
                        stats,
                        old,
                        wip,
                    },
                    Change::FileUpdate { .. } => make_deletion(doc_type, &event.path, old),
                    other => {
                        // Moves already consumed their unlink; duplicate
                        // deletions bring nothing new.
                        tracing::debug!(path = %event.path, "redundant unlink dropped");
                        other
                    }
                };
                self.put(slot, replacement);
            } else {
                // Deletion candidate: held in the batch, since a later add
                // claiming the same inode turns it into a move.
                self.insert(make_deletion(doc_type, &event.path, old));
            }
            return;
        }

        // No prior record: the only way to make sense of this unlink is an
        // in-flight change already targeting the same path.
        let Some(slot) = self.slot_by_path(&event.path) else {
            tracing::debug!(path = %event.path, "unlink of unknown document dropped");
            return;
        };

        let existing = self.take(slot);
        let replacement = match existing {
            Change::FileMove { old, ino, .. } => {
                // The move target is gone: the whole sequence collapses to
                // a deletion of the original path.
                let source = old.path.clone();
                Some(make_deletion_with_ino(DocType::File, &source, old, Some(ino)))
            }
            Change::DirMove { old, ino, .. } => {
                let source = old.path.clone();
                Some(make_deletion_with_ino(DocType::Folder, &source, old, Some(ino)))
            }
            Change::FileAddition {
                path,
                ino,
                stats,
                old: None,
                ..
            }
            | Change::DirAddition {
                path,
                ino,
                stats,
                old: None,
                ..
            } => {
                // Added then deleted within the batch: a temporary file.
                tracing::debug!(path = %path, "temporary object ignored");
                Some(Change::Ignored {
                    side: SIDE,
                    path,
                    ino,
                    stats,
                })
            }
            Change::FileAddition { old: Some(old), .. }
            | Change::DirAddition { old: Some(old), .. } => {
                Some(make_deletion(doc_type, &event.path, old))
            }
            Change::FileUpdate {
                path,
                ino,
                stats,
                old,
                ..
            } => Some(match old {
                Some(old) => make_deletion(doc_type, &event.path, old),
                None => Change::Ignored {
                    side: SIDE,
                    path,
                    ino,
                    stats,
                },
            }),
            other => {
                tracing::debug!(path = %event.path, "redundant unlink dropped");
                Some(other)
            }
        };
        if let Some(change) = replacement {
            self.put(slot, change);
        }
    }

    fn slot_by_ino(&self, ino: u64) -> Option<usize> {
        self.by_ino
            .get(&ino)
            .copied()
            .filter(|&i| self.slots[i].is_some())
    }

    fn slot_by_path(&self, path: &str) -> Option<usize> {
        self.by_path
            .get(record_id(path).as_str())
            .copied()
            .filter(|&i| self.slots[i].is_some())
    }

    fn insert(&mut self, change: Change) {
        let slot = self.slots.len();
        self.slots.push(None);
        self.put(slot, change);
    }

    /// Inserts a change without claiming its inode, for the rare case
    /// where the inode is kept by a structural change in another slot.
    fn insert_unindexed(&mut self, change: Change) {
        let slot = self.slots.len();
        self.by_path
            .insert(record_id(change.path()).as_str().to_string(), slot);
        self.slots.push(Some(change));
    }

    fn take(&mut self, slot: usize) -> Change {
        let change = self.slots[slot]
            .take()
            .unwrap_or_else(|| unreachable!("taking an empty slot"));
        if let Some(ino) = change.ino() {
            if self.by_ino.get(&ino) == Some(&slot) {
                self.by_ino.remove(&ino);
            }
        }
        let path_key = record_id(change.path()).as_str().to_string();
        if self.by_path.get(&path_key) == Some(&slot) {
            self.by_path.remove(&path_key);
        }
        change
    }

    fn put(&mut self, slot: usize, change: Change) {
        if let Some(ino) = change.ino() {
            self.by_ino.insert(ino, slot);
        }
        self.by_path
            .insert(record_id(change.path()).as_str().to_string(), slot);
        self.slots[slot] = Some(change);
    }

    fn into_changes(self) -> Vec<Change> {
        self.slots.into_iter().flatten().collect()
    }
}

fn make_addition(
    doc_type: DocType,
    event: &RawEvent,
    stats: Stats,
    old: Option<Metadata>,
) -> Change {
    let path = normalize_path(&event.path);
    match doc_type {
        DocType::File => Change::FileAddition {
            side: SIDE,
            path,
            ino: stats.ino,
            stats,
            md5sum: event.md5sum.clone(),
            old,
            wip: event.wip,
        },
        DocType::Folder => Change::DirAddition {
            side: SIDE,
            path,
            ino: stats.ino,
            stats,
            old,
            wip: event.wip,
        },
    }
}

fn make_move(
    doc_type: DocType,
    event: &RawEvent,
    stats: Stats,
    old: Metadata,
    update: Option<TrailingUpdate>,
) -> Change {
    let path = normalize_path(&event.path);
    match doc_type {
        DocType::File => Change::FileMove {
            side: SIDE,
            path,
            ino: stats.ino,
            stats,
            md5sum: event.md5sum.clone(),
            old,
            wip: event.wip,
            update,
        },
        DocType::Folder => Change::DirMove {
            side: SIDE,
            path,
            ino: stats.ino,
            stats,
            old,
            wip: event.wip,
        },
    }
}

fn make_update(event: &RawEvent, stats: Stats) -> Change {
    Change::FileUpdate {
        side: SIDE,
        path: normalize_path(&event.path),
        ino: stats.ino,
        stats,
        md5sum: event.md5sum.clone(),
        old: event.old.clone(),
        wip: event.wip,
    }
}

fn make_deletion(doc_type: DocType, path: &str, old: Metadata) -> Change {
    let ino = old.ino;
    make_deletion_with_ino(doc_type, path, old, ino)
}

fn make_deletion_with_ino(
    doc_type: DocType,
    path: &str,
    old: Metadata,
    ino: Option<u64>,
) -> Change {
    let path = normalize_path(path);
    match doc_type {
        DocType::File => Change::FileDeletion {
            side: SIDE,
            path,
            ino,
            old,
        },
        DocType::Folder => Change::DirDeletion {
            side: SIDE,
            path,
            ino,
            old,
        },
    }
}

/// Drops moves that are implied by a parent directory move.
///
/// When a directory moves, the watcher also reports every descendant at
/// its new location. A child move whose destination is just its source
/// re-rooted under the parent's destination carries no information of its
/// own; replaying the parent covers it.
fn squash_child_moves(changes: &mut Vec<Change>) {
    let parents: Vec<(String, String)> = changes
        .iter()
        .filter_map(|change| match change {
            Change::DirMove { old, path, .. } => Some((
                record_id(&old.path).as_str().to_string(),
                record_id(path).as_str().to_string(),
            )),
            _ => None,
        })
        .collect();

    changes.retain(|change| {
        let (src, dest) = match change {
            Change::FileMove { old, path, .. } | Change::DirMove { old, path, .. } => {
                (record_id(&old.path), record_id(path))
            }
            _ => return true,
        };
        for (parent_src, parent_dest) in &parents {
            let Some(rest) = src.as_str().strip_prefix(parent_src.as_str()) else {
                continue;
            };
            if !rest.starts_with('/') {
                continue;
            }
            if dest.as_str() == format!("{parent_dest}{rest}") {
                tracing::debug!(path = %change.path(), "child move implied by parent move");
                return false;
            }
        }
        true
    });
}
