//! The sync engine.

use crate::applier::Applier;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use parking_lot::RwLock;
use std::sync::Arc;
use tandem_local::{analyze, PendingChanges, RawEvent};
use tandem_model::{
    record_id, sort, Change, DocType, Metadata, SideName, Stats, TrailingUpdate,
};
use tandem_store::{Store, StoreError};

/// Outcome of one processed batch.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Changes the analyzer finalized for this batch.
    pub analyzed: usize,
    /// Records written to the store.
    pub persisted: usize,
    /// Changes skipped because the stored state carried a later
    /// timestamp.
    pub skipped_stale: usize,
    /// Changes successfully handed to the applier.
    pub dispatched: usize,
    /// Per-change failures; the batch itself still completes.
    pub failures: Vec<ApplyFailure>,
}

/// One failed change within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    /// Path of the failing change.
    pub path: String,
    /// Failure description.
    pub message: String,
}

/// Counters across the engine's lifetime.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Batches processed, local and remote.
    pub batches_processed: u64,
    /// Changes handed to appliers.
    pub changes_dispatched: u64,
    /// Apply failures recorded.
    pub apply_failures: u64,
}

/// Persist outcome for one change.
enum Persist {
    Written,
    Stale,
    Noop,
}

/// Coordinates one sync direction pair over a shared store.
///
/// Local batches flow watcher events -> analyzer -> store -> remote-side
/// applier; remote batches arrive pre-analyzed and flow sorter -> local-
/// side applier. All read-decide-write spans against the store happen
/// under the store lock.
pub struct SyncEngine<A: Applier> {
    store: Arc<Store>,
    applier: Arc<A>,
    config: EngineConfig,
    stats: RwLock<EngineStats>,
}

impl<A: Applier> SyncEngine<A> {
    /// Creates an engine over a store and the opposite side's applier.
    pub fn new(store: Arc<Store>, applier: A, config: EngineConfig) -> Self {
        Self {
            store,
            applier: Arc::new(applier),
            config,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// Returns a snapshot of the engine counters.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Returns the applier this engine dispatches to.
    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Processes one batch of local watcher events.
    ///
    /// Analysis is pure; persistence happens under the store lock; the
    /// finalized changes are then dispatched, in order, to the remote
    /// side's applier. A change that fails to persist or apply is
    /// reported in the summary and does not abort the batch. There is no
    /// mid-batch cancellation: the batch always completes on the input
    /// it was given.
    pub fn process_local_batch(
        &self,
        events: &[RawEvent],
        pending: &mut PendingChanges,
    ) -> EngineResult<BatchSummary> {
        let changes = analyze(events, pending);
        tracing::debug!(
            events = events.len(),
            changes = changes.len(),
            pending = pending.len(),
            "local batch analyzed"
        );

        let mut summary = BatchSummary {
            analyzed: changes.len(),
            ..BatchSummary::default()
        };

        {
            let guard = self.store.lock(&self.config.lock_owner);
            for change in &changes {
                match self.persist_local(change) {
                    Ok(Persist::Written) => summary.persisted += 1,
                    Ok(Persist::Stale) => summary.skipped_stale += 1,
                    Ok(Persist::Noop) => {}
                    Err(err) => {
                        tracing::warn!(path = change.path(), error = %err, "persist failed");
                        summary.failures.push(ApplyFailure {
                            path: change.path().to_string(),
                            message: err.to_string(),
                        });
                    }
                }
            }
            guard.release();
        }

        self.dispatch(&changes, &mut summary)?;
        self.account(&summary);
        Ok(summary)
    }

    /// Dispatches a batch of remote changes to the local-side applier
    /// and advances the remote cursor.
    ///
    /// The changes arrive pre-analyzed from the remote feed; ordering is
    /// this engine's responsibility, persistence of their record state is
    /// the local applier's (under the store lock it takes itself).
    pub fn process_remote_batch(
        &self,
        mut changes: Vec<Change>,
        remote_seq: u64,
    ) -> EngineResult<BatchSummary> {
        sort::sort(&mut changes);

        let mut summary = BatchSummary {
            analyzed: changes.len(),
            ..BatchSummary::default()
        };
        self.dispatch(&changes, &mut summary)?;
        self.store.set_remote_seq(remote_seq)?;
        self.account(&summary);
        Ok(summary)
    }

    fn dispatch(&self, changes: &[Change], summary: &mut BatchSummary) -> EngineResult<()> {
        for change in changes {
            if matches!(change, Change::Ignored { .. }) {
                continue;
            }
            if self.retries_exhausted(change)? {
                tracing::warn!(path = change.path(), "retry limit reached, not dispatching");
                summary.failures.push(ApplyFailure {
                    path: change.path().to_string(),
                    message: "retry limit reached".to_string(),
                });
                continue;
            }
            match self.applier.apply(change) {
                Ok(()) => {
                    summary.dispatched += 1;
                    self.note_apply_success(change)?;
                }
                Err(err) => {
                    tracing::warn!(path = change.path(), error = %err, "apply failed");
                    self.note_apply_failure(change)?;
                    summary.failures.push(ApplyFailure {
                        path: change.path().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn persist_local(&self, change: &Change) -> Result<Persist, StoreError> {
        match change {
            Change::Ignored { .. } => Ok(Persist::Noop),
            Change::FileAddition {
                path,
                stats,
                md5sum,
                ..
            } => self.upsert(path, DocType::File, stats, md5sum.clone()),
            Change::DirAddition { path, stats, .. } => {
                self.upsert(path, DocType::Folder, stats, None)
            }
            Change::FileUpdate {
                path,
                stats,
                md5sum,
                ..
            } => self.upsert(path, DocType::File, stats, md5sum.clone()),
            Change::FileMove {
                path,
                stats,
                md5sum,
                old,
                update,
                ..
            } => self.persist_move(path, DocType::File, stats, md5sum.clone(), old, update.as_ref()),
            Change::DirMove {
                path, stats, old, ..
            } => self.persist_move(path, DocType::Folder, stats, None, old, None),
            Change::FileDeletion { old, .. } | Change::DirDeletion { old, .. } => {
                if let Some(stored) = self.store.by_id_maybe(&old.id())? {
                    self.store.remove(&stored)?;
                }
                Ok(Persist::Written)
            }
        }
    }

    fn upsert(
        &self,
        path: &str,
        doc_type: DocType,
        stats: &Stats,
        md5sum: Option<String>,
    ) -> Result<Persist, StoreError> {
        let existing = self.store.by_id_maybe(&record_id(path))?;
        let updated_at = stats.mtime.unwrap_or_else(now_millis);
        if let Some(prev) = &existing {
            if prev.updated_at > updated_at {
                tracing::debug!(path, "stored state is newer, write skipped");
                return Ok(Persist::Stale);
            }
        }

        let mut record = existing.unwrap_or_else(|| Metadata::new(path, doc_type));
        record.doc_type = doc_type;
        record.ino = Some(stats.ino);
        record.size = stats.size.or(record.size);
        if md5sum.is_some() {
            record.md5sum = md5sum;
        }
        record.updated_at = updated_at;
        record.sides.increment(SideName::Local);

        self.store.put(&record)?;
        Ok(Persist::Written)
    }

    fn persist_move(
        &self,
        path: &str,
        doc_type: DocType,
        stats: &Stats,
        md5sum: Option<String>,
        old: &Metadata,
        update: Option<&TrailingUpdate>,
    ) -> Result<Persist, StoreError> {
        let existing_dst = self.store.by_id_maybe(&record_id(path))?;
        let updated_at = stats.mtime.unwrap_or_else(now_millis);
        if let Some(prev) = &existing_dst {
            if prev.updated_at > updated_at {
                tracing::debug!(path, "stored state is newer, move skipped");
                return Ok(Persist::Stale);
            }
        }

        if let Some(source) = self.store.by_id_maybe(&old.id())? {
            self.store.remove(&source)?;
        }

        // Child moves were squashed out of the batch as implied by this
        // move, so the records under a moved folder are re-rooted here.
        if doc_type == DocType::Folder {
            for descendant in self.store.descendants_of(&old.path)? {
                let rest = &descendant.path[old.path.len()..];
                let new_path = format!("{path}{rest}");
                self.store.remove(&descendant)?;

                let mut moved = descendant;
                moved.path = new_path;
                moved.rev = self.store.by_id_maybe(&moved.id())?.map_or(0, |r| r.rev);
                moved.sides.increment(SideName::Local);
                self.store.put(&moved)?;
            }
        }

        // The moved object keeps its identity: remote reference, side
        // counters and tags travel to the new path.
        let mut record = Metadata::new(path, doc_type);
        record.rev = existing_dst.map_or(0, |r| r.rev);
        record.remote = old.remote.clone();
        record.sides = old.sides;
        record.tags = old.tags.clone();
        record.ino = Some(stats.ino);
        record.size = stats.size.or(old.size);
        record.md5sum = md5sum.or_else(|| old.md5sum.clone());

        if let Some(update) = update {
            if update.md5sum.is_some() {
                record.md5sum = update.md5sum.clone();
            }
            if update.stats.size.is_some() {
                record.size = update.stats.size;
            }
        }

        record.updated_at = updated_at;
        record.sides.increment(SideName::Local);

        self.store.put(&record)?;
        Ok(Persist::Written)
    }

    fn retries_exhausted(&self, change: &Change) -> EngineResult<bool> {
        let record = self.store.by_id_maybe(&record_id(change.path()))?;
        Ok(record.is_some_and(|r| r.errors >= self.config.max_record_retries))
    }

    fn note_apply_failure(&self, change: &Change) -> EngineResult<()> {
        let guard = self.store.lock("apply-failure");
        if let Some(mut record) = self.store.by_id_maybe(&record_id(change.path()))? {
            record.errors += 1;
            self.store.put(&record)?;
        }
        guard.release();
        Ok(())
    }

    fn note_apply_success(&self, change: &Change) -> EngineResult<()> {
        let guard = self.store.lock("apply-success");
        if let Some(mut record) = self.store.by_id_maybe(&record_id(change.path()))? {
            if record.errors > 0 {
                record.errors = 0;
                self.store.put(&record)?;
            }
        }
        guard.release();
        Ok(())
    }

    fn account(&self, summary: &BatchSummary) {
        let mut stats = self.stats.write();
        stats.batches_processed += 1;
        stats.changes_dispatched += summary.dispatched as u64;
        stats.apply_failures += summary.failures.len() as u64;
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
