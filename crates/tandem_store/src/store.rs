//! The metadata store.

use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::journal::{self, JournalEntry};
use crate::lock::{LockGuard, StoreLock};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tandem_model::{record_id, Metadata, RecordId};
use tandem_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// Authoritative store of metadata records.
///
/// All reads and writes go through one internal state guard, so accepted
/// writes, index maintenance and journal appends are atomic relative to
/// each other. The coarser [`StoreLock`] obtained from [`Store::lock`]
/// serializes whole read-decide-write spans across call sites.
pub struct Store {
    state: Mutex<State>,
    lock: StoreLock,
}

struct State {
    backend: Box<dyn StorageBackend>,
    /// Records by id, tombstones included. BTreeMap keeps ids sorted,
    /// which makes the path-range lookups cheap.
    records: BTreeMap<String, Metadata>,
    /// Content checksum -> record ids sharing it.
    by_checksum: HashMap<String, BTreeSet<String>>,
    /// Remote document id -> record id.
    by_remote_id: HashMap<String, String>,
    local_seq: u64,
    remote_seq: u64,
    /// Keeps the directory's process lock alive for file-backed stores.
    _dir: Option<StoreDir>,
}

impl Store {
    /// Opens an in-memory store with no persistence.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_backend(Box::new(InMemoryBackend::new()), None)
    }

    /// Opens or creates a file-backed store at the given directory.
    ///
    /// Takes the directory's exclusive process lock and replays the
    /// journal. A torn journal tail left by a crash is discarded.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let dir = StoreDir::open(path, true)?;
        let backend = FileBackend::open_with_create_dirs(&dir.journal_path())?;
        Self::from_backend(Box::new(backend), Some(dir))
    }

    /// Opens a store over an existing backend, replaying its journal.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        Self::from_backend(backend, None)
    }

    fn from_backend(mut backend: Box<dyn StorageBackend>, dir: Option<StoreDir>) -> StoreResult<Self> {
        let replayed = journal::replay(backend.as_ref())?;
        let total = backend.size()?;
        if replayed.valid_len < total {
            tracing::warn!(
                valid = replayed.valid_len,
                total,
                "dropping torn journal tail"
            );
            backend.truncate(replayed.valid_len)?;
        }

        let mut state = State {
            backend,
            records: BTreeMap::new(),
            by_checksum: HashMap::new(),
            by_remote_id: HashMap::new(),
            local_seq: 0,
            remote_seq: 0,
            _dir: dir,
        };

        for entry in replayed.entries {
            match entry {
                JournalEntry::Put(record) => state.index_record(record),
                JournalEntry::LocalSeq(seq) => state.local_seq = seq,
                JournalEntry::RemoteSeq(seq) => state.remote_seq = seq,
            }
        }

        Ok(Self {
            state: Mutex::new(state),
            lock: StoreLock::new(),
        })
    }

    /// Acquires the store lock for a read-decide-write span.
    ///
    /// Requests are granted strictly in arrival order; see [`StoreLock`].
    pub fn lock(&self, owner: impl Into<String>) -> LockGuard {
        self.lock.lock(owner)
    }

    /// Writes a record.
    ///
    /// Rejects, without touching storage, records that violate the
    /// reconciliation invariants or carry a stale revision. On acceptance
    /// the record's revision is bumped, the write is journaled and all
    /// indexes are updated. Returns the record as stored.
    pub fn put(&self, record: &Metadata) -> StoreResult<Metadata> {
        let mut state = self.state.lock();
        state.put_record(record)
    }

    /// Writes a batch of records.
    ///
    /// Outcomes are independent: one record's rejection (for example a
    /// stale-revision conflict) does not affect the others, and each
    /// outcome is reported individually in input order.
    pub fn bulk_put(&self, records: &[Metadata]) -> Vec<StoreResult<Metadata>> {
        let mut state = self.state.lock();
        records.iter().map(|r| state.put_record(r)).collect()
    }

    /// Tombstones a record and removes its index entries.
    ///
    /// Idempotent: removing an absent or already-deleted record succeeds.
    /// The record is hard-removed only once both sides have converged or
    /// it was never synced to one side; otherwise the tombstone is kept
    /// so the deletion can still propagate.
    pub fn remove(&self, record: &Metadata) -> StoreResult<()> {
        let mut state = self.state.lock();
        let id = record.id().as_str().to_string();

        let Some(stored) = state.records.get(&id).cloned() else {
            return Ok(());
        };
        if stored.deleted {
            return Ok(());
        }

        let mut tombstone = stored;
        tombstone.deleted = true;
        tombstone.rev += 1;

        state.append_entry(&JournalEntry::Put(tombstone.clone()))?;
        state.index_record(tombstone);
        Ok(())
    }

    /// Looks up a record by id, failing with [`StoreError::NotFound`]
    /// when it is absent or deleted.
    pub fn by_id(&self, id: &RecordId) -> StoreResult<Metadata> {
        let state = self.state.lock();
        state
            .records
            .get(id.as_str())
            .filter(|r| !r.deleted)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                id: id.as_str().to_string(),
            })
    }

    /// Looks up a record by id, mapping "definitely absent" to `None`.
    ///
    /// Infrastructure errors are passed through unchanged, so callers can
    /// still distinguish "absent" from "store unavailable".
    pub fn by_id_maybe(&self, id: &RecordId) -> StoreResult<Option<Metadata>> {
        match self.by_id(id) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Returns the records directly under `path`, in id order.
    ///
    /// An empty path lists the first level of the tree.
    pub fn children_of(&self, path: &str) -> StoreResult<Vec<Metadata>> {
        Ok(self.descendants_matching(path, |rest| !rest.contains('/')))
    }

    /// Returns all records under `path` recursively, in id order.
    pub fn descendants_of(&self, path: &str) -> StoreResult<Vec<Metadata>> {
        Ok(self.descendants_matching(path, |_| true))
    }

    fn descendants_matching(&self, path: &str, keep: impl Fn(&str) -> bool) -> Vec<Metadata> {
        let state = self.state.lock();
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", record_id(path).as_str())
        };

        state
            .records
            .range(prefix.clone()..)
            .take_while(|(id, _)| id.starts_with(&prefix))
            .filter(|(id, record)| !record.deleted && keep(&id[prefix.len()..]))
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Returns every record sharing the given content checksum.
    ///
    /// Used as a move/dedup hint: several records may legitimately share
    /// one checksum.
    pub fn by_checksum(&self, md5sum: &str) -> StoreResult<Vec<Metadata>> {
        let state = self.state.lock();
        let Some(ids) = state.by_checksum.get(md5sum) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|r| !r.deleted)
            .cloned()
            .collect())
    }

    /// Looks up the record referencing the given remote document id.
    pub fn by_remote_id(&self, remote_id: &str) -> StoreResult<Metadata> {
        let state = self.state.lock();
        state
            .by_remote_id
            .get(remote_id)
            .and_then(|id| state.records.get(id))
            .filter(|r| !r.deleted)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                id: remote_id.to_string(),
            })
    }

    /// Like [`Store::by_remote_id`], mapping "definitely absent" to `None`.
    pub fn by_remote_id_maybe(&self, remote_id: &str) -> StoreResult<Option<Metadata>> {
        match self.by_remote_id(remote_id) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Looks up records for a collection of remote ids.
    ///
    /// Results preserve the input order, ids with no match are silently
    /// omitted, and duplicate ids yield duplicate records. Accepts any
    /// ordered or unordered collection of ids.
    pub fn all_by_remote_ids<I, S>(&self, remote_ids: I) -> StoreResult<Vec<Metadata>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let state = self.state.lock();
        Ok(remote_ids
            .into_iter()
            .filter_map(|remote_id| {
                state
                    .by_remote_id
                    .get(remote_id.as_ref())
                    .and_then(|id| state.records.get(id))
                    .filter(|r| !r.deleted)
                    .cloned()
            })
            .collect())
    }

    /// Returns all live records in id order.
    pub fn records(&self) -> StoreResult<Vec<Metadata>> {
        let state = self.state.lock();
        Ok(state
            .records
            .values()
            .filter(|r| !r.deleted)
            .cloned()
            .collect())
    }

    /// Returns the local replication cursor, zero when never set.
    pub fn local_seq(&self) -> StoreResult<u64> {
        Ok(self.state.lock().local_seq)
    }

    /// Persists the local replication cursor. Idempotent; under
    /// concurrent setters the last completed write wins.
    pub fn set_local_seq(&self, seq: u64) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.append_entry(&JournalEntry::LocalSeq(seq))?;
        state.local_seq = seq;
        Ok(())
    }

    /// Returns the remote replication cursor, zero when never set.
    pub fn remote_seq(&self) -> StoreResult<u64> {
        Ok(self.state.lock().remote_seq)
    }

    /// Persists the remote replication cursor. Idempotent; under
    /// concurrent setters the last completed write wins.
    pub fn set_remote_seq(&self, seq: u64) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.append_entry(&JournalEntry::RemoteSeq(seq))?;
        state.remote_seq = seq;
        Ok(())
    }
}

impl State {
    fn put_record(&mut self, record: &Metadata) -> StoreResult<Metadata> {
        check_invariants(record)?;

        let id = record.id().as_str().to_string();
        let stored = self.records.get(&id);
        let current_rev = stored.map_or(0, |r| r.rev);
        // A fresh write may resurrect a kept tombstone: the tombstone is
        // invisible to lookups, so the caller cannot know its revision.
        let resurrects = stored.is_some_and(|r| r.deleted) && record.rev == 0;
        if record.rev != current_rev && !resurrects {
            tracing::debug!(id = %id, expected = current_rev, actual = record.rev, "stale write rejected");
            return Err(StoreError::Conflict {
                id,
                expected: current_rev,
                actual: record.rev,
            });
        }

        let mut accepted = record.clone();
        accepted.rev = current_rev + 1;

        self.append_entry(&JournalEntry::Put(accepted.clone()))?;
        self.index_record(accepted.clone());
        Ok(accepted)
    }

    /// Applies an accepted record to the in-memory map and indexes.
    ///
    /// Also used during replay, where revisions are taken as journaled.
    fn index_record(&mut self, record: Metadata) {
        let id = record.id().as_str().to_string();

        if let Some(prev) = self.records.get(&id) {
            if let Some(sum) = &prev.md5sum {
                if let Some(ids) = self.by_checksum.get_mut(sum) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        self.by_checksum.remove(sum);
                    }
                }
            }
            if let Some(remote) = &prev.remote {
                self.by_remote_id.remove(&remote.id);
            }
        }

        if record.deleted {
            if record.is_removable() {
                self.records.remove(&id);
            } else {
                self.records.insert(id, record);
            }
            return;
        }

        if let Some(sum) = &record.md5sum {
            self.by_checksum
                .entry(sum.clone())
                .or_default()
                .insert(id.clone());
        }
        if let Some(remote) = &record.remote {
            self.by_remote_id.insert(remote.id.clone(), id.clone());
        }
        self.records.insert(id, record);
    }

    fn append_entry(&mut self, entry: &JournalEntry) -> StoreResult<()> {
        let framed = journal::encode_entry(entry)?;
        self.backend.append(&framed)?;
        self.backend.flush()?;
        Ok(())
    }
}

/// Checks the reconciliation invariants a record must satisfy to be
/// stored.
fn check_invariants(record: &Metadata) -> StoreResult<()> {
    if record.sides.is_missing() {
        return Err(StoreError::invalid_record("record has no sides"));
    }

    if record.sides.remote > 0 && record.remote.is_none() {
        // A converged tombstone no longer needs its remote reference:
        // both sides already acknowledged the deletion.
        let converged_tombstone = record.deleted && record.sides.is_converged();
        if !converged_tombstone {
            return Err(StoreError::invalid_record(
                "record has a remote side but no remote reference",
            ));
        }
    }

    Ok(())
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Store")
            .field("records", &state.records.len())
            .field("local_seq", &state.local_seq)
            .field("remote_seq", &state.remote_seq)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tandem_model::{DocType, RemoteRef, Sides};
    use tandem_storage::InMemoryBackend;

    fn metafile(path: &str) -> Metadata {
        let mut record = Metadata::new(path, DocType::File);
        record.sides = Sides::new(1, 0);
        record.md5sum = Some(format!("sum-of-{path}"));
        record
    }

    fn metadir(path: &str) -> Metadata {
        let mut record = Metadata::new(path, DocType::Folder);
        record.sides = Sides::new(1, 0);
        record
    }

    fn synced(mut record: Metadata, remote_id: &str) -> Metadata {
        record.remote = Some(RemoteRef {
            id: remote_id.to_string(),
            rev: "1-abc".to_string(),
        });
        record.sides = Sides::new(1, 1);
        record
    }

    /// Store seeded like the original fixtures: one parent folder holding
    /// three files and three folders.
    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.put(&metadir("my-folder")).unwrap();
        for i in 1..=3 {
            let mut file = metafile(&format!("my-folder/file-{i}"));
            file.md5sum = Some(format!("{i}{i}{i}{i}{i}{i}{i}{i}{i}{i}"));
            store.put(&file).unwrap();
            store.put(&metadir(&format!("my-folder/folder-{i}"))).unwrap();
        }
        store
    }

    #[test]
    fn put_rejects_record_without_sides() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&metafile("doc")).unwrap();

        let mut doc = stored.clone();
        doc.sides = Sides::default();

        let err = store.put(&doc).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        // Store unchanged.
        assert_eq!(store.by_id(&stored.id()).unwrap().rev, stored.rev);
    }

    #[test]
    fn put_rejects_remote_side_without_remote_ref() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&metafile("doc")).unwrap();

        let mut doc = stored.clone();
        doc.remote = None;
        doc.sides = Sides::new(0, 1);

        let err = store.put(&doc).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(store.by_id(&stored.id()).unwrap().rev, stored.rev);
    }

    #[test]
    fn put_rejects_unconverged_record_missing_remote_ref() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&metafile("doc")).unwrap();

        let mut doc = stored.clone();
        doc.remote = None;
        doc.sides = Sides::new(1, 2);

        let err = store.put(&doc).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(store.by_id(&stored.id()).unwrap().rev, stored.rev);
    }

    #[test]
    fn put_accepts_converged_tombstone_without_remote_ref() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&metafile("doc")).unwrap();

        let mut doc = stored.clone();
        doc.remote = None;
        doc.deleted = true;
        doc.sides = Sides::new(1, 1);

        store.put(&doc).unwrap();
        assert!(store.by_id(&stored.id()).unwrap_err().is_not_found());
    }

    #[test]
    fn put_rejects_stale_revision() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&metafile("doc")).unwrap();

        let mut stale = stored.clone();
        stale.rev = 0;

        let err = store.put(&stale).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn remove_makes_record_unfindable() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&metafile("doc")).unwrap();

        store.remove(&stored).unwrap();
        assert!(store.by_id(&stored.id()).unwrap_err().is_not_found());
        assert_eq!(store.by_id_maybe(&stored.id()).unwrap(), None);

        // Idempotent.
        store.remove(&stored).unwrap();
    }

    #[test]
    fn remove_keeps_tombstone_until_converged() {
        let store = Store::open_in_memory().unwrap();
        let mut doc = synced(metafile("doc"), "remote-1");
        doc.sides = Sides::new(3, 2);
        let stored = store.put(&doc).unwrap();

        store.remove(&stored).unwrap();
        // Invisible to lookups but still journaled as a tombstone.
        assert!(store.by_id(&stored.id()).unwrap_err().is_not_found());

        let state = store.state.lock();
        let kept = state.records.get(stored.id().as_str()).unwrap();
        assert!(kept.deleted);
    }

    #[test]
    fn fresh_write_resurrects_kept_tombstone() {
        let store = Store::open_in_memory().unwrap();
        let mut doc = synced(metafile("doc"), "remote-1");
        doc.sides = Sides::new(3, 2);
        let stored = store.put(&doc).unwrap();
        store.remove(&stored).unwrap();

        // A new object appears at the same path; its writer cannot see
        // the kept tombstone and starts from revision zero.
        let reborn = store.put(&metafile("doc")).unwrap();
        assert_eq!(reborn.rev, stored.rev + 2);
        assert!(store.by_id(&stored.id()).is_ok());
    }

    #[test]
    fn bulk_put_outcomes_are_independent() {
        let store = Store::open_in_memory().unwrap();
        let doc1 = store.put(&metafile("doc1")).unwrap();
        let doc2 = store.put(&metafile("doc2")).unwrap();

        // First one stale, second one fine.
        let mut stale1 = doc1.clone();
        stale1.rev = 9;
        let outcomes = store.bulk_put(&[stale1, doc2.clone()]);
        assert!(matches!(outcomes[0], Err(StoreError::Conflict { .. })));
        assert!(outcomes[1].is_ok());
        assert_eq!(store.by_id(&doc1.id()).unwrap().rev, 1);
        assert_eq!(store.by_id(&doc2.id()).unwrap().rev, 2);

        // And the other way around.
        let doc1 = store.by_id(&doc1.id()).unwrap();
        let mut stale2 = store.by_id(&doc2.id()).unwrap();
        stale2.rev = 9;
        let outcomes = store.bulk_put(&[doc1.clone(), stale2]);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(StoreError::Conflict { .. })));
        assert_eq!(store.by_id(&doc1.id()).unwrap().rev, 2);
    }

    #[test]
    fn children_of_returns_first_level_only() {
        let store = seeded_store();

        let docs = store.children_of("my-folder").unwrap();
        assert_eq!(docs.len(), 6);
        for (i, doc) in docs.iter().take(3).enumerate() {
            assert_eq!(doc.path, format!("my-folder/file-{}", i + 1));
            assert_eq!(doc.doc_type, DocType::File);
        }
        for (i, doc) in docs.iter().skip(3).enumerate() {
            assert_eq!(doc.path, format!("my-folder/folder-{}", i + 1));
            assert_eq!(doc.doc_type, DocType::Folder);
        }

        let roots = store.children_of("").unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].path, "my-folder");
    }

    #[test]
    fn descendants_of_recurses() {
        let store = seeded_store();
        store.put(&metafile("my-folder/folder-1/nested")).unwrap();

        let docs = store.descendants_of("my-folder").unwrap();
        assert_eq!(docs.len(), 7);

        let all = store.descendants_of("").unwrap();
        assert_eq!(all.len(), 8);
        assert_eq!(all[0].path, "my-folder");
    }

    #[test]
    fn by_checksum_returns_sharing_records() {
        let store = seeded_store();

        let docs = store.by_checksum("1111111111").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].path, "my-folder/file-1");

        assert!(store.by_checksum("unseen").unwrap().is_empty());
    }

    #[test]
    fn by_remote_id_and_maybe_variant() {
        let store = Store::open_in_memory().unwrap();
        let doc = store.put(&synced(metafile("doc"), "12345678901")).unwrap();

        let found = store.by_remote_id("12345678901").unwrap();
        assert_eq!(found.id(), doc.id());

        assert!(store.by_remote_id("abcdef").unwrap_err().is_not_found());
        assert_eq!(store.by_remote_id_maybe("abcdef").unwrap(), None);
        assert!(store.by_remote_id_maybe("12345678901").unwrap().is_some());
    }

    #[test]
    fn all_by_remote_ids_preserves_order_and_skips_missing() {
        let store = Store::open_in_memory().unwrap();
        let dir = store
            .put(&synced(metadir("dir-with-remote-id"), "remote-dir"))
            .unwrap();
        let file = store
            .put(&synced(metafile("file-with-remote-id"), "remote-file"))
            .unwrap();

        let docs = store
            .all_by_remote_ids(["remote-file", "remote-dir"])
            .unwrap();
        assert_eq!(docs, vec![file.clone(), dir.clone()]);

        let docs = store
            .all_by_remote_ids(["remote-dir", "missing", "remote-file"])
            .unwrap();
        assert_eq!(docs, vec![dir.clone(), file.clone()]);

        assert!(store.all_by_remote_ids(["missing"]).unwrap().is_empty());
        assert!(store.all_by_remote_ids(Vec::<String>::new()).unwrap().is_empty());

        // Duplicates yield duplicates.
        let docs = store
            .all_by_remote_ids(["remote-dir", "remote-dir"])
            .unwrap();
        assert_eq!(docs, vec![dir.clone(), dir.clone()]);

        // Any collection of ids works, ordered or not.
        let set: BTreeSet<String> =
            ["remote-dir".to_string(), "remote-file".to_string()].into();
        let docs = store.all_by_remote_ids(&set).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn move_releases_old_indexes() {
        let store = Store::open_in_memory().unwrap();
        let stored = store.put(&synced(metafile("src"), "remote-1")).unwrap();

        // Rename: tombstone the old id, create the new one.
        store.remove(&stored).unwrap();
        let mut moved = stored.clone();
        moved.path = "dst".into();
        moved.rev = 0;
        store.put(&moved).unwrap();

        assert!(store.by_id(&record_id("src")).unwrap_err().is_not_found());
        assert_eq!(store.by_id(&record_id("dst")).unwrap().path, "dst");
        assert_eq!(store.by_remote_id("remote-1").unwrap().path, "dst");
    }

    #[test]
    fn sequence_cursors_default_to_zero_and_persist_updates() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.local_seq().unwrap(), 0);
        assert_eq!(store.remote_seq().unwrap(), 0);

        store.set_local_seq(21).unwrap();
        assert_eq!(store.local_seq().unwrap(), 21);
        store.set_local_seq(22).unwrap();
        assert_eq!(store.local_seq().unwrap(), 22);

        store.set_remote_seq(31).unwrap();
        assert_eq!(store.remote_seq().unwrap(), 31);
        store.set_remote_seq(32).unwrap();
        assert_eq!(store.remote_seq().unwrap(), 32);
    }

    #[test]
    fn concurrent_cursor_setters_do_not_corrupt() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut handles = Vec::new();

        for chunk in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for seq in (chunk * 25)..(chunk * 25 + 25) {
                    store.set_remote_seq(seq).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Last completed write wins; the value is one someone wrote.
        assert!(store.remote_seq().unwrap() < 100);
    }

    #[test]
    fn journal_replay_restores_state() {
        let backend = {
            let store = Store::open_in_memory().unwrap();
            store.put(&metadir("tree")).unwrap();
            store.put(&synced(metafile("tree/doc"), "remote-9")).unwrap();
            let gone = store.put(&metafile("tree/gone")).unwrap();
            store.remove(&gone).unwrap();
            store.set_local_seq(5).unwrap();
            store.set_remote_seq(7).unwrap();

            let state = store.state.lock();
            let mut dump = Vec::new();
            let size = state.backend.size().unwrap();
            dump.extend_from_slice(&state.backend.read_at(0, size as usize).unwrap());
            dump
        };

        let reopened =
            Store::open_with_backend(Box::new(InMemoryBackend::with_data(backend))).unwrap();
        assert_eq!(reopened.records().unwrap().len(), 2);
        assert_eq!(reopened.by_id(&record_id("tree/doc")).unwrap().rev, 1);
        assert!(reopened
            .by_id(&record_id("tree/gone"))
            .unwrap_err()
            .is_not_found());
        assert_eq!(reopened.by_remote_id("remote-9").unwrap().path, "tree/doc");
        assert_eq!(reopened.local_seq().unwrap(), 5);
        assert_eq!(reopened.remote_seq().unwrap(), 7);
    }

    #[test]
    fn torn_tail_is_discarded_on_open() {
        let mut data = {
            let store = Store::open_in_memory().unwrap();
            store.put(&metafile("kept")).unwrap();
            let state = store.state.lock();
            let size = state.backend.size().unwrap();
            state.backend.read_at(0, size as usize).unwrap()
        };
        // Simulate a crash mid-append.
        data.extend_from_slice(&99u32.to_le_bytes());
        data.extend_from_slice(b"partial");

        let reopened =
            Store::open_with_backend(Box::new(InMemoryBackend::with_data(data))).unwrap();
        assert_eq!(reopened.records().unwrap().len(), 1);
        assert!(reopened.by_id(&record_id("kept")).is_ok());
    }

    #[test]
    fn file_backed_store_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store");

        {
            let store = Store::open(&path).unwrap();
            store.put(&metafile("doc")).unwrap();
            store.set_remote_seq(11).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.by_id(&record_id("doc")).unwrap().path, "doc");
        assert_eq!(store.remote_seq().unwrap(), 11);
    }

    #[test]
    fn second_process_cannot_open_store() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("store");

        let _held = Store::open(&path).unwrap();
        assert!(matches!(Store::open(&path), Err(StoreError::StoreLocked)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn descendants_count_matches_inserts(
                segments in proptest::collection::btree_set("[a-z]{1,8}", 1..12)
            ) {
                let store = Store::open_in_memory().unwrap();
                store.put(&metadir("base")).unwrap();
                for segment in &segments {
                    store.put(&metadir(&format!("base/{segment}"))).unwrap();
                }

                let docs = store.descendants_of("base").unwrap();
                prop_assert_eq!(docs.len(), segments.len());
            }
        }
    }
}
