//! Journal entry framing and replay.
//!
//! Every accepted write becomes one journal entry: a 4-byte little-endian
//! length prefix followed by the CBOR-encoded entry. On open the journal
//! is replayed sequentially; the first frame that is short or fails to
//! decode marks the end of the valid prefix - everything after it is a
//! torn tail from an interrupted write and is discarded.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use tandem_model::Metadata;
use tandem_storage::StorageBackend;

/// Size of the length prefix framing each entry.
const LEN_PREFIX: usize = 4;

/// One persisted store operation.
///
/// Tombstones are `Put` entries whose record carries the `deleted` flag;
/// hard removal is re-derived from the record's convergence state during
/// replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// An accepted record write (including tombstones).
    Put(Metadata),
    /// The local replication cursor advanced.
    LocalSeq(u64),
    /// The remote replication cursor advanced.
    RemoteSeq(u64),
}

/// Result of replaying a journal.
#[derive(Debug)]
pub struct Replay {
    /// Entries decoded from the valid prefix, in write order.
    pub entries: Vec<JournalEntry>,
    /// Length in bytes of the valid prefix.
    pub valid_len: u64,
}

/// Encodes an entry into its framed byte representation.
pub fn encode_entry(entry: &JournalEntry) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(entry, &mut payload)
        .map_err(|e| StoreError::corrupted(format!("journal encode failed: {e}")))?;

    let mut framed = Vec::with_capacity(LEN_PREFIX + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Replays all decodable entries from the start of the backend.
///
/// Stops at the first short or undecodable frame and reports the length of
/// the valid prefix so the caller can truncate the tail.
pub fn replay(backend: &dyn StorageBackend) -> StoreResult<Replay> {
    let size = backend.size()?;
    let mut offset = 0u64;
    let mut entries = Vec::new();

    while offset + LEN_PREFIX as u64 <= size {
        let prefix = backend.read_at(offset, LEN_PREFIX)?;
        let len = u64::from(u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]));

        let payload_start = offset + LEN_PREFIX as u64;
        if payload_start + len > size {
            // Short frame: the entry was cut off mid-write.
            break;
        }

        let payload = backend.read_at(payload_start, len as usize)?;
        match ciborium::de::from_reader(payload.as_slice()) {
            Ok(entry) => {
                entries.push(entry);
                offset = payload_start + len;
            }
            Err(_) => break,
        }
    }

    Ok(Replay {
        entries,
        valid_len: offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_model::{DocType, Sides};
    use tandem_storage::InMemoryBackend;

    fn sample_record(path: &str) -> Metadata {
        let mut record = Metadata::new(path, DocType::File);
        record.sides = Sides::new(1, 0);
        record
    }

    #[test]
    fn round_trip_entries() {
        let mut backend = InMemoryBackend::new();

        let entries = vec![
            JournalEntry::Put(sample_record("a")),
            JournalEntry::LocalSeq(21),
            JournalEntry::Put(sample_record("b")),
            JournalEntry::RemoteSeq(33),
        ];
        for entry in &entries {
            let framed = encode_entry(entry).unwrap();
            backend.append(&framed).unwrap();
        }

        let replayed = replay(&backend).unwrap();
        assert_eq!(replayed.entries, entries);
        assert_eq!(replayed.valid_len, backend.size().unwrap());
    }

    #[test]
    fn empty_journal_replays_to_nothing() {
        let backend = InMemoryBackend::new();
        let replayed = replay(&backend).unwrap();
        assert!(replayed.entries.is_empty());
        assert_eq!(replayed.valid_len, 0);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let mut backend = InMemoryBackend::new();

        let good = encode_entry(&JournalEntry::LocalSeq(7)).unwrap();
        let good_len = good.len() as u64;
        backend.append(&good).unwrap();

        // A frame whose declared length exceeds the remaining bytes.
        let mut torn = encode_entry(&JournalEntry::RemoteSeq(8)).unwrap();
        torn.truncate(torn.len() - 2);
        backend.append(&torn).unwrap();

        let replayed = replay(&backend).unwrap();
        assert_eq!(replayed.entries, vec![JournalEntry::LocalSeq(7)]);
        assert_eq!(replayed.valid_len, good_len);
    }

    #[test]
    fn garbage_tail_is_dropped() {
        let mut backend = InMemoryBackend::new();

        let good = encode_entry(&JournalEntry::LocalSeq(7)).unwrap();
        let good_len = good.len() as u64;
        backend.append(&good).unwrap();

        // A well-framed payload that is not valid CBOR for an entry.
        let mut bad_frame = Vec::new();
        bad_frame.extend_from_slice(&4u32.to_le_bytes());
        bad_frame.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        backend.append(&bad_frame).unwrap();

        let replayed = replay(&backend).unwrap();
        assert_eq!(replayed.entries.len(), 1);
        assert_eq!(replayed.valid_len, good_len);
    }
}
