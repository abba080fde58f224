//! # Tandem Store
//!
//! The authoritative metadata store of the tandem sync core.
//!
//! One [`Metadata`](tandem_model::Metadata) record is kept per tracked
//! filesystem object, keyed by its normalized path identifier. The store:
//!
//! - enforces the reconciliation invariants on every write (a record must
//!   have sides; a record with a remote side needs a remote reference)
//! - rejects stale writes through per-record revisions
//! - maintains secondary indexes by content checksum and remote id
//! - persists every accepted write to an append-only CBOR journal and
//!   replays it on open, dropping a torn tail after a crash
//! - tracks one replication cursor per side
//! - exposes a FIFO [`StoreLock`] serializing read-decide-write spans
//!   across the watcher loop, the remote polling loop and user-triggered
//!   operations

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dir;
mod error;
mod journal;
mod lock;
mod store;

pub use dir::StoreDir;
pub use error::{StoreError, StoreResult};
pub use journal::JournalEntry;
pub use lock::{LockGuard, StoreLock};
pub use store::Store;
