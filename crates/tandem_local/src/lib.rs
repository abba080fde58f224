//! # Tandem Local
//!
//! Turns batches of raw filesystem-watcher events into authoritative
//! semantic changes.
//!
//! Watchers report what they saw, not what happened: a rename arrives as
//! an unlink plus an add, a large copy arrives as a provisional
//! write-in-progress add, and events for one object may span several
//! batches. The [`analyze`] function correlates a batch by inode,
//! finalizes what it can, and carries everything still provisional in a
//! caller-owned [`PendingChanges`] queue to the next invocation.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod analysis;
mod event;
mod pending;

pub use analysis::analyze;
pub use event::{EventKind, RawEvent};
pub use pending::PendingChanges;
