//! # Tandem Engine
//!
//! The sync coordinator. Thin by design: it consumes analyzer output,
//! persists each change's effect on the metadata store while holding the
//! store lock, and hands the ordered changes to the opposite side's
//! applier. Conflict policy lives in the data (later timestamp wins) and
//! in the store's invariants, not here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod engine;
mod error;

pub use applier::{Applier, RecordingApplier};
pub use config::EngineConfig;
pub use engine::{ApplyFailure, BatchSummary, EngineStats, SyncEngine};
pub use error::{ApplyError, EngineError, EngineResult};
