//! # Tandem Model
//!
//! Shared data model for the tandem sync core.
//!
//! This crate provides:
//! - The [`Metadata`] record tracked per synchronized filesystem object
//! - Record identity derived from normalized paths ([`record_id`])
//! - The [`Change`] sum type produced by local analysis and consumed by
//!   the appliers on either side
//! - The change sorter ([`sort::sort`]) that orders a batch of changes so
//!   structural dependencies are respected on replay

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod change;
pub mod metadata;
pub mod sort;

pub use change::{Change, TrailingUpdate};
pub use metadata::{
    normalize_path, record_id, DocType, Metadata, RecordId, RemoteRef, SideName, Sides, Stats,
};
