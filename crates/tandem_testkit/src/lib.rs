//! # Tandem Testkit
//!
//! Test builders and fixtures shared by the tandem crates' test suites.
//!
//! - [`MetadataBuilder`] builds metadata records with sensible defaults
//!   ([`metafile`]/[`metadir`] are the usual entry points)
//! - [`EventBuilder`] builds raw watcher events
//! - [`TestStore`] opens throwaway in-memory or file-backed stores

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builders;
mod fixtures;

pub use builders::{metadir, metafile, EventBuilder, MetadataBuilder};
pub use fixtures::{records_json, TestStore};
