//! # Tandem Storage
//!
//! Append-only storage backends for the tandem metadata journal.
//!
//! Backends are **opaque byte stores**: they read, append, flush and
//! truncate, and nothing more. The journal format (entry framing, CBOR
//! payloads) is owned entirely by `tandem_store` - backends never interpret
//! the bytes they hold.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - for tests and throwaway stores
//! - [`FileBackend`] - persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use tandem_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"entry").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"entry");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
