//! Remote object-storage backends
//!
//! The transfer layer talks to the remote service through the [`Connection`]
//! trait: open an object for writing (optionally at a non-zero offset),
//! and create collections (remote directory-equivalents). The reference
//! backend is SFTP over SSH; an in-memory backend backs tests and benches.

use crate::error::Result;
use std::io::{Seek, Write};
use std::path::Path;

mod memory;
mod sftp;

pub use memory::{MemoryConnection, MemoryStore};
pub use sftp::SftpConnection;

/// A writable, seekable handle to one remote object.
///
/// Independent handles to the same object must support positioned writes
/// without serializing against each other. Handles stay within the task
/// that opened them.
pub trait ObjectWrite: Write + Seek {}

impl<T: Write + Seek> ObjectWrite for T {}

/// One established, authenticated connection to the remote store.
///
/// Connections are established once, pooled, and reused; every method is a
/// single bounded remote operation.
pub trait Connection: Send {
    /// Create (or truncate) the object at `path` and open it for writing.
    fn create(&self, path: &Path) -> Result<Box<dyn ObjectWrite>>;

    /// Open the object at `path` for positioned writes, creating it if
    /// missing. Existing content is left in place so concurrent writers
    /// on disjoint ranges do not clobber each other.
    fn open_write(&self, path: &Path) -> Result<Box<dyn ObjectWrite>>;

    /// Create the collection at `path`, including any missing ancestors.
    fn create_collection(&self, path: &Path) -> Result<()>;
}
