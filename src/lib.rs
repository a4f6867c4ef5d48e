//! # ParPut - Parallel Uploads to Remote Object Stores
//!
//! ParPut transfers local files and directory trees into a remote object
//! store over a small, fixed number of network connections, parallelizing
//! both directory traversal and large-file chunked writes across a worker
//! pool.
//!
//! ## Architecture
//!
//! - **Connection pool**: a fixed set of pre-established remote
//!   connections, handed out as exclusive RAII leases.
//! - **Worker pool**: a bounded set of threads executing submitted tasks,
//!   including tasks that submit further tasks; `join` is the single
//!   completion barrier.
//! - **Transfer layer**: splits large files into disjoint byte-range
//!   chunks written through independent positioned handles, and mirrors
//!   directory trees into remote collections.
//!
//! ## Quick Start
//!
//! ```no_run
//! use parput::config::RemoteConfig;
//! use parput::dispatch::WorkerPool;
//! use parput::pool::ConnectionPool;
//! use parput::progress::TransferProgress;
//! use parput::remote::SftpConnection;
//! use parput::transfer::{upload, TransferSettings, UploadContext};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let remote = RemoteConfig {
//!     host: "storage.example.com".into(),
//!     user: "alice".into(),
//!     port: 22,
//!     key_path: None,
//!     password: None,
//! };
//!
//! let pool = Arc::new(ConnectionPool::new(4, || SftpConnection::connect(&remote)).unwrap());
//! let workers = WorkerPool::new(8);
//! let ctx = UploadContext::new(
//!     pool,
//!     workers.handle(),
//!     TransferSettings::default(),
//!     Arc::new(TransferProgress::new()),
//! );
//!
//! upload(&ctx, Path::new("./data"), Path::new("/vault/data")).unwrap();
//! workers.join();
//!
//! for failure in workers.take_failures() {
//!     eprintln!("failed: {failure}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fs;
pub mod pool;
pub mod progress;
pub mod remote;
pub mod transfer;

// Re-export commonly used types
pub use config::{RemoteConfig, UploadConfig};
pub use dispatch::{WorkerHandle, WorkerPool};
pub use error::{ParputError, Result};
pub use pool::{ConnectionLease, ConnectionPool};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use parput::prelude::*;
    //! ```

    pub use crate::config::{RemoteConfig, UploadConfig};
    pub use crate::dispatch::{WorkerHandle, WorkerPool};
    pub use crate::error::{ParputError, Result};
    pub use crate::fs::{survey, Survey};
    pub use crate::pool::{ConnectionLease, ConnectionPool, PoolStats};
    pub use crate::progress::{ProgressSnapshot, TransferProgress};
    pub use crate::remote::{Connection, MemoryStore, SftpConnection};
    pub use crate::transfer::{upload, upload_file, TransferSettings, UploadContext};
}
