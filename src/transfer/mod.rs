//! Transfer orchestration
//!
//! Chunk planning, single-file upload, and directory tree replication,
//! built on the connection pool and the worker pool.

mod plan;
mod tree;
mod upload;

pub use plan::{ChunkRange, TransferPlan};
pub use tree::upload;
pub use upload::{upload_file, TransferSettings, UploadContext};
