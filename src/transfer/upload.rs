//! Single-file upload: streamed or chunked
//!
//! Small files are streamed through one leased connection. Large files
//! are split by a [`TransferPlan`] and written by independent chunk
//! tasks, each leasing its own connection and writing its byte range
//! through a positioned handle. Chunk tasks fail independently; a failed
//! chunk leaves the object partial and is reported through the worker
//! pool's failure log.

use crate::dispatch::WorkerHandle;
use crate::error::{IoResultExt, ParputError, Result};
use crate::pool::{ConnectionLease, ConnectionPool};
use crate::progress::TransferProgress;
use crate::remote::Connection;
use crate::transfer::plan::{ChunkRange, TransferPlan};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tuning knobs for a transfer run
#[derive(Debug, Clone, Copy)]
pub struct TransferSettings {
    /// Parts a large file is split into
    pub parts: usize,
    /// Minimum file size for chunked transfer
    pub chunk_threshold: u64,
    /// Copy buffer size
    pub buffer_size: usize,
    /// Bound on the wait for a free connection
    pub acquire_timeout: Option<Duration>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            parts: crate::config::DEFAULT_CONNECTIONS,
            chunk_threshold: crate::config::DEFAULT_CHUNK_THRESHOLD,
            buffer_size: crate::config::DEFAULT_BUFFER_SIZE,
            acquire_timeout: None,
        }
    }
}

impl From<&crate::config::UploadConfig> for TransferSettings {
    fn from(config: &crate::config::UploadConfig) -> Self {
        Self {
            parts: config.effective_parts(),
            chunk_threshold: config.chunk_threshold,
            buffer_size: config.buffer_size,
            acquire_timeout: config.acquire_timeout(),
        }
    }
}

/// Everything an upload task needs, passed explicitly into every closure
pub struct UploadContext<C: Connection + 'static> {
    pool: Arc<ConnectionPool<C>>,
    workers: WorkerHandle,
    settings: TransferSettings,
    progress: Arc<TransferProgress>,
}

// Derived Clone would require C: Clone; the context only holds handles.
impl<C: Connection + 'static> Clone for UploadContext<C> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            workers: self.workers.clone(),
            settings: self.settings,
            progress: Arc::clone(&self.progress),
        }
    }
}

impl<C: Connection + 'static> UploadContext<C> {
    /// Bundle a pool, a worker handle, settings, and a progress tracker
    pub fn new(
        pool: Arc<ConnectionPool<C>>,
        workers: WorkerHandle,
        settings: TransferSettings,
        progress: Arc<TransferProgress>,
    ) -> Self {
        Self {
            pool,
            workers,
            settings,
            progress,
        }
    }

    /// Lease a connection, honoring the configured acquisition bound
    pub fn lease(&self) -> Result<ConnectionLease<'_, C>> {
        match self.settings.acquire_timeout {
            None => Ok(self.pool.acquire()),
            Some(timeout) => self
                .pool
                .acquire_timeout(timeout)
                .ok_or(ParputError::AcquireTimeout(timeout)),
        }
    }

    /// Worker handle for submitting follow-up tasks
    pub fn workers(&self) -> &WorkerHandle {
        &self.workers
    }

    /// Settings for this run
    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Progress counters for this run
    pub fn progress(&self) -> &TransferProgress {
        &self.progress
    }
}

/// Upload one local file to `remote`.
///
/// Empty files become empty remote objects with no chunk tasks. Files
/// below the chunk threshold are streamed over a single lease. Larger
/// files are created once up front, then written by one task per planned
/// chunk; this call returns as soon as the chunk tasks are submitted.
pub fn upload_file<C: Connection + 'static>(
    ctx: &UploadContext<C>,
    local: &Path,
    remote: &Path,
) -> Result<()> {
    let size = std::fs::metadata(local).with_path(local)?.len();

    if size == 0 {
        let lease = ctx.lease()?;
        lease.create(remote)?;
        ctx.progress.add_file();
        debug!(local = %local.display(), remote = %remote.display(), "created empty object");
        return Ok(());
    }

    if size < ctx.settings.chunk_threshold {
        upload_streamed(ctx, local, remote, size)
    } else {
        upload_chunked(ctx, local, remote, size)
    }
}

/// Stream the whole file through one leased connection
fn upload_streamed<C: Connection + 'static>(
    ctx: &UploadContext<C>,
    local: &Path,
    remote: &Path,
    size: u64,
) -> Result<()> {
    let file = File::open(local).with_path(local)?;
    let mut reader = BufReader::with_capacity(ctx.settings.buffer_size, file);

    let lease = ctx.lease()?;
    let mut object = lease.create(remote)?;

    let mut buf = vec![0u8; ctx.settings.buffer_size];
    loop {
        let n = reader.read(&mut buf).with_path(local)?;
        if n == 0 {
            break;
        }
        object
            .write_all(&buf[..n])
            .map_err(|e| write_error(remote, e))?;
        ctx.progress.add_bytes(n as u64);
    }

    ctx.progress.add_file();
    debug!(local = %local.display(), remote = %remote.display(), size, "streamed upload complete");
    Ok(())
}

/// Split the file and submit one task per chunk
fn upload_chunked<C: Connection + 'static>(
    ctx: &UploadContext<C>,
    local: &Path,
    remote: &Path,
    size: u64,
) -> Result<()> {
    {
        // Create/truncate the destination once, before any chunk writer
        // opens it, so concurrent positioned opens never race on creation.
        let lease = ctx.lease()?;
        drop(lease.create(remote)?);
    }

    let plan = TransferPlan::new(size, ctx.settings.parts);
    debug!(
        local = %local.display(),
        remote = %remote.display(),
        size,
        chunks = plan.len(),
        chunk_size = plan.chunk_size(),
        "submitting chunked upload"
    );

    for range in plan.ranges().iter().copied() {
        let task_ctx = ctx.clone();
        let local = local.to_path_buf();
        let remote = remote.to_path_buf();
        ctx.workers.submit(move || {
            upload_chunk(&task_ctx, &local, &remote, range)
        });
    }

    ctx.progress.add_file();
    Ok(())
}

/// Write exactly one chunk of `local` to the matching range of `remote`
fn upload_chunk<C: Connection + 'static>(
    ctx: &UploadContext<C>,
    local: &Path,
    remote: &Path,
    range: ChunkRange,
) -> Result<()> {
    let mut file = File::open(local).with_path(local)?;
    file.seek(SeekFrom::Start(range.offset)).with_path(local)?;

    let lease = ctx.lease()?;
    let mut object = lease.open_write(remote)?;
    object
        .seek(SeekFrom::Start(range.offset))
        .map_err(|e| write_error(remote, e))?;

    let mut buf = vec![0u8; ctx.settings.buffer_size];
    let mut remaining = range.len;
    while remaining > 0 {
        let want = buf.len().min(remaining as usize);
        let n = file.read(&mut buf[..want]).with_path(local)?;
        if n == 0 {
            // The local file shrank under us; the range can no longer be
            // satisfied.
            return Err(ParputError::ShortRead {
                path: local.to_path_buf(),
                expected: range.len,
                actual: range.len - remaining,
            });
        }
        object
            .write_all(&buf[..n])
            .map_err(|e| write_error(remote, e))?;
        ctx.progress.add_bytes(n as u64);
        remaining -= n as u64;
    }

    Ok(())
}

fn write_error(remote: &Path, e: std::io::Error) -> ParputError {
    ParputError::remote(format!("write to '{}' failed: {e}", remote.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::WorkerPool;
    use crate::remote::{MemoryConnection, MemoryStore};
    use std::io::Write as _;

    fn context(
        store: &MemoryStore,
        workers: &WorkerPool,
        settings: TransferSettings,
    ) -> UploadContext<MemoryConnection> {
        let pool = Arc::new(ConnectionPool::new(2, store.connector()).unwrap());
        UploadContext::new(
            pool,
            workers.handle(),
            settings,
            Arc::new(TransferProgress::new()),
        )
    }

    fn write_fixture(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    /// Deterministic non-repeating content so off-by-one chunk bugs show up.
    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_zero_byte_file_creates_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_fixture(dir.path(), "empty.bin", b"");

        let store = MemoryStore::new();
        let workers = WorkerPool::new(2);
        let ctx = context(&store, &workers, TransferSettings::default());

        upload_file(&ctx, &local, Path::new("/vault/empty.bin")).unwrap();
        workers.join();

        assert_eq!(store.object("/vault/empty.bin").unwrap(), Vec::<u8>::new());
        assert!(workers.take_failures().is_empty());
        assert_eq!(ctx.progress().snapshot().files, 1);
    }

    #[test]
    fn test_small_file_streams_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let content = patterned(10_000);
        let local = write_fixture(dir.path(), "small.bin", &content);

        let store = MemoryStore::new();
        let workers = WorkerPool::new(2);
        let ctx = context(&store, &workers, TransferSettings::default());

        upload_file(&ctx, &local, Path::new("/vault/small.bin")).unwrap();
        workers.join();

        assert_eq!(store.object("/vault/small.bin").unwrap(), content);
        assert_eq!(ctx.progress().snapshot().bytes, 10_000);
    }

    #[test]
    fn test_chunked_upload_with_remainder() {
        let dir = tempfile::tempdir().unwrap();
        // 4 parts of 25_001 bytes plus a 3-byte remainder.
        let content = patterned(100_007);
        let local = write_fixture(dir.path(), "big.bin", &content);

        let store = MemoryStore::new();
        let workers = WorkerPool::new(4);
        let settings = TransferSettings {
            parts: 4,
            chunk_threshold: 1,
            buffer_size: 4096,
            acquire_timeout: None,
        };
        let ctx = context(&store, &workers, settings);

        upload_file(&ctx, &local, Path::new("/vault/big.bin")).unwrap();
        workers.join();

        assert_eq!(store.object("/vault/big.bin").unwrap(), content);
        assert!(workers.take_failures().is_empty());
        assert_eq!(ctx.progress().snapshot().bytes, 100_007);
    }

    #[test]
    fn test_chunked_upload_smaller_than_part_count() {
        let dir = tempfile::tempdir().unwrap();
        let content = b"ab".to_vec();
        let local = write_fixture(dir.path(), "tiny.bin", &content);

        let store = MemoryStore::new();
        let workers = WorkerPool::new(2);
        let settings = TransferSettings {
            parts: 8,
            chunk_threshold: 1,
            buffer_size: 64,
            acquire_timeout: None,
        };
        let ctx = context(&store, &workers, settings);

        upload_file(&ctx, &local, Path::new("/vault/tiny.bin")).unwrap();
        workers.join();

        assert_eq!(store.object("/vault/tiny.bin").unwrap(), content);
    }

    #[test]
    fn test_chunked_upload_truncates_previous_object() {
        let dir = tempfile::tempdir().unwrap();
        let content = patterned(50_000);
        let local = write_fixture(dir.path(), "file.bin", &content);

        let store = MemoryStore::new();
        {
            let conn = store.connect();
            let mut old = conn.create(Path::new("/vault/file.bin")).unwrap();
            old.write_all(&vec![0xFFu8; 200_000]).unwrap();
        }

        let workers = WorkerPool::new(4);
        let settings = TransferSettings {
            parts: 4,
            chunk_threshold: 1,
            buffer_size: 4096,
            acquire_timeout: None,
        };
        let ctx = context(&store, &workers, settings);

        upload_file(&ctx, &local, Path::new("/vault/file.bin")).unwrap();
        workers.join();

        // The up-front create drops the stale 200k tail.
        assert_eq!(store.object("/vault/file.bin").unwrap(), content);
    }

    #[test]
    fn test_missing_local_file_is_an_error() {
        let store = MemoryStore::new();
        let workers = WorkerPool::new(1);
        let ctx = context(&store, &workers, TransferSettings::default());

        let err = upload_file(
            &ctx,
            Path::new("/no/such/file"),
            Path::new("/vault/missing"),
        )
        .unwrap_err();
        assert!(matches!(err, ParputError::Io { .. }));
        assert!(store.object_paths().is_empty());
    }
}
