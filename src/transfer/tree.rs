//! Directory tree replication
//!
//! Mirrors a local subtree into a remote collection hierarchy. The
//! collection for a directory is always created before any task writing
//! into it is submitted; beyond that, sibling entries and file chunks
//! complete in any order. Recursion into subdirectories happens inside
//! worker tasks, so traversal itself runs in parallel.

use crate::error::{IoResultExt, ParputError, Result};
use crate::remote::Connection;
use crate::transfer::upload::{upload_file, UploadContext};
use std::path::Path;
use tracing::{debug, info};

/// Upload a local file or directory tree to `remote`.
///
/// This is the single entry point callers use; completion of the whole
/// tree is observed by joining the worker pool afterwards.
pub fn upload<C: Connection + 'static>(
    ctx: &UploadContext<C>,
    local: &Path,
    remote: &Path,
) -> Result<()> {
    let metadata = std::fs::metadata(local).with_path(local)?;

    if metadata.is_file() {
        info!(local = %local.display(), remote = %remote.display(), "uploading file");
        upload_file(ctx, local, remote)
    } else if metadata.is_dir() {
        info!(local = %local.display(), remote = %remote.display(), "replicating directory tree");
        create_collection(ctx, remote)?;
        replicate_directory(ctx, local, remote)
    } else {
        Err(ParputError::UnsupportedFileType {
            path: local.to_path_buf(),
            file_type: format!("{:?}", metadata.file_type()),
        })
    }
}

/// Create the remote collection for one directory
fn create_collection<C: Connection + 'static>(ctx: &UploadContext<C>, remote: &Path) -> Result<()> {
    {
        let lease = ctx.lease()?;
        lease.create_collection(remote)?;
    }
    ctx.progress().add_collection();
    debug!(remote = %remote.display(), "collection created");
    Ok(())
}

/// Submit one task per directory entry.
///
/// File entries upload through [`upload_file`]; subdirectories create
/// their collection and recurse inside the worker task, so no child
/// write task exists before its collection-create has been issued.
fn replicate_directory<C: Connection + 'static>(
    ctx: &UploadContext<C>,
    local_dir: &Path,
    remote_dir: &Path,
) -> Result<()> {
    for entry in std::fs::read_dir(local_dir).with_path(local_dir)? {
        let entry = entry.with_path(local_dir)?;
        let path = entry.path();
        let file_type = entry.file_type().with_path(&path)?;
        let remote_child = remote_dir.join(entry.file_name());

        if file_type.is_file() {
            let task_ctx = ctx.clone();
            ctx.workers().submit(move || {
                upload_file(&task_ctx, &path, &remote_child)
            });
        } else if file_type.is_dir() {
            let task_ctx = ctx.clone();
            ctx.workers().submit(move || {
                create_collection(&task_ctx, &remote_child)?;
                replicate_directory(&task_ctx, &path, &remote_child)
            });
        } else {
            debug!(path = %path.display(), "skipping non-regular entry");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::WorkerPool;
    use crate::pool::ConnectionPool;
    use crate::progress::TransferProgress;
    use crate::remote::{MemoryConnection, MemoryStore};
    use crate::transfer::upload::TransferSettings;
    use std::fs;
    use std::io::Write as _;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn context(
        store: &MemoryStore,
        workers: &WorkerPool,
        settings: TransferSettings,
    ) -> UploadContext<MemoryConnection> {
        let pool = Arc::new(ConnectionPool::new(3, store.connector()).unwrap());
        UploadContext::new(
            pool,
            workers.handle(),
            settings,
            Arc::new(TransferProgress::new()),
        )
    }

    fn write_file(path: &Path, content: &[u8]) {
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content).unwrap();
    }

    /// The reference scenario: root/{a.txt (10 bytes), sub/b.txt (empty)}.
    #[test]
    fn test_tree_replication_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        write_file(&root.join("a.txt"), b"0123456789");
        fs::create_dir(root.join("sub")).unwrap();
        write_file(&root.join("sub/b.txt"), b"");

        let store = MemoryStore::new();
        let workers = WorkerPool::new(4);
        let ctx = context(&store, &workers, TransferSettings::default());

        upload(&ctx, &root, Path::new("/dest")).unwrap();
        workers.join();

        assert!(workers.take_failures().is_empty());
        assert!(store.has_collection("/dest"));
        assert!(store.has_collection("/dest/sub"));
        assert_eq!(store.collection_calls("/dest"), 1);
        assert_eq!(store.collection_calls("/dest/sub"), 1);
        assert_eq!(store.object("/dest/a.txt").unwrap(), b"0123456789");
        assert_eq!(store.object("/dest/sub/b.txt").unwrap(), Vec::<u8>::new());

        let snapshot = ctx.progress().snapshot();
        assert_eq!(snapshot.files, 2);
        assert_eq!(snapshot.collections, 2);
        assert_eq!(snapshot.bytes, 10);
    }

    #[test]
    fn test_each_collection_created_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");

        // Three levels with several files per level.
        let mut expected: Vec<PathBuf> = Vec::new();
        fs::create_dir(&root).unwrap();
        for a in 0..3 {
            let level_a = root.join(format!("a{a}"));
            fs::create_dir(&level_a).unwrap();
            expected.push(PathBuf::from(format!("/dest/a{a}")));
            for b in 0..2 {
                let level_b = level_a.join(format!("b{b}"));
                fs::create_dir(&level_b).unwrap();
                expected.push(PathBuf::from(format!("/dest/a{a}/b{b}")));
                write_file(&level_b.join("data.bin"), &[a as u8; 256]);
            }
        }

        let store = MemoryStore::new();
        let workers = WorkerPool::new(4);
        let ctx = context(&store, &workers, TransferSettings::default());

        upload(&ctx, &root, Path::new("/dest")).unwrap();
        workers.join();

        assert!(workers.take_failures().is_empty());
        assert_eq!(store.collection_calls("/dest"), 1);
        for collection in &expected {
            assert_eq!(store.collection_calls(collection), 1, "{collection:?}");
        }
        assert_eq!(store.object_paths().len(), 6);
    }

    #[test]
    fn test_large_files_inside_tree_are_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        let content: Vec<u8> = (0..80_000).map(|i| (i % 241) as u8).collect();
        write_file(&root.join("big.bin"), &content);

        let store = MemoryStore::new();
        let workers = WorkerPool::new(4);
        let settings = TransferSettings {
            parts: 4,
            chunk_threshold: 1024,
            buffer_size: 4096,
            acquire_timeout: None,
        };
        let ctx = context(&store, &workers, settings);

        upload(&ctx, &root, Path::new("/dest")).unwrap();
        workers.join();

        assert!(workers.take_failures().is_empty());
        assert_eq!(store.object("/dest/big.bin").unwrap(), content);
    }

    #[test]
    fn test_unreadable_entry_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        write_file(&root.join("ok.txt"), b"fine");
        write_file(&root.join("gone.txt"), b"doomed");

        let store = MemoryStore::new();
        let workers = WorkerPool::new(1);
        let ctx = context(&store, &workers, TransferSettings::default());

        // Remove a file between listing and upload: the single worker is
        // held busy while the listing happens, then deletes the victim
        // before its upload task runs.
        let victim = root.join("gone.txt");
        ctx.workers().submit(move || {
            std::thread::sleep(std::time::Duration::from_millis(30));
            fs::remove_file(&victim).unwrap();
            Ok(())
        });

        upload(&ctx, &root, Path::new("/dest")).unwrap();
        workers.join();

        let failures = workers.take_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(store.object("/dest/ok.txt").unwrap(), b"fine");
        assert!(store.object("/dest/gone.txt").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        write_file(&root.join("real.txt"), b"real");
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();

        let store = MemoryStore::new();
        let workers = WorkerPool::new(2);
        let ctx = context(&store, &workers, TransferSettings::default());

        upload(&ctx, &root, Path::new("/dest")).unwrap();
        workers.join();

        assert!(workers.take_failures().is_empty());
        assert_eq!(store.object_paths(), vec![PathBuf::from("/dest/real.txt")]);
    }

    #[test]
    fn test_upload_rejects_special_files() {
        let store = MemoryStore::new();
        let workers = WorkerPool::new(1);
        let ctx = context(&store, &workers, TransferSettings::default());

        let err = upload(&ctx, Path::new("/missing/source"), Path::new("/dest")).unwrap_err();
        assert!(matches!(err, ParputError::Io { .. }));
    }
}
