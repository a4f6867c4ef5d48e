//! In-memory remote backend
//!
//! A process-local stand-in for the remote store, used by tests and
//! benchmarks. Objects live in a shared map; collection creations are
//! counted per path so tests can assert how often each was issued.

use crate::error::{ParputError, Result};
use crate::remote::{Connection, ObjectWrite};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<PathBuf, Vec<u8>>,
    collections: BTreeSet<PathBuf>,
    collection_calls: BTreeMap<PathBuf, usize>,
}

/// Shared in-memory store; `connect` hands out connections the way an
/// endpoint hands out sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection to this store; never fails
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            state: Arc::clone(&self.state),
        }
    }

    /// Read back an object's bytes, if present
    pub fn object(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(path.as_ref())
            .cloned()
    }

    /// All object paths, sorted
    pub fn object_paths(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    /// Whether a collection exists at `path`
    pub fn has_collection(&self, path: impl AsRef<Path>) -> bool {
        self.state
            .lock()
            .unwrap()
            .collections
            .contains(path.as_ref())
    }

    /// How many `create_collection` calls named `path` exactly
    pub fn collection_calls(&self, path: impl AsRef<Path>) -> usize {
        self.state
            .lock()
            .unwrap()
            .collection_calls
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Factory closure suitable for pool construction
    pub fn connector(&self) -> impl Fn() -> Result<MemoryConnection> + Send + Sync + 'static {
        let store = self.clone();
        move || Ok::<_, ParputError>(store.connect())
    }
}

/// One connection to a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    state: Arc<Mutex<StoreState>>,
}

impl Connection for MemoryConnection {
    fn create(&self, path: &Path) -> Result<Box<dyn ObjectWrite>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            pos: 0,
        }))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn ObjectWrite>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .entry(path.to_path_buf())
            .or_default();
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            path: path.to_path_buf(),
            pos: 0,
        }))
    }

    fn create_collection(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        *state
            .collection_calls
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            state.collections.insert(current.clone());
        }

        Ok(())
    }
}

/// Positioned writer into one in-memory object
struct MemoryWriter {
    state: Arc<Mutex<StoreState>>,
    path: PathBuf,
    pos: u64,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let object = state
            .objects
            .get_mut(&self.path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "object removed"))?;

        let start = self.pos as usize;
        let end = start + buf.len();
        if object.len() < end {
            object.resize(end, 0);
        }
        object[start..end].copy_from_slice(buf);
        self.pos = end as u64;

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = {
            let state = self.state.lock().unwrap();
            state.objects.get(&self.path).map(|o| o.len()).unwrap_or(0) as i64
        };

        let next = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };

        if next < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of object",
            ));
        }

        self.pos = next as u64;
        Ok(self.pos)
    }
}
