//! Chunk planning for large-file transfers
//!
//! A plan partitions `[0, file_size)` into `part_count` equal chunks plus
//! one remainder chunk. Chunks are disjoint and contiguous, so writers can
//! run in any order on independent positioned handles.

/// One contiguous byte range of a file, assigned to one upload task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Byte offset into the file
    pub offset: u64,
    /// Number of bytes in this chunk, always non-zero
    pub len: u64,
}

impl ChunkRange {
    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Partition of a file into upload chunks
#[derive(Debug, Clone)]
pub struct TransferPlan {
    file_size: u64,
    chunk_size: u64,
    ranges: Vec<ChunkRange>,
}

impl TransferPlan {
    /// Split `file_size` bytes into `part_count` chunks plus remainder.
    ///
    /// A part count of zero is treated as one. Parts that would be empty
    /// (`file_size < part_count`) are dropped rather than scheduled as
    /// degenerate zero-byte writes.
    pub fn new(file_size: u64, part_count: usize) -> Self {
        let part_count = part_count.max(1) as u64;
        let chunk_size = file_size / part_count;
        let remainder = file_size % part_count;

        let mut ranges = Vec::new();
        if chunk_size > 0 {
            for i in 0..part_count {
                ranges.push(ChunkRange {
                    offset: i * chunk_size,
                    len: chunk_size,
                });
            }
        }
        if remainder > 0 {
            ranges.push(ChunkRange {
                offset: part_count * chunk_size,
                len: remainder,
            });
        }

        Self {
            file_size,
            chunk_size,
            ranges,
        }
    }

    /// The planned chunks, in offset order
    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    /// Size of the equal parts (zero when `file_size < part_count`)
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Total bytes covered by the plan
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of chunk tasks this plan schedules
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True for empty files, which schedule no chunk tasks
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
