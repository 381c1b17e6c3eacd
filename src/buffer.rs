//! Aggregation buffer.

use rayon;

use crate::record::{Record, RECORD_SIZE};

/// Aggregation buffer builder.
#[derive(Debug, Clone, Copy)]
pub struct RecordBufferBuilder {
    record_limit: usize,
    preallocate: bool,
}

impl RecordBufferBuilder {
    /// Creates a builder of buffers holding at most `record_limit` records.
    pub fn new(record_limit: usize, preallocate: bool) -> Self {
        RecordBufferBuilder {
            record_limit: record_limit.max(1),
            preallocate,
        }
    }

    /// Creates a builder of buffers holding at most `mem_limit` bytes of records.
    pub fn with_mem_limit(mem_limit: u64) -> Self {
        let record_limit = usize::try_from(mem_limit / RECORD_SIZE as u64).unwrap_or(usize::MAX);
        RecordBufferBuilder::new(record_limit, false)
    }

    pub fn record_limit(&self) -> usize {
        self.record_limit
    }

    pub fn build(&self) -> RecordBuffer {
        if self.preallocate {
            RecordBuffer::with_capacity(self.record_limit)
        } else {
            RecordBuffer::new(self.record_limit)
        }
    }
}

impl Default for RecordBufferBuilder {
    /// Unlimited buffer: all received records are kept in memory.
    fn default() -> Self {
        RecordBufferBuilder {
            record_limit: usize::MAX,
            preallocate: false,
        }
    }
}

/// Buffer of received records limited by record count.
pub struct RecordBuffer {
    limit: usize,
    inner: Vec<Record>,
}

impl RecordBuffer {
    pub fn new(limit: usize) -> Self {
        RecordBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        RecordBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.inner.push(record);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }
}

impl IntoIterator for RecordBuffer {
    type Item = Record;
    type IntoIter = <Vec<Record> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl rayon::slice::ParallelSliceMut<Record> for RecordBuffer {
    fn as_parallel_slice_mut(&mut self) -> &mut [Record] {
        self.inner.as_mut_slice()
    }
}
