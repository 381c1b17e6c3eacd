//! Local sorter and partition writer.

use std::io;
use std::io::prelude::*;
use std::path::Path;

use log;
use rayon::slice::ParallelSliceMut;

use crate::buffer::{RecordBuffer, RecordBufferBuilder};
use crate::chunk::SortedChunk;
use crate::error::NetSortError;
use crate::merger::{RecordMerger, SortedRun};
use crate::record::Record;

/// Local sorter.
///
/// Accumulates the records received by this node. Whenever the buffer reaches its limit the
/// buffered records are sorted and spilled to a temporary file; [`LocalSorter::finish`] sorts the
/// rest and merges all runs into one ascending stream.
pub struct LocalSorter {
    /// Sorting thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store spilled runs.
    tmp_dir: tempfile::TempDir,
    /// Aggregation buffer builder.
    buffer_builder: RecordBufferBuilder,
    /// Spilled run file read/write buffer size.
    rw_buf_size: Option<usize>,

    buffer: RecordBuffer,
    spilled: Vec<SortedChunk>,
    received: u64,
}

impl LocalSorter {
    /// Creates a new local sorter instance.
    ///
    /// # Arguments
    /// * `threads_number` - Number of threads to be used to sort data in parallel. If the parameter is [`None`]
    ///   threads number will be selected based on available CPU core number.
    /// * `tmp_path` - Directory to be used to store spilled runs. If parameter is [`None`] default OS temporary
    ///   directory will be used.
    /// * `buffer_builder` - Builder of the aggregation buffer.
    /// * `rw_buf_size` - Spilled runs file read/write buffer size.
    pub fn new(
        threads_number: Option<usize>,
        tmp_path: Option<&Path>,
        buffer_builder: RecordBufferBuilder,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, NetSortError> {
        return Ok(LocalSorter {
            rw_buf_size,
            buffer: buffer_builder.build(),
            buffer_builder,
            thread_pool: Self::init_thread_pool(threads_number)?,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            spilled: Vec::new(),
            received: 0,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, NetSortError> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| NetSortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, NetSortError> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| NetSortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Adds a received record, spilling the buffer if it is full.
    pub fn push(&mut self, record: Record) -> Result<(), NetSortError> {
        self.buffer.push(record);
        self.received += 1;

        if self.buffer.is_full() {
            self.spill()?;
        }
        Ok(())
    }

    /// Number of records received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    fn sort_buffer(&self, buffer: &mut RecordBuffer) {
        self.thread_pool.install(|| {
            buffer.par_sort_unstable_by(Record::cmp_by_key);
        });
    }

    fn spill(&mut self) -> Result<(), NetSortError> {
        let mut buffer = std::mem::replace(&mut self.buffer, self.buffer_builder.build());

        log::debug!("sorting {} buffered records ...", buffer.len());
        self.sort_buffer(&mut buffer);

        log::debug!("spilling sorted run #{}", self.spilled.len());
        let chunk = SortedChunk::build(&self.tmp_dir, buffer, self.rw_buf_size).map_err(NetSortError::Spill)?;
        self.spilled.push(chunk);

        Ok(())
    }

    /// Sorts the remaining buffered records and returns the ascending stream of every record received.
    pub fn finish(self) -> RecordMerger {
        let LocalSorter {
            thread_pool,
            tmp_dir,
            mut buffer,
            spilled,
            received,
            ..
        } = self;

        log::debug!("sorting {} buffered records ...", buffer.len());
        thread_pool.install(|| {
            buffer.par_sort_unstable_by(Record::cmp_by_key);
        });

        let mut runs: Vec<SortedRun> = spilled.into_iter().map(SortedRun::Spilled).collect();
        if !buffer.is_empty() {
            runs.push(SortedRun::Memory(buffer.into_iter()));
        }
        log::info!("local sort done ({} records, {} runs)", received, runs.len());

        return RecordMerger::new(runs, Some(tmp_dir));
    }
}

/// Writes sorted records back-to-back with no framing or separators.
/// Returns the number of records written.
pub fn write_partition<I, W>(records: I, writer: &mut W) -> Result<u64, NetSortError>
where
    I: IntoIterator<Item = io::Result<Record>>,
    W: Write,
{
    let mut written = 0;
    for record in records.into_iter() {
        let record = record.map_err(NetSortError::Spill)?;
        writer.write_all(record.as_bytes()).map_err(NetSortError::Output)?;
        written += 1;
    }
    writer.flush().map_err(NetSortError::Output)?;

    return Ok(written);
}
