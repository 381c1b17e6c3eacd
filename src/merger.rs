//! Sorted runs merger.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;
use std::vec;

use crate::chunk::SortedChunk;
use crate::record::Record;

/// Ascending sequence of records, either still in memory or spilled to disk.
pub enum SortedRun {
    Memory(vec::IntoIter<Record>),
    Spilled(SortedChunk),
}

impl Iterator for SortedRun {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SortedRun::Memory(records) => records.next().map(Ok),
            SortedRun::Spilled(chunk) => chunk.next(),
        }
    }
}

/// Binary heap merger.
/// Merges multiple sorted runs into a single sorted output.
/// Time complexity is *m* \* log(*n*) in worst case where *m* is the number of records,
/// *n* is the number of runs.
pub struct RecordMerger {
    // binary heap is max-heap by default so we reverse it to convert it to min-heap
    items: BinaryHeap<(Reverse<Record>, usize)>,
    runs: Vec<SortedRun>,
    initiated: bool,
    // spilled runs live in this directory
    _tmp_dir: Option<tempfile::TempDir>,
}

impl RecordMerger {
    /// Creates a merger over runs sorted in ascending order, otherwise the result is undefined.
    pub fn new(runs: Vec<SortedRun>, tmp_dir: Option<tempfile::TempDir>) -> Self {
        let items = BinaryHeap::with_capacity(runs.len());

        return RecordMerger {
            runs,
            items,
            initiated: false,
            _tmp_dir: tmp_dir,
        };
    }

    pub fn runs(&self) -> usize {
        self.runs.len()
    }
}

impl Iterator for RecordMerger {
    type Item = io::Result<Record>;

    /// Returns the next record from the runs in ascending order.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            for (idx, run) in self.runs.iter_mut().enumerate() {
                if let Some(record) = run.next() {
                    match record {
                        Ok(record) => self.items.push((Reverse(record), idx)),
                        Err(err) => return Some(Err(err)),
                    }
                }
            }
            self.initiated = true;
        }

        let (result, idx) = self.items.pop()?;
        if let Some(record) = self.runs[idx].next() {
            match record {
                Ok(record) => self.items.push((Reverse(record), idx)),
                Err(err) => return Some(Err(err)),
            }
        }

        return Some(Ok(result.0));
    }
}
