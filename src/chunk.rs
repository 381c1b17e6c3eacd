use std::fs;
use std::io;
use std::io::prelude::*;

use tempfile;

use crate::record::{Record, RecordReader, RECORD_SIZE};

/// Sorted run of records spilled to an anonymous temporary file as raw back-to-back records.
pub struct SortedChunk {
    reader: RecordReader<io::Take<io::BufReader<fs::File>>>,
    len: u64,
}

impl SortedChunk {
    /// Writes already sorted records to a new temporary file in `dir` and reopens it for reading.
    pub fn build(
        dir: &tempfile::TempDir,
        records: impl IntoIterator<Item = Record>,
        buf_size: Option<usize>,
    ) -> io::Result<Self> {
        let tmp_file = tempfile::tempfile_in(dir)?;

        let mut chunk_writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, tmp_file.try_clone()?),
            None => io::BufWriter::new(tmp_file.try_clone()?),
        };

        let mut len = 0;
        for record in records.into_iter() {
            chunk_writer.write_all(record.as_bytes())?;
            len += 1;
        }
        chunk_writer.flush()?;

        let mut chunk_reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, tmp_file.try_clone()?),
            None => io::BufReader::new(tmp_file.try_clone()?),
        };
        chunk_reader.rewind()?;

        return Ok(SortedChunk {
            reader: RecordReader::new(chunk_reader.take(len * RECORD_SIZE as u64)),
            len,
        });
    }

    /// Number of records in the run.
    pub fn len(&self) -> u64 {
        self.len
    }
}

impl Iterator for SortedChunk {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next()
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::SortedChunk;
    use crate::record::{Record, RECORD_SIZE};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    #[rstest]
    #[case(None)]
    #[case(Some(256))]
    fn test_sorted_chunk(tmp_dir: tempfile::TempDir, #[case] buf_size: Option<usize>) {
        let saved: Vec<Record> = (0..100u8).map(|i| Record::new([i; RECORD_SIZE])).collect();

        let chunk = SortedChunk::build(&tmp_dir, saved.clone(), buf_size).unwrap();
        assert_eq!(chunk.len(), 100);

        let restored: Result<Vec<Record>, std::io::Error> = chunk.collect();
        assert_eq!(restored.unwrap(), saved);
    }
}
