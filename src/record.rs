//! Fixed-size binary record.

use std::fmt;
use std::io;
use std::io::prelude::*;

/// Record size in bytes.
pub const RECORD_SIZE: usize = 100;
/// Record key size in bytes. The rest of the record is an opaque payload.
pub const KEY_SIZE: usize = 10;

/// A 100-byte record: a 10-byte sort key followed by a 90-byte payload.
///
/// Records compare lexicographically over all of their bytes, so the ordering is consistent
/// with the key ordering and equal keys are ordered by payload.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Record([u8; RECORD_SIZE]);

impl Record {
    pub fn new(bytes: [u8; RECORD_SIZE]) -> Self {
        Record(bytes)
    }

    /// Builds a record from a slice that must be exactly [`RECORD_SIZE`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; RECORD_SIZE] = bytes.try_into().ok()?;
        Some(Record(bytes))
    }

    pub fn key(&self) -> &[u8] {
        &self.0[..KEY_SIZE]
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[KEY_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }

    /// Compares two records by key only.
    pub fn cmp_by_key(a: &Record, b: &Record) -> std::cmp::Ordering {
        a.key().cmp(b.key())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record(key=")?;
        for byte in self.key() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Reads a stream of back-to-back records.
///
/// The stream length must be a multiple of [`RECORD_SIZE`]: a clean end of stream finishes
/// the iteration, a trailing partial record is reported as an [`io::ErrorKind::UnexpectedEof`] error.
pub struct RecordReader<R> {
    reader: R,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        RecordReader { reader, done: false }
    }

    fn read_record(&mut self) -> io::Result<Option<Record>> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;

        while filled < RECORD_SIZE {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        match filled {
            0 => Ok(None),
            RECORD_SIZE => Ok(Some(Record(buf))),
            n => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated record: {} of {} bytes", n, RECORD_SIZE),
            )),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
