//! Fixed-size wire frames.
//!
//! Every frame is exactly [`FRAME_SIZE`] bytes: a tag byte followed by a 100-byte body.
//! A data frame (tag `0`) carries one record as its body. An end-of-stream frame (tag `1`)
//! carries a 4-byte nonce followed by zero padding; its body is never inspected by readers.

use std::io;
use std::io::prelude::*;

use crate::error::NetSortError;
use crate::record::{Record, RECORD_SIZE};

/// Frame size in bytes.
pub const FRAME_SIZE: usize = RECORD_SIZE + 1;

const DATA_TAG: u8 = 0;
const END_OF_STREAM_TAG: u8 = 1;

/// Wire protocol unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A record routed to the receiving node.
    Data(Record),
    /// The sender has no more records for the receiving node.
    EndOfStream,
}

impl Frame {
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut buf = [0u8; FRAME_SIZE];
        match self {
            Frame::Data(record) => {
                buf[0] = DATA_TAG;
                buf[1..].copy_from_slice(record.as_bytes());
            }
            Frame::EndOfStream => {
                // nonce and padding are left zeroed
                buf[0] = END_OF_STREAM_TAG;
            }
        }
        buf
    }

    pub fn decode(buf: &[u8; FRAME_SIZE]) -> Result<Frame, NetSortError> {
        match buf[0] {
            DATA_TAG => {
                let mut body = [0u8; RECORD_SIZE];
                body.copy_from_slice(&buf[1..]);
                Ok(Frame::Data(Record::new(body)))
            }
            END_OF_STREAM_TAG => Ok(Frame::EndOfStream),
            tag => Err(NetSortError::Protocol(format!("unknown frame tag {}", tag))),
        }
    }

    /// Writes the whole frame immediately, without batching it with other frames.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), NetSortError> {
        writer.write_all(&self.encode()).map_err(NetSortError::Transport)
    }

    /// Reads exactly one frame. A stream closed mid-frame or between frames is a transport error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Frame, NetSortError> {
        let mut buf = [0u8; FRAME_SIZE];
        reader.read_exact(&mut buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => NetSortError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before end-of-stream frame",
            )),
            _ => NetSortError::Transport(err),
        })?;

        Frame::decode(&buf)
    }
}

#[cfg(test)]
mod test {
    use rand::Rng;
    use rstest::*;

    use super::{Frame, FRAME_SIZE};
    use crate::error::NetSortError;
    use crate::record::{Record, RECORD_SIZE};

    #[test]
    fn test_data_frame() {
        let mut bytes = [0u8; RECORD_SIZE];
        rand::thread_rng().fill(&mut bytes[..]);
        let record = Record::new(bytes);

        let encoded = Frame::Data(record.clone()).encode();
        assert_eq!(encoded[0], 0);
        assert_eq!(encoded[1..], bytes[..]);
        assert_eq!(Frame::decode(&encoded).unwrap(), Frame::Data(record));
    }

    #[rstest]
    #[case([0u8; 4])]
    #[case([0xde, 0xad, 0xbe, 0xef])]
    fn test_end_of_stream_ignores_body(#[case] nonce: [u8; 4]) {
        let mut buf = [0xaau8; FRAME_SIZE];
        buf[0] = 1;
        buf[1..5].copy_from_slice(&nonce);
        assert_eq!(Frame::decode(&buf).unwrap(), Frame::EndOfStream);

        let encoded = Frame::EndOfStream.encode();
        assert_eq!(encoded.len(), FRAME_SIZE);
        assert_eq!(encoded[0], 1);
    }

    #[test]
    fn test_unknown_tag() {
        let mut buf = [0u8; FRAME_SIZE];
        buf[0] = 2;
        assert!(matches!(Frame::decode(&buf), Err(NetSortError::Protocol(_))));
    }

    #[test]
    fn test_stream() {
        let record = Record::new([7u8; RECORD_SIZE]);
        let mut wire = Vec::new();
        Frame::Data(record.clone()).write_to(&mut wire).unwrap();
        Frame::EndOfStream.write_to(&mut wire).unwrap();
        assert_eq!(wire.len(), 2 * FRAME_SIZE);

        let mut reader = wire.as_slice();
        assert_eq!(Frame::read_from(&mut reader).unwrap(), Frame::Data(record));
        assert_eq!(Frame::read_from(&mut reader).unwrap(), Frame::EndOfStream);
        assert!(matches!(Frame::read_from(&mut reader), Err(NetSortError::Transport(_))));
    }

    #[test]
    fn test_short_frame() {
        let wire = [0u8; FRAME_SIZE - 1];
        assert!(matches!(Frame::read_from(&mut &wire[..]), Err(NetSortError::Transport(_))));
    }
}
