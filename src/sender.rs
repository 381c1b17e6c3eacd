//! Outbound sender: routes the local input shard to the owning ranks.

use std::io;
use std::io::prelude::*;

use log;

use crate::error::NetSortError;
use crate::frame::Frame;
use crate::partition::Partitioner;
use crate::record::Record;

/// Outbound sending summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendStats {
    /// Records sent to each rank, indexed by rank.
    pub per_rank: Vec<u64>,
}

impl SendStats {
    pub fn total(&self) -> u64 {
        self.per_rank.iter().sum()
    }
}

/// Outbound sender.
pub struct OutboundSender {
    partitioner: Partitioner,
}

impl OutboundSender {
    pub fn new(partitioner: Partitioner) -> Self {
        OutboundSender { partitioner }
    }

    /// Writes every input record as a data frame to the connection of its owning rank, then one
    /// end-of-stream frame to every connection, whether or not it received any data.
    ///
    /// # Arguments
    /// * `records` - Input shard records
    /// * `connections` - One connection per rank, indexed by rank
    pub fn send<I, W>(&self, records: I, connections: &mut [W]) -> Result<SendStats, NetSortError>
    where
        I: IntoIterator<Item = io::Result<Record>>,
        W: Write,
    {
        if connections.len() != self.partitioner.cluster_size() {
            return Err(NetSortError::Config(format!(
                "{} connections for a cluster of {}",
                connections.len(),
                self.partitioner.cluster_size()
            )));
        }

        let mut per_rank = vec![0u64; connections.len()];

        for record in records.into_iter() {
            let record = record.map_err(NetSortError::Input)?;
            let owner = self.partitioner.owner(&record);

            Frame::Data(record).write_to(&mut connections[owner])?;
            per_rank[owner] += 1;
        }
        log::info!("input shard exhausted ({} records)", per_rank.iter().sum::<u64>());

        for connection in connections.iter_mut() {
            Frame::EndOfStream.write_to(connection)?;
            connection.flush().map_err(NetSortError::Transport)?;
        }
        log::debug!("end-of-stream sent to {} peers", connections.len());

        return Ok(SendStats { per_rank });
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::OutboundSender;
    use crate::error::NetSortError;
    use crate::frame::{Frame, FRAME_SIZE};
    use crate::partition::Partitioner;
    use crate::record::{Record, RECORD_SIZE};

    fn record_with_first_byte(first: u8) -> Record {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0] = first;
        bytes[1] = 0x5a;
        Record::new(bytes)
    }

    fn decode_all(mut wire: &[u8]) -> Vec<Frame> {
        assert_eq!(wire.len() % FRAME_SIZE, 0);
        let mut frames = Vec::new();
        while !wire.is_empty() {
            frames.push(Frame::read_from(&mut wire).unwrap());
        }
        frames
    }

    #[rstest]
    #[case(vec![0x00, 0x80, 0x10, 0xf0, 0x7f], vec![3, 2])]
    #[case(vec![0x00, 0x01], vec![2, 0])]
    #[case(vec![], vec![0, 0])]
    fn test_send(#[case] firsts: Vec<u8>, #[case] expected_per_rank: Vec<u64>) {
        let sender = OutboundSender::new(Partitioner::new(2).unwrap());
        let records: Vec<Record> = firsts.iter().map(|&f| record_with_first_byte(f)).collect();
        let mut connections = vec![Vec::new(), Vec::new()];

        let stats = sender
            .send(records.iter().cloned().map(Ok), &mut connections)
            .unwrap();
        assert_eq!(stats.per_rank, expected_per_rank);
        assert_eq!(stats.total(), records.len() as u64);

        for (rank, wire) in connections.iter().enumerate() {
            let frames = decode_all(wire);
            // exactly one trailing end-of-stream per connection
            assert_eq!(frames.last(), Some(&Frame::EndOfStream));
            assert_eq!(frames.iter().filter(|f| **f == Frame::EndOfStream).count(), 1);

            let expected: Vec<Frame> = records
                .iter()
                .filter(|r| (r.key()[0] >> 7) as usize == rank)
                .cloned()
                .map(Frame::Data)
                .collect();
            assert_eq!(frames[..frames.len() - 1], expected[..]);
        }
    }

    #[test]
    fn test_send_input_error() {
        let sender = OutboundSender::new(Partitioner::new(1).unwrap());
        let mut connections = vec![Vec::new()];
        let input = vec![
            Ok(record_with_first_byte(1)),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated record")),
        ];

        let result = sender.send(input, &mut connections);
        assert!(matches!(result, Err(NetSortError::Input(_))));
    }

    #[test]
    fn test_send_connection_count_mismatch() {
        let sender = OutboundSender::new(Partitioner::new(4).unwrap());
        let mut connections = vec![Vec::<u8>::new(); 2];
        let result = sender.send(Vec::<std::io::Result<Record>>::new(), &mut connections);
        assert!(matches!(result, Err(NetSortError::Config(_))));
    }
}
