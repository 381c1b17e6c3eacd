//! Aggregator: collects every record routed to this node and detects stream termination.

use crossbeam_channel::Receiver;
use log;

use crate::error::NetSortError;
use crate::mesh::Inbound;
use crate::sort::LocalSorter;

/// Drains the record channel until every cluster member completed its stream.
pub struct Aggregator {
    receiver: Receiver<Inbound>,
    cluster_size: usize,
}

impl Aggregator {
    /// # Arguments
    /// * `receiver` - Consumer side of the record channel
    /// * `cluster_size` - Number of end-of-stream units that terminate aggregation
    pub fn new(receiver: Receiver<Inbound>, cluster_size: usize) -> Self {
        Aggregator { receiver, cluster_size }
    }

    /// Feeds received records to `sorter` until exactly `cluster_size` end-of-stream units were
    /// observed. Returns the number of records aggregated.
    ///
    /// A failed task, or a channel closed before termination, fails the whole aggregation.
    pub fn aggregate(&self, sorter: &mut LocalSorter) -> Result<u64, NetSortError> {
        let mut completed = 0;
        let mut records = 0;

        while completed < self.cluster_size {
            let unit = self.receiver.recv().map_err(|_| NetSortError::ChannelClosed {
                received: completed,
                expected: self.cluster_size,
            })?;

            match unit {
                Inbound::Record(record) => {
                    sorter.push(record)?;
                    records += 1;
                }
                Inbound::EndOfStream => {
                    completed += 1;
                    log::debug!("end-of-stream {}/{}", completed, self.cluster_size);
                }
                Inbound::Failed(err) => return Err(err),
            }
        }

        if !self.receiver.is_empty() {
            log::warn!("{} units queued after all streams completed", self.receiver.len());
        }
        log::info!("aggregation done ({} records)", records);

        return Ok(records);
    }

    /// Returns a task failure queued after aggregation terminated, if any.
    pub fn pending_failure(&self) -> Option<NetSortError> {
        self.receiver.try_iter().find_map(|unit| match unit {
            Inbound::Failed(err) => Some(err),
            _ => None,
        })
    }
}
