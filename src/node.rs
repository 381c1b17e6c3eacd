//! Cluster node: runs the partition exchange and the local sort for one rank.

use std::io;
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log;

use crate::aggregator::Aggregator;
use crate::buffer::RecordBufferBuilder;
use crate::error::NetSortError;
use crate::merger::RecordMerger;
use crate::mesh::{Inbound, InboundListener, MeshConnector};
use crate::partition::Partitioner;
use crate::record::Record;
use crate::sender::{OutboundSender, SendStats};
use crate::sort::LocalSorter;
use crate::topology::ClusterTopology;

/// Node builder. Provides methods for [`Node`] initialization.
pub struct NodeBuilder {
    /// This node's rank.
    rank: usize,
    /// Cluster members.
    topology: ClusterTopology,
    /// Already bound inbound listener. If not set the node binds its advertised address.
    listener: Option<TcpListener>,
    /// Number of threads to be used to sort data in parallel.
    threads_number: Option<usize>,
    /// Directory to be used to store spilled runs.
    tmp_dir: Option<Box<Path>>,
    /// Spilled run file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Aggregation buffer builder.
    buffer_builder: RecordBufferBuilder,
    /// Pause between failed connection attempts.
    retry_delay: Duration,
    /// Connection attempts per peer, unbounded if not set.
    max_connect_attempts: Option<usize>,
}

impl NodeBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new(rank: usize, topology: ClusterTopology) -> Self {
        NodeBuilder {
            rank,
            topology,
            listener: None,
            threads_number: None,
            tmp_dir: None,
            rw_buf_size: None,
            buffer_builder: RecordBufferBuilder::default(),
            retry_delay: Duration::ZERO,
            max_connect_attempts: None,
        }
    }

    /// Builds a [`Node`] instance using provided configuration.
    /// The inbound listener is bound here, so peers can connect as soon as this returns.
    pub fn build(self) -> Result<Node, NetSortError> {
        let peer = self
            .topology
            .peer(self.rank)
            .ok_or_else(|| NetSortError::Config(format!("rank {} is not in the cluster topology", self.rank)))?;
        let partitioner = Partitioner::new(self.topology.size())?;

        let listener = match self.listener {
            Some(listener) => InboundListener::from_listener(listener),
            None => InboundListener::bind(peer.addr())?,
        };
        log::info!("rank {} listening on {}", self.rank, listener.local_addr()?);

        let sorter = LocalSorter::new(
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.buffer_builder,
            self.rw_buf_size,
        )?;

        return Ok(Node {
            rank: self.rank,
            topology: self.topology,
            partitioner,
            listener,
            sorter,
            connector: MeshConnector::new(self.retry_delay, self.max_connect_attempts),
        });
    }

    /// Uses an already bound listener instead of binding the advertised address.
    pub fn with_listener(mut self, listener: TcpListener) -> NodeBuilder {
        self.listener = Some(listener);
        return self;
    }

    /// Sets number of threads to be used to sort data in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> NodeBuilder {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store spilled runs.
    pub fn with_tmp_dir(mut self, path: &Path) -> NodeBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets aggregation buffer builder.
    pub fn with_buffer(mut self, buffer_builder: RecordBufferBuilder) -> NodeBuilder {
        self.buffer_builder = buffer_builder;
        return self;
    }

    /// Sets spilled run read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> NodeBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets pause between failed connection attempts.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> NodeBuilder {
        self.retry_delay = retry_delay;
        return self;
    }

    /// Bounds connection attempts per peer.
    pub fn with_max_connect_attempts(mut self, attempts: usize) -> NodeBuilder {
        self.max_connect_attempts = Some(attempts);
        return self;
    }
}

/// Cluster node.
pub struct Node {
    rank: usize,
    topology: ClusterTopology,
    partitioner: Partitioner,
    listener: InboundListener,
    sorter: LocalSorter,
    connector: MeshConnector,
}

impl Node {
    /// Exchanges records with the cluster and sorts the ones this node owns.
    /// Returns the ascending stream of this node's partition.
    ///
    /// # Arguments
    /// * `input` - This node's input shard
    pub fn run<I>(self, input: I) -> Result<RecordMerger, NetSortError>
    where
        I: IntoIterator<Item = io::Result<Record>> + Send + 'static,
    {
        let Node {
            rank,
            topology,
            partitioner,
            listener,
            mut sorter,
            connector,
        } = self;
        let cluster_size = topology.size();
        let (sink, receiver) = crossbeam_channel::unbounded::<Inbound>();

        let listener_handle = listener.spawn(cluster_size, sink.clone())?;
        let mut mesh = connector.connect(&topology)?;

        let sender_sink = sink;
        let sender_handle = thread::Builder::new()
            .name(format!("netsort-sender-{}", rank))
            .spawn(move || -> Option<SendStats> {
                match OutboundSender::new(partitioner).send(input, mesh.streams_mut()) {
                    Ok(stats) => Some(stats),
                    Err(err) => {
                        log::error!("outbound sender failed: {}", err);
                        let _ = sender_sink.send(Inbound::Failed(err));
                        None
                    }
                }
            })
            .map_err(NetSortError::Transport)?;

        let aggregator = Aggregator::new(receiver, cluster_size);
        // on failure the sender and accept loop stay blocked; the caller is expected to exit
        aggregator.aggregate(&mut sorter)?;

        let stats = match sender_handle.join() {
            Ok(Some(stats)) => stats,
            // the failure was queued before the sender exited
            Ok(None) => {
                return Err(aggregator.pending_failure().unwrap_or_else(|| {
                    NetSortError::Transport(io::Error::new(io::ErrorKind::Other, "outbound sender failed"))
                }))
            }
            Err(_) => {
                return Err(NetSortError::Transport(io::Error::new(
                    io::ErrorKind::Other,
                    "outbound sender thread panicked",
                )))
            }
        };
        listener_handle.join();

        log::info!(
            "rank {} sent {} records (per rank: {:?}), received {}",
            rank,
            stats.total(),
            stats.per_rank,
            sorter.received()
        );

        return Ok(sorter.finish());
    }
}
