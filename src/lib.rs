//! `net-sort` is a rust distributed external sort implementation.
//!
//! A fixed cluster of nodes, each holding a shard of fixed-size 100-byte records, exchange records
//! over a full TCP mesh so that every record lands on the node owning its key range. Each node then
//! sorts the records it received and writes a sorted partition. Concatenating the partitions in
//! rank order yields the total order over the whole data set.
//!
//! # Overview
//!
//! * **Partitioning:**
//!   a record is owned by the rank given by the top `log2(cluster size)` bits of its first key byte,
//!   so the cluster size must be a power of two.
//! * **Wire protocol:**
//!   every frame is 101 bytes: a tag byte (`0` data, `1` end-of-stream) and a 100-byte body.
//!   Each node sends one end-of-stream frame on every connection once its shard is exhausted, and
//!   stops receiving once it has seen one per cluster member.
//! * **Self-loop:**
//!   every node dials itself, which is how it receives its own records.
//! * **Bounded memory:**
//!   received records can be spilled to disk as sorted runs and merged back, so a partition does
//!   not have to fit in RAM.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//! use std::path::Path;
//!
//! use net_sort::{write_partition, ClusterTopology, NodeBuilder, RecordReader};
//!
//! fn main() {
//!     let topology = ClusterTopology::load(Path::new("cluster.yaml")).unwrap();
//!     let input = RecordReader::new(io::BufReader::new(fs::File::open("input.dat").unwrap()));
//!
//!     let node = NodeBuilder::new(0, topology).build().unwrap();
//!     let sorted = node.run(input).unwrap();
//!
//!     let mut output = io::BufWriter::new(fs::File::create("output.dat").unwrap());
//!     write_partition(sorted, &mut output).unwrap();
//! }
//! ```

pub mod aggregator;
pub mod buffer;
pub mod chunk;
pub mod error;
pub mod frame;
pub mod merger;
pub mod mesh;
pub mod node;
pub mod partition;
pub mod record;
pub mod sender;
pub mod sort;
pub mod topology;

pub use aggregator::Aggregator;
pub use buffer::{RecordBuffer, RecordBufferBuilder};
pub use chunk::SortedChunk;
pub use error::NetSortError;
pub use frame::{Frame, FRAME_SIZE};
pub use merger::{RecordMerger, SortedRun};
pub use mesh::{Inbound, InboundListener, Mesh, MeshConnector};
pub use node::{Node, NodeBuilder};
pub use partition::Partitioner;
pub use record::{Record, RecordReader, KEY_SIZE, RECORD_SIZE};
pub use sender::{OutboundSender, SendStats};
pub use sort::{write_partition, LocalSorter};
pub use topology::{ClusterTopology, Peer};
