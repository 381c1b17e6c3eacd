//! Key-prefix partitioner.

use crate::error::NetSortError;
use crate::record::Record;

/// Largest supported cluster: the owner is taken from the first key byte only.
pub const MAX_CLUSTER_SIZE: usize = 256;

/// Routes records to the owning rank using the most significant `log2(cluster_size)` bits of
/// the first key byte. Rank `r` therefore owns a contiguous key range, and ranks are ordered the
/// same way their key ranges are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    cluster_size: usize,
    bits: u32,
}

impl Partitioner {
    /// Creates a partitioner for a cluster of the given size.
    /// The size must be a power of two not exceeding [`MAX_CLUSTER_SIZE`].
    pub fn new(cluster_size: usize) -> Result<Self, NetSortError> {
        if !cluster_size.is_power_of_two() {
            return Err(NetSortError::Config(format!(
                "cluster size {} is not a power of two",
                cluster_size
            )));
        }
        if cluster_size > MAX_CLUSTER_SIZE {
            return Err(NetSortError::Config(format!(
                "cluster size {} exceeds maximum of {}",
                cluster_size, MAX_CLUSTER_SIZE
            )));
        }

        return Ok(Partitioner {
            cluster_size,
            bits: cluster_size.trailing_zeros(),
        });
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    /// Returns the rank owning the record.
    pub fn owner(&self, record: &Record) -> usize {
        // widened so that a single-node cluster shifts by 8 without overflow
        (u32::from(record.key()[0]) >> (8 - self.bits)) as usize
    }
}
