mod partition;
mod shard;

pub use partition::{Partitioner, Partitions, Strategy};
pub use shard::block_range;
