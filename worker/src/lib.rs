pub mod data;
pub mod error;
pub mod metrics;
pub mod trainer;

pub use data::{Partitioner, Partitions, Strategy};
pub use error::{PartitionErr, Result, WorkerErr};
pub use metrics::TrainerMetrics;
pub use trainer::ClientTrainer;
