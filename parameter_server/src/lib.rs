pub mod aggregation;
pub mod storage;

pub use aggregation::{AggregationErr, Aggregator, fedavg};
pub use storage::{GlobalModelState, ParameterStore};
