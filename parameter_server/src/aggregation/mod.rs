mod aggregator;
mod error;
mod fedavg;

pub use aggregator::Aggregator;
pub use error::{AggregationErr, Result};
pub use fedavg::fedavg;
