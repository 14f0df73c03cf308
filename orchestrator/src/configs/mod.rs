mod adapter;
mod model;
mod training;

pub use adapter::{build, build_adapter, validate};
pub use model::{LossFnConfig, ModelConfig, OptimizerConfig, ParamGenConfig};
pub use training::{DatasetConfig, FederationConfig, PartitionConfig};
