pub mod adapter;
pub mod arch;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod params;
pub mod training;

pub use adapter::ModelAdapter;
pub use dataset::{DataSource, Dataset};
pub use error::{MlErr, Result};
pub use params::{DType, Param, ParamKind, ParameterSet, Schema, Tensor};
pub use training::ClientUpdate;
