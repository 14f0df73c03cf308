mod schema;
mod set;
mod tensor;

pub use schema::{ParamSpec, Schema};
pub use set::{Param, ParamKind, ParameterSet};
pub use tensor::{DType, Tensor};
