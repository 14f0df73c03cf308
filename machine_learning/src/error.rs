use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// A parameter set doesn't follow the schema it was checked against.
    ShapeMismatch { detail: String },
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    IndexOutOfBounds {
        index: usize,
        len: usize,
    },
    EmptyPartition,
    EmptyDataset,
    /// The model produced a non-finite loss, training diverged.
    Diverged {
        epoch: usize,
    },
    InvalidInit(String),
}

impl MlErr {
    pub(crate) fn shape_mismatch(detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            detail: detail.into(),
        }
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch { detail } => {
                write!(f, "The parameters don't match the model's schema: {detail}")
            }
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlErr::IndexOutOfBounds { index, len } => {
                write!(f, "Sample index {index} is out of bounds for a dataset of {len} samples")
            }
            MlErr::EmptyPartition => f.write_str("Tried to train over an empty partition"),
            MlErr::EmptyDataset => f.write_str("Tried to evaluate over an empty dataset"),
            MlErr::Diverged { epoch } => {
                write!(f, "Training diverged, the loss is not finite at epoch {epoch}")
            }
            MlErr::InvalidInit(msg) => write!(f, "Invalid parameter initialization: {msg}"),
        }
    }
}

impl Error for MlErr {}
