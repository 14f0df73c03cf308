use serde::{Deserialize, Serialize};

use super::{DType, ParamKind, ParameterSet};
use crate::error::{MlErr, Result};

/// The declared layout of a single parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub dtype: DType,
    pub shape: Vec<usize>,
}

/// The ordered layout of a `ParameterSet`: names, kinds, storage widths and shapes.
///
/// A model declares its schema once, every parameter set exchanged in a round must
/// follow it exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    entries: Vec<(String, ParamSpec)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new parameter declaration.
    ///
    /// # Arguments
    /// * `name` - The parameter's name.
    /// * `kind` - Whether the parameter is averaged or copied during aggregation.
    /// * `dtype` - The storage width.
    /// * `shape` - The dimensions of the parameter.
    pub fn with(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        dtype: DType,
        shape: &[usize],
    ) -> Self {
        let spec = ParamSpec {
            kind,
            dtype,
            shape: shape.to_vec(),
        };

        self.entries.push((name.into(), spec));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.entries.iter().map(|(n, spec)| (n.as_str(), spec))
    }

    /// Finds the first difference between `self`, the expected layout, and `other`.
    ///
    /// # Returns
    /// `None` if both schemas are identical, a description of the first difference otherwise.
    pub fn diff(&self, other: &Schema) -> Option<String> {
        let pairs = self.entries.iter().zip(&other.entries).enumerate();

        for (i, ((name, spec), (got_name, got))) in pairs {
            if name != got_name {
                if other.get(name).is_none() {
                    return Some(format!("missing parameter `{name}`"));
                }

                return Some(format!("found `{got_name}` at position {i}, expected `{name}`"));
            }

            if spec.kind != got.kind {
                return Some(format!("`{name}` is {}, expected {}", got.kind, spec.kind));
            }

            if spec.dtype != got.dtype {
                return Some(format!(
                    "`{name}` has dtype {}, expected {}",
                    got.dtype, spec.dtype
                ));
            }

            if spec.shape != got.shape {
                return Some(format!(
                    "`{name}` has shape {:?}, expected {:?}",
                    got.shape, spec.shape
                ));
            }
        }

        if let Some((name, _)) = self.entries.get(other.len()) {
            return Some(format!("missing parameter `{name}`"));
        }

        if let Some((name, _)) = other.entries.get(self.len()) {
            return Some(format!("unexpected parameter `{name}`"));
        }

        None
    }

    /// Checks that a parameter set follows this schema.
    ///
    /// # Returns
    /// An `MlErr::ShapeMismatch` describing the first difference.
    pub fn check(&self, params: &ParameterSet) -> Result<()> {
        match self.diff(&params.schema()) {
            Some(detail) => Err(MlErr::shape_mismatch(detail)),
            None => Ok(()),
        }
    }
}
