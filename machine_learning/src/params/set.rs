use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use super::{ParamSpec, Schema, Tensor};

/// How a parameter is combined across participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Real valued state that is averaged.
    Trainable,
    /// Counter-like state that is copied from a single canonical source.
    Structural,
}

impl Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Trainable => f.write_str("trainable"),
            ParamKind::Structural => f.write_str("structural"),
        }
    }
}

/// A tensor together with its aggregation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    kind: ParamKind,
    tensor: Tensor,
}

impl Param {
    pub fn new(kind: ParamKind, tensor: Tensor) -> Self {
        Self { kind, tensor }
    }

    pub fn trainable(tensor: impl Into<Tensor>) -> Self {
        Self::new(ParamKind::Trainable, tensor.into())
    }

    pub fn structural(tensor: impl Into<Tensor>) -> Self {
        Self::new(ParamKind::Structural, tensor.into())
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn tensor_mut(&mut self) -> &mut Tensor {
        &mut self.tensor
    }

    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }

    /// Returns the declared layout of this parameter.
    pub fn spec(&self) -> ParamSpec {
        ParamSpec {
            kind: self.kind,
            dtype: self.tensor.dtype(),
            shape: self.tensor.shape().to_vec(),
        }
    }
}

/// An ordered, owned collection of named parameters.
///
/// Cloning a `ParameterSet` is a deep copy, handing one to somebody else never
/// aliases the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    entries: Vec<(String, Param)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, keeping the position of a previous one with the same name.
    ///
    /// # Returns
    /// The replaced parameter, if any.
    pub fn insert(&mut self, name: impl Into<String>, param: Param) -> Option<Param> {
        let name = name.into();

        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, param)),
            None => {
                self.entries.push((name, param));
                None
            }
        }
    }

    /// Builder flavoured `insert`.
    pub fn with(mut self, name: impl Into<String>, param: Param) -> Self {
        self.insert(name, param);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Param> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Returns the total amount of scalar values held by the set.
    pub fn numel(&self) -> usize {
        self.entries.iter().map(|(_, p)| p.tensor.len()).sum()
    }

    /// Derives the schema this set currently follows.
    pub fn schema(&self) -> Schema {
        self.entries
            .iter()
            .fold(Schema::new(), |schema, (name, param)| {
                let spec = param.spec();
                schema.with(name.as_str(), spec.kind, spec.dtype, &spec.shape)
            })
    }
}

impl FromIterator<(String, Param)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, Param)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();

        for (name, param) in iter {
            set.insert(name, param);
        }

        set
    }
}

impl IntoIterator for ParameterSet {
    type Item = (String, Param);
    type IntoIter = std::vec::IntoIter<(String, Param)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
