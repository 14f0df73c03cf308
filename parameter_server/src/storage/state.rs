use machine_learning::{ParameterSet, Schema};
use serde::{Deserialize, Serialize};

/// The canonical global model: its parameters and the amount of committed rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalModelState {
    parameters: ParameterSet,
    round: u64,
}

impl GlobalModelState {
    /// Creates a new `GlobalModelState`.
    ///
    /// # Arguments
    /// * `parameters` - The global parameters.
    /// * `round` - The last committed round, `0` before any commit.
    pub fn new(parameters: ParameterSet, round: u64) -> Self {
        Self { parameters, round }
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn schema(&self) -> Schema {
        self.parameters.schema()
    }

    pub fn into_parts(self) -> (ParameterSet, u64) {
        (self.parameters, self.round)
    }
}
