use std::sync::Arc;

use log::debug;
use machine_learning::{ParameterSet, Schema};
use parking_lot::RwLock;

use super::GlobalModelState;

/// Shared ownership of the `GlobalModelState`.
///
/// Readers always get deep copies, the only way to change the state is a whole
/// `commit` or `restore` under the write lock.
#[derive(Debug)]
pub struct ParameterStore {
    state: Arc<RwLock<GlobalModelState>>,
}

impl Clone for ParameterStore {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl ParameterStore {
    /// Creates a new `ParameterStore` at round `0`.
    ///
    /// # Arguments
    /// * `parameters` - The initial global parameters.
    pub fn new(parameters: ParameterSet) -> Self {
        Self::from_state(GlobalModelState::new(parameters, 0))
    }

    pub fn from_state(state: GlobalModelState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns a deep copy of the global parameters.
    pub fn snapshot(&self) -> ParameterSet {
        self.state.read().parameters().clone()
    }

    /// Returns a deep copy of the whole state, parameters and round read together.
    pub fn state(&self) -> GlobalModelState {
        self.state.read().clone()
    }

    pub fn round(&self) -> u64 {
        self.state.read().round()
    }

    pub fn schema(&self) -> Schema {
        self.state.read().schema()
    }

    /// Replaces the global parameters and advances the round by one.
    ///
    /// # Returns
    /// The new round number.
    pub fn commit(&self, parameters: ParameterSet) -> u64 {
        let mut state = self.state.write();
        let round = state.round() + 1;
        *state = GlobalModelState::new(parameters, round);

        debug!(round = round; "global parameters committed");
        round
    }

    /// Replaces the whole state, used to resume from a checkpoint.
    pub fn restore(&self, state: GlobalModelState) {
        *self.state.write() = state;
    }
}
