use log::{debug, info};
use machine_learning::{ClientUpdate, ParameterSet};

use super::{Result, fedavg};
use crate::storage::ParameterStore;

/// Owns the global model and combines rounds of client updates into it.
#[derive(Debug, Clone)]
pub struct Aggregator {
    store: ParameterStore,
}

impl Aggregator {
    pub fn new(store: ParameterStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Returns a deep copy of the global parameters.
    pub fn snapshot(&self) -> ParameterSet {
        self.store.snapshot()
    }

    /// Averages `updates` against the global schema, the store is left untouched.
    ///
    /// # Arguments
    /// * `updates` - The round's updates, in a stable order.
    pub fn aggregate(&self, updates: &[ClientUpdate]) -> Result<ParameterSet> {
        let schema = self.store.schema();

        debug!(updates = updates.len(); "aggregating client updates");
        fedavg(&schema, updates)
    }

    /// Makes `parameters` the new global model.
    ///
    /// # Returns
    /// The new round number.
    pub fn commit(&self, parameters: ParameterSet) -> u64 {
        let round = self.store.commit(parameters);
        info!(round = round; "committed global model");
        round
    }
}
