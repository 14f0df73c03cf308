use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use log::debug;
use machine_learning::{ClientUpdate, Dataset, ModelAdapter, ParameterSet, Schema};

use crate::{
    error::{Result, WorkerErr},
    metrics::TrainerMetrics,
};

/// A single federation participant: a private model plus the samples it may train on.
///
/// The dataset is shared read-only with the other participants, only the indices in
/// `partition` are ever visited.
pub struct ClientTrainer {
    id: usize,
    adapter: Box<dyn ModelAdapter>,
    dataset: Arc<Dataset>,
    partition: Vec<usize>,

    history: Vec<f64>,
    metrics: TrainerMetrics,
}

impl ClientTrainer {
    /// Creates a new `ClientTrainer`.
    ///
    /// # Arguments
    /// * `id` - The participant's identifier, used for ordering and observability.
    /// * `adapter` - The participant's own model.
    /// * `dataset` - The shared data source.
    /// * `partition` - The indices of `dataset` owned by this participant.
    pub fn new(
        id: usize,
        adapter: Box<dyn ModelAdapter>,
        dataset: Arc<Dataset>,
        partition: Vec<usize>,
    ) -> Self {
        Self {
            id,
            adapter,
            dataset,
            partition,
            history: Vec::new(),
            metrics: TrainerMetrics::default(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn partition(&self) -> &[usize] {
        &self.partition
    }

    pub fn schema(&self) -> Schema {
        self.adapter.schema()
    }

    /// Every epoch loss of the recorded updates, oldest first.
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn metrics(&self) -> &TrainerMetrics {
        &self.metrics
    }

    /// Loads the global parameters and trains on the local partition.
    ///
    /// Nothing enters the history until the update is handed to `record`, an update
    /// that arrives too late to be used never shows up in it.
    ///
    /// # Arguments
    /// * `global` - This participant's own copy of the global parameters.
    /// * `epochs` - The amount of local passes over the partition.
    ///
    /// # Returns
    /// The locally trained parameters weighted by the partition size.
    pub fn train_round(
        &mut self,
        global: ParameterSet,
        epochs: NonZeroUsize,
    ) -> Result<ClientUpdate> {
        let id = self.id;

        let result = self.train(global, epochs);
        if let Err(e) = &result {
            self.metrics.bump_failure();
            debug!(participant = id; "local training failed: {e}");
        }

        result
    }

    fn train(&mut self, global: ParameterSet, epochs: NonZeroUsize) -> Result<ClientUpdate> {
        if self.partition.is_empty() {
            return Err(WorkerErr::EmptyPartition);
        }

        self.adapter.load(global)?;

        let start = Instant::now();
        let (params, losses) = self
            .adapter
            .train_local(&self.dataset, &self.partition, epochs)?;
        let elapsed = start.elapsed();

        self.metrics.add_epochs(epochs.get());
        self.metrics.add_samples(self.partition.len() * epochs.get());
        self.metrics.add_time(elapsed);

        let (id, samples) = (self.id, self.partition.len());
        debug!(
            participant = id,
            samples = samples;
            "local training done in {elapsed:?}, final loss {:?}",
            losses.last()
        );

        let weight = samples as f64;
        Ok(ClientUpdate::new(id, params, weight, losses))
    }

    /// Records an update of this participant that made it into a round.
    pub fn record(&mut self, update: &ClientUpdate) {
        self.metrics.bump_round();
        self.history.extend_from_slice(update.losses());
    }
}
