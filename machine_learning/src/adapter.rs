use std::num::NonZeroUsize;

use crate::{
    dataset::Dataset,
    error::Result,
    params::{ParameterSet, Schema},
};

/// The capability interface through which the federation drives a trainable model.
///
/// An adapter owns its model state privately: every method only ever touches the
/// instance it's called on, so different adapters can train concurrently without any
/// coordination between them.
pub trait ModelAdapter: Send {
    /// Returns the layout every parameter set loaded into this adapter must follow.
    fn schema(&self) -> Schema;

    /// Returns an independent snapshot of the model's parameters.
    fn parameters(&self) -> ParameterSet;

    /// Replaces the model's parameters.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if `params` doesn't follow `schema()`, the model is left
    /// untouched in that case.
    fn load(&mut self, params: ParameterSet) -> Result<()>;

    /// Runs `epochs` passes over the samples of `dataset` selected by `partition`.
    ///
    /// # Returns
    /// The resulting parameters and the mean loss of every epoch.
    fn train_local(
        &mut self,
        dataset: &Dataset,
        partition: &[usize],
        epochs: NonZeroUsize,
    ) -> Result<(ParameterSet, Vec<f64>)>;

    /// Computes the model's loss over the entire `dataset` without modifying it.
    fn evaluate(&self, dataset: &Dataset) -> Result<f64>;
}

impl<A: ModelAdapter + ?Sized> ModelAdapter for Box<A> {
    fn schema(&self) -> Schema {
        (**self).schema()
    }

    fn parameters(&self) -> ParameterSet {
        (**self).parameters()
    }

    fn load(&mut self, params: ParameterSet) -> Result<()> {
        (**self).load(params)
    }

    fn train_local(
        &mut self,
        dataset: &Dataset,
        partition: &[usize],
        epochs: NonZeroUsize,
    ) -> Result<(ParameterSet, Vec<f64>)> {
        (**self).train_local(dataset, partition, epochs)
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<f64> {
        (**self).evaluate(dataset)
    }
}
