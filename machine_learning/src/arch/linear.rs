use std::num::NonZeroUsize;

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, arr1};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::loss::LossFn;
use crate::{
    adapter::ModelAdapter,
    dataset::Dataset,
    error::{MlErr, Result},
    initialization::ParamGen,
    optimization::Optimizer,
    params::{DType, Param, ParamKind, ParameterSet, Schema},
};

pub const WEIGHTS: &str = "weights";
pub const BIAS: &str = "bias";
pub const SAMPLES_SEEN: &str = "samples_seen";

/// A dense linear model, `y = x·W + b`, trained with mini-batch gradient steps.
///
/// Exposes two trainable parameters, `weights` and `bias`, plus the structural
/// `samples_seen` counter which is never averaged.
pub struct LinearRegression<O: Optimizer, L: LossFn> {
    x_size: usize,
    y_size: usize,

    // Flat buffers: `weights` row-major followed by `bias`.
    params: Vec<f32>,
    grad: Vec<f32>,
    samples_seen: i64,

    optimizer: O,
    loss_fn: L,
    batch_size: NonZeroUsize,
    rng: StdRng,
}

impl<O: Optimizer, L: LossFn> LinearRegression<O, L> {
    /// Creates a new zero initialized `LinearRegression`.
    ///
    /// # Arguments
    /// * `dim` - The amount of features and targets, `(x_size, y_size)`.
    /// * `optimizer` - Dictates how parameters move on each batch, it must hold
    ///   `(x_size + 1) * y_size` parameters.
    /// * `loss_fn` - The loss function.
    /// * `batch_size` - The amount of samples per gradient step.
    /// * `seed` - Seed for the per-epoch shuffling of the local partition.
    pub fn new(
        dim: (usize, usize),
        optimizer: O,
        loss_fn: L,
        batch_size: NonZeroUsize,
        seed: u64,
    ) -> Self {
        let (x_size, y_size) = dim;
        let size = (x_size + 1) * y_size;

        Self {
            x_size,
            y_size,
            params: vec![0.; size],
            grad: vec![0.; size],
            samples_seen: 0,
            optimizer,
            loss_fn,
            batch_size,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Initializes the weights from a parameter generator, biases stay at zero.
    pub fn with_init<G: ParamGen + ?Sized>(mut self, param_gen: &mut G) -> Self {
        let w_size = self.x_size * self.y_size;
        let weights = param_gen.fill(w_size);
        self.params[..w_size].copy_from_slice(&weights);
        self
    }

    /// Returns the amount of trainable scalars in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    fn w_size(&self) -> usize {
        self.x_size * self.y_size
    }

    /// Gives a view of the flat parameters as the weights and biases of the model.
    fn view_params(&self) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
        let (w_raw, b_raw) = self.params.split_at(self.w_size());

        let w = ArrayView2::from_shape((self.x_size, self.y_size), w_raw).map_err(|_| {
            MlErr::SizeMismatch {
                a: "weights",
                b: "dim",
                got: w_raw.len(),
                expected: self.w_size(),
            }
        })?;

        Ok((w, ArrayView1::from(b_raw)))
    }

    fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (w, b) = self.view_params()?;
        Ok(x.dot(&w) + &b)
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<()> {
        if dataset.x_size() != self.x_size {
            return Err(MlErr::SizeMismatch {
                a: "dataset features",
                b: "model inputs",
                got: dataset.x_size(),
                expected: self.x_size,
            });
        }

        if dataset.y_size() != self.y_size {
            return Err(MlErr::SizeMismatch {
                a: "dataset targets",
                b: "model outputs",
                got: dataset.y_size(),
                expected: self.y_size,
            });
        }

        Ok(())
    }

    /// Runs a forward and backward pass over a batch and applies one optimizer step.
    ///
    /// # Returns
    /// The loss of the batch before the step.
    fn step(&mut self, x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f64> {
        let y_pred = self.forward(x)?;
        let loss = self.loss_fn.loss(y_pred.view(), y);

        let d = self.loss_fn.loss_prime(y_pred.view(), y);
        let dw = x.t().dot(&d);
        let db = d.sum_axis(Axis(0));

        let w_size = self.w_size();
        let (gw, gb) = self.grad.split_at_mut(w_size);
        gw.iter_mut().zip(dw.iter()).for_each(|(g, v)| *g = *v);
        gb.iter_mut().zip(db.iter()).for_each(|(g, v)| *g = *v);

        self.optimizer.update_params(&self.grad, &mut self.params)?;
        Ok(loss)
    }
}

impl<O: Optimizer, L: LossFn> ModelAdapter for LinearRegression<O, L> {
    fn schema(&self) -> Schema {
        Schema::new()
            .with(WEIGHTS, ParamKind::Trainable, DType::F32, &[self.x_size, self.y_size])
            .with(BIAS, ParamKind::Trainable, DType::F32, &[self.y_size])
            .with(SAMPLES_SEEN, ParamKind::Structural, DType::I64, &[1])
    }

    fn parameters(&self) -> ParameterSet {
        let (x_size, y_size) = (self.x_size, self.y_size);
        let w_size = self.w_size();

        let weights = Array2::from_shape_fn((x_size, y_size), |(i, j)| self.params[i * y_size + j]);
        let bias = Array1::from(self.params[w_size..].to_vec());

        ParameterSet::new()
            .with(WEIGHTS, Param::trainable(weights.into_dyn()))
            .with(BIAS, Param::trainable(bias.into_dyn()))
            .with(SAMPLES_SEEN, Param::structural(arr1(&[self.samples_seen]).into_dyn()))
    }

    fn load(&mut self, params: ParameterSet) -> Result<()> {
        self.schema().check(&params)?;

        let tensor = |name: &str| {
            params
                .get(name)
                .map(Param::tensor)
                .ok_or_else(|| MlErr::shape_mismatch(format!("missing parameter `{name}`")))
        };

        let weights = tensor(WEIGHTS)?.as_f32();
        let bias = tensor(BIAS)?.as_f32();
        let seen = tensor(SAMPLES_SEEN)?.as_i64();

        let (Some(weights), Some(bias), Some(seen)) = (weights, bias, seen) else {
            return Err(MlErr::shape_mismatch("unexpected storage width"));
        };

        let values = weights.iter().chain(bias.iter());
        self.params.iter_mut().zip(values).for_each(|(p, v)| *p = *v);
        self.samples_seen = seen.iter().next().copied().unwrap_or_default();

        Ok(())
    }

    fn train_local(
        &mut self,
        dataset: &Dataset,
        partition: &[usize],
        epochs: NonZeroUsize,
    ) -> Result<(ParameterSet, Vec<f64>)> {
        if partition.is_empty() {
            return Err(MlErr::EmptyPartition);
        }

        self.check_dataset(dataset)?;
        self.optimizer.reset();

        let mut order = partition.to_vec();
        let mut losses = Vec::with_capacity(epochs.get());

        for epoch in 0..epochs.get() {
            order.shuffle(&mut self.rng);

            let mut total = 0.;
            let mut batches = 0;

            for chunk in order.chunks(self.batch_size.get()) {
                let (x, y) = dataset.select(chunk)?;
                total += self.step(x.view(), y.view())?;
                batches += 1;
                self.samples_seen += chunk.len() as i64;
            }

            let loss = total / batches as f64;
            if !loss.is_finite() {
                return Err(MlErr::Diverged { epoch });
            }

            debug!("epoch {epoch} finished: loss={loss:.6} samples={}", order.len());
            losses.push(loss);
        }

        Ok((self.parameters(), losses))
    }

    fn evaluate(&self, dataset: &Dataset) -> Result<f64> {
        if dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        self.check_dataset(dataset)?;
        let y_pred = self.forward(dataset.x())?;
        Ok(self.loss_fn.loss(y_pred.view(), dataset.y()))
    }
}
