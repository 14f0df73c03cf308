use crate::error::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer: Send {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the loss with respect to `params`.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `grad` and `params` have different lengths.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    /// Forgets any state accumulated by previous updates.
    ///
    /// Called at the start of every local training run, a participant starts each round
    /// from the freshly distributed global parameters.
    fn reset(&mut self) {}
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

pub(super) fn check_sizes(grad: &[f32], params: &[f32]) -> Result<()> {
    if grad.len() != params.len() {
        return Err(crate::error::MlErr::SizeMismatch {
            a: "grad",
            b: "params",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}
