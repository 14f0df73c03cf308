use ndarray::{Array2, ArrayView2};

/// A loss function over a batch of predictions, one sample per row.
pub trait LossFn: Send {
    /// Computes the mean loss of the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f64;

    /// Computes the derivative of the loss with respect to every prediction.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}
