use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Mean squared error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f64 {
        if y_pred.is_empty() {
            return 0.;
        }

        let mut total = 0f64;
        Zip::from(&y_pred).and(&y).for_each(|&p, &t| {
            let diff = f64::from(p - t);
            total += diff * diff;
        });

        total / y_pred.len() as f64
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        (&y_pred - &y) * (2.0 / y_pred.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    #[test]
    fn loss_is_mean_of_squares() {
        let y_pred = arr2(&[[1.0f32], [3.0]]);
        let y = arr2(&[[0.0f32], [1.0]]);

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 2.5);
        assert_eq!(Mse.loss_prime(y_pred.view(), y.view()), arr2(&[[1.0], [2.0]]));
    }
}
