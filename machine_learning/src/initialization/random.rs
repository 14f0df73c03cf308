use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::ParamGen;
use crate::error::{MlErr, Result};

/// A parameter generator that follows a certain probabilistic distribution.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: R,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen`.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: R, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: limit,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Uniform distribution over `[low, high)`.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: R, limit: usize, low: f32, high: f32) -> Result<Self> {
        let distribution =
            Uniform::new(low, high).map_err(|e| MlErr::InvalidInit(e.to_string()))?;
        Ok(Self::new(rng, distribution, limit))
    }

    /// Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    pub fn xavier_uniform(rng: R, limit: usize, fan_in: usize, fan_out: usize) -> Result<Self> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(rng, limit, -range, range)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Normal distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (NaN or infinite).
    pub fn normal(rng: R, limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        let distribution =
            Normal::new(mean, std_dev).map_err(|e| MlErr::InvalidInit(e.to_string()))?;
        Ok(Self::new(rng, distribution, limit))
    }

    /// Kaiming normal initialization.
    ///
    /// # Arguments
    /// * `fan_in` - The number of input units in the weight tensor.
    pub fn kaiming(rng: R, limit: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;

        let sample = (0..n)
            .map(|_| self.distribution.sample(&mut self.rng))
            .collect();

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn seeded_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn exact() {
        const SIZE: usize = 10;

        let mut param_gen = RandParamGen::uniform(seeded_rng(), SIZE, -1., 1.).unwrap();
        let sample = param_gen.sample(SIZE).unwrap();

        assert_eq!(sample.len(), SIZE);
        assert!(sample.iter().all(|x| (-1. ..1.).contains(x)));
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn same_seed_same_values() {
        let a = RandParamGen::kaiming(seeded_rng(), 8, 4).unwrap().fill(8);
        let b = RandParamGen::kaiming(seeded_rng(), 8, 4).unwrap().fill(8);
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(RandParamGen::uniform(seeded_rng(), 1, 1., -1.).is_err());
        assert!(RandParamGen::normal(seeded_rng(), 1, 0., f32::NAN).is_err());
    }
}
