use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use crate::error::{MlErr, Result};

/// What the federation needs to know about the data: how many samples there are and,
/// for grouped partitioning, which group each sample belongs to. Raw samples stay with
/// the model adapters.
pub trait DataSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the grouping key of the sample at `index` (e.g. its source site).
    fn group_key(&self, index: usize) -> Option<&str>;
}

/// An in-memory supervised dataset, one sample per row.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
    groups: Option<Vec<String>>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The features, shaped `(samples, x_size)`.
    /// * `y` - The targets, shaped `(samples, y_size)`.
    ///
    /// # Returns
    /// A `SizeMismatch` error if the amount of rows differ.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                a: "x rows",
                b: "y rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y, groups: None })
    }

    /// Creates a new `Dataset` from a flat row-major buffer where every row holds
    /// `x_size` features followed by `y_size` targets.
    pub fn from_rows(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row_size = x_size + y_size;

        if row_size == 0 || data.len() % row_size != 0 {
            return Err(MlErr::SizeMismatch {
                a: "data",
                b: "row size",
                got: data.len(),
                expected: row_size,
            });
        }

        let rows = data.len() / row_size;
        let full = Array2::from_shape_vec((rows, row_size), data).map_err(|_| {
            MlErr::SizeMismatch {
                a: "data",
                b: "row size",
                got: rows,
                expected: row_size,
            }
        })?;

        let (x, y) = full.view().split_at(Axis(1), x_size);
        Self::new(x.to_owned(), y.to_owned())
    }

    /// Generates a noisy linear regression problem, `y = x·w + 0.5`, with the true
    /// weights ramping from `1/x_size` up to `1`.
    ///
    /// Samples are split into `groups` contiguous sites (`site-0`, `site-1`, ...), each
    /// site's features shifted by its index so the sites are not identically distributed.
    pub fn synthetic_linear(
        samples: usize,
        x_size: usize,
        groups: usize,
        noise: f32,
        seed: u64,
    ) -> Result<Self> {
        let normal = Normal::new(0.0f32, noise).map_err(|e| MlErr::InvalidInit(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let groups = groups.max(1);

        let true_w: Vec<f32> = (1..=x_size).map(|i| i as f32 / x_size as f32).collect();
        let mut x = Array2::zeros((samples, x_size));
        let mut y = Array2::zeros((samples, 1));
        let mut keys = Vec::with_capacity(samples);

        for i in 0..samples {
            let group = i * groups / samples.max(1);
            let shift = group as f32 * 0.5;

            let mut target = 0.5;
            for (j, w) in true_w.iter().enumerate() {
                let xj = rng.random_range(-1.0f32..1.0) + shift;
                x[[i, j]] = xj;
                target += w * xj;
            }

            y[[i, 0]] = target + normal.sample(&mut rng);
            keys.push(format!("site-{group}"));
        }

        Self::new(x, y)?.with_groups(keys)
    }

    /// Attaches a grouping key to every sample.
    pub fn with_groups(mut self, groups: Vec<String>) -> Result<Self> {
        if groups.len() != self.len() {
            return Err(MlErr::SizeMismatch {
                a: "groups",
                b: "samples",
                got: groups.len(),
                expected: self.len(),
            });
        }

        self.groups = Some(groups);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Gathers the given rows into owned feature and target matrices.
    ///
    /// # Returns
    /// An `IndexOutOfBounds` error if any index is not a valid row.
    pub fn select(&self, indices: &[usize]) -> Result<(Array2<f32>, Array2<f32>)> {
        let len = self.len();

        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(MlErr::IndexOutOfBounds { index, len });
        }

        Ok((
            self.x.select(Axis(0), indices),
            self.y.select(Axis(0), indices),
        ))
    }
}

impl DataSource for Dataset {
    fn len(&self) -> usize {
        Dataset::len(self)
    }

    fn group_key(&self, index: usize) -> Option<&str> {
        self.groups.as_ref()?.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_splits_features_and_targets() {
        let ds = Dataset::from_rows(vec![0.0, 1.0, 10.0, 2.0, 3.0, 20.0], 2, 1).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.x_size(), 2);
        assert_eq!(ds.y_size(), 1);
        assert_eq!(ds.y()[[1, 0]], 20.0);
    }

    #[test]
    fn from_rows_rejects_ragged_buffers() {
        assert!(Dataset::from_rows(vec![0.0; 5], 1, 1).is_err());
    }

    #[test]
    fn select_rejects_out_of_bounds() {
        let ds = Dataset::from_rows(vec![0.0, 1.0, 2.0, 3.0], 1, 1).unwrap();

        assert!(ds.select(&[1, 0]).is_ok());
        assert!(matches!(
            ds.select(&[2]),
            Err(MlErr::IndexOutOfBounds { index: 2, len: 2 })
        ));
    }

    #[test]
    fn synthetic_is_grouped_and_deterministic() {
        let a = Dataset::synthetic_linear(12, 2, 3, 0.1, 7).unwrap();
        let b = Dataset::synthetic_linear(12, 2, 3, 0.1, 7).unwrap();

        assert_eq!(a.x(), b.x());
        assert_eq!(a.group_key(0), Some("site-0"));
        assert_eq!(a.group_key(11), Some("site-2"));
        assert_eq!(a.group_key(12), None);
    }

    #[test]
    fn ungrouped_dataset_has_no_keys() {
        let ds = Dataset::from_rows(vec![0.0, 1.0], 1, 1).unwrap();
        assert_eq!(ds.group_key(0), None);
    }
}
