use std::fmt::{self, Display};

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// The storage width of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    F32,
    F64,
    I64,
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I64 => "i64",
        };

        f.write_str(s)
    }
}

/// A dense n-dimensional array tagged with its storage width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tensor {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I64(ArrayD<i64>),
}

impl Tensor {
    /// Creates a new zero filled tensor.
    ///
    /// # Arguments
    /// * `dtype` - The storage width of the tensor.
    /// * `shape` - The dimensions of the tensor.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);

        match dtype {
            DType::F32 => Tensor::F32(ArrayD::zeros(dim)),
            DType::F64 => Tensor::F64(ArrayD::zeros(dim)),
            DType::I64 => Tensor::I64(ArrayD::zeros(dim)),
        }
    }

    /// Creates a rank-0 `f32` tensor.
    pub fn scalar(value: f32) -> Self {
        Tensor::F32(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::F32,
            Tensor::F64(_) => DType::F64,
            Tensor::I64(_) => DType::I64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::F64(a) => a.shape(),
            Tensor::I64(a) => a.shape(),
        }
    }

    /// Returns the amount of elements in the tensor.
    pub fn len(&self) -> usize {
        match self {
            Tensor::F32(a) => a.len(),
            Tensor::F64(a) => a.len(),
            Tensor::I64(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widens the tensor into an `f64` array.
    ///
    /// # Returns
    /// A new owned array with every element converted to `f64`.
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            Tensor::F32(a) => a.mapv(f64::from),
            Tensor::F64(a) => a.clone(),
            Tensor::I64(a) => a.mapv(|x| x as f64),
        }
    }

    /// Narrows an `f64` array into a tensor of the given storage width.
    ///
    /// Integer targets are rounded to the nearest value.
    ///
    /// # Arguments
    /// * `dtype` - The storage width of the resulting tensor.
    /// * `values` - The wide values.
    pub fn from_f64(dtype: DType, values: ArrayD<f64>) -> Self {
        match dtype {
            DType::F32 => Tensor::F32(values.mapv(|x| x as f32)),
            DType::F64 => Tensor::F64(values),
            DType::I64 => Tensor::I64(values.mapv(|x| x.round() as i64)),
        }
    }

    /// Returns the `f32` array of this tensor, if that is its storage width.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensor::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut ArrayD<f32>> {
        match self {
            Tensor::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Tensor::I64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64_mut(&mut self) -> Option<&mut ArrayD<i64>> {
        match self {
            Tensor::I64(a) => Some(a),
            _ => None,
        }
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(value: ArrayD<f32>) -> Self {
        Tensor::F32(value)
    }
}

impl From<ArrayD<f64>> for Tensor {
    fn from(value: ArrayD<f64>) -> Self {
        Tensor::F64(value)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(value: ArrayD<i64>) -> Self {
        Tensor::I64(value)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn zeros_follow_dtype_and_shape() {
        let t = Tensor::zeros(DType::I64, &[2, 3]);
        assert_eq!(t.dtype(), DType::I64);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn widen_then_narrow_keeps_integers() {
        let t = Tensor::I64(arr1(&[1, -2, 3]).into_dyn());
        let wide = t.to_f64();
        assert_eq!(Tensor::from_f64(DType::I64, wide), t);
    }

    #[test]
    fn narrowing_rounds_integers() {
        let wide = arr1(&[1.4, 1.6, -0.6]).into_dyn();
        let t = Tensor::from_f64(DType::I64, wide);
        assert_eq!(t.as_i64().unwrap().as_slice().unwrap(), &[1, 2, -1]);
    }

    #[test]
    fn scalar_has_no_dimensions() {
        let t = Tensor::scalar(2.5);
        assert!(t.shape().is_empty());
        assert_eq!(t.len(), 1);
    }
}
