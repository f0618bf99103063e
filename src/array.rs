//! Host array type with a runtime dtype tag.

use autograd::{AutogradError, GradNode, GradRoot};
use ndarray::{ArrayD, IxDyn, ShapeError, arr0};
use num_traits::One;

use crate::dtype::DType;

/// An n-dimensional array of one element type.
///
/// The tag is the enum variant; the storage is an owned `ndarray::ArrayD`.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
}

/// Applies `$body` to the inner array of any variant.
macro_rules! with_array {
    ($array:expr, $inner:ident => $body:expr) => {
        match $array {
            NumericArray::F32($inner) => $body,
            NumericArray::F64($inner) => $body,
            NumericArray::I32($inner) => $body,
            NumericArray::I64($inner) => $body,
        }
    };
}

/// Rebuilds the same variant from an expression over the inner array.
macro_rules! map_array {
    ($array:expr, $inner:ident => $body:expr) => {
        match $array {
            NumericArray::F32($inner) => NumericArray::F32($body),
            NumericArray::F64($inner) => NumericArray::F64($body),
            NumericArray::I32($inner) => NumericArray::I32($body),
            NumericArray::I64($inner) => NumericArray::I64($body),
        }
    };
}

impl NumericArray {
    pub fn dtype(&self) -> DType {
        match self {
            NumericArray::F32(_) => DType::F32,
            NumericArray::F64(_) => DType::F64,
            NumericArray::I32(_) => DType::I32,
            NumericArray::I64(_) => DType::I64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        with_array!(self, a => a.ndim())
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a float64 array from a shape and row-major data.
    pub fn from_shape_vec(shape: &[usize], data: Vec<f64>) -> Result<NumericArray, ShapeError> {
        ArrayD::from_shape_vec(IxDyn(shape), data).map(NumericArray::F64)
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            NumericArray::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            NumericArray::F64(a) => Some(a),
            _ => None,
        }
    }

    /// Elements in logical (row-major) order, widened to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            NumericArray::F32(a) => a.iter().map(|&v| f64::from(v)).collect(),
            NumericArray::F64(a) => a.iter().copied().collect(),
            NumericArray::I32(a) => a.iter().map(|&v| f64::from(v)).collect(),
            NumericArray::I64(a) => a.iter().map(|&v| v as f64).collect(),
        }
    }

    /// e.g. `float32[2, 3]`
    pub(crate) fn describe(&self) -> String {
        format!("{}{:?}", self.dtype(), self.shape())
    }

    /// Zeros of the same dtype and shape with a single one at logical `index`.
    pub(crate) fn one_hot_like(&self, index: usize) -> NumericArray {
        map_array!(self, a => {
            let mut hot = ArrayD::zeros(a.raw_dim());
            set_logical(&mut hot, index, One::one());
            hot
        })
    }

    /// Copy with `delta` added to the element at logical `index`.
    ///
    /// Only float arrays can be perturbed.
    pub(crate) fn perturbed(&self, index: usize, delta: f64) -> Option<NumericArray> {
        match self {
            NumericArray::F32(a) => {
                let mut out = a.clone();
                if let Some(v) = out.iter_mut().nth(index) {
                    *v += delta as f32;
                }
                Some(NumericArray::F32(out))
            }
            NumericArray::F64(a) => {
                let mut out = a.clone();
                if let Some(v) = out.iter_mut().nth(index) {
                    *v += delta;
                }
                Some(NumericArray::F64(out))
            }
            NumericArray::I32(_) | NumericArray::I64(_) => None,
        }
    }
}

fn set_logical<A>(array: &mut ArrayD<A>, index: usize, value: A) {
    if let Some(v) = array.iter_mut().nth(index) {
        *v = value;
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<ArrayD<f32>> for NumericArray {
    fn from(a: ArrayD<f32>) -> Self {
        NumericArray::F32(a)
    }
}

impl From<ArrayD<f64>> for NumericArray {
    fn from(a: ArrayD<f64>) -> Self {
        NumericArray::F64(a)
    }
}

impl From<ArrayD<i32>> for NumericArray {
    fn from(a: ArrayD<i32>) -> Self {
        NumericArray::I32(a)
    }
}

impl From<ArrayD<i64>> for NumericArray {
    fn from(a: ArrayD<i64>) -> Self {
        NumericArray::I64(a)
    }
}

impl From<f32> for NumericArray {
    fn from(v: f32) -> Self {
        NumericArray::F32(arr0(v).into_dyn())
    }
}

impl From<f64> for NumericArray {
    fn from(v: f64) -> Self {
        NumericArray::F64(arr0(v).into_dyn())
    }
}

// ============================================================================
// Autograd integration
// ============================================================================

impl GradNode for NumericArray {
    fn accumulate(&self, other: &Self) -> Result<Self, AutogradError> {
        match (self, other) {
            (NumericArray::F32(a), NumericArray::F32(b)) => a.accumulate(b).map(NumericArray::F32),
            (NumericArray::F64(a), NumericArray::F64(b)) => a.accumulate(b).map(NumericArray::F64),
            (NumericArray::I32(a), NumericArray::I32(b)) => a.accumulate(b).map(NumericArray::I32),
            (NumericArray::I64(a), NumericArray::I64(b)) => a.accumulate(b).map(NumericArray::I64),
            _ => Err(AutogradError::IncompatibleGradient {
                expected: self.describe(),
                found: other.describe(),
            }),
        }
    }
}

impl GradRoot for NumericArray {
    fn unit_grad_like(&self) -> Self {
        map_array!(self, a => a.unit_grad_like())
    }
}
