use std::fmt;

use num_traits::Float;

/// Element types a `NumericArray` can hold.
///
/// Only the float types have logit kernels; the integer types exist so that a
/// host array can carry them and dispatch can reject them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Code used on the C boundary.
    pub fn code(&self) -> u32 {
        match self {
            DType::F32 => 0,
            DType::F64 => 1,
            DType::I32 => 2,
            DType::I64 => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<DType> {
        match code {
            0 => Some(DType::F32),
            1 => Some(DType::F64),
            2 => Some(DType::I32),
            3 => Some(DType::I64),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "float32"),
            DType::F64 => write!(f, "float64"),
            DType::I32 => write!(f, "int32"),
            DType::I64 => write!(f, "int64"),
        }
    }
}

/// Float element types the logit kernels are instantiated for.
pub trait LogitElement: Float + Send + Sync + fmt::Debug + 'static {
    /// The corresponding DType enum variant
    const DTYPE: DType;
}

impl LogitElement for f32 {
    const DTYPE: DType = DType::F32;
}

impl LogitElement for f64 {
    const DTYPE: DType = DType::F64;
}
