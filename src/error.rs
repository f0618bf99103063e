use crate::dtype::DType;

/// Errors raised by the logit kernels.
///
/// Domain violations are not errors: they come back as NaN or ±inf.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LogitError {
    #[error("`{op}` is not defined for {dtype} (expected float32 or float64)")]
    UnsupportedDType { op: &'static str, dtype: DType },

    #[error("`{op}` got mixed dtypes: expected {expected}, found {found}")]
    DTypeMismatch {
        op: &'static str,
        expected: DType,
        found: DType,
    },

    #[error("`{op}` got shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}
