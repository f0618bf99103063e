//! Logit kernels
//!
//! The forward kernel computes `ln(p / (1 - p))` and the gradient kernel
//! computes `dz_dy / (p * (1 - p))`, both elementwise. Domain edges are not
//! errors:
//!
//! | p            | logit(p) | gradient     |
//! |--------------|----------|--------------|
//! | (0, 1)       | finite   | finite       |
//! | 0            | -inf     | dz_dy * inf  |
//! | 1            | +inf     | dz_dy * inf  |
//! | < 0, > 1     | NaN      | NaN          |
//! | NaN          | NaN      | NaN          |
//!
//! Each precision is computed in its own type, f32 is never widened.

mod forward;
mod gradient;

pub use forward::{logit_array, logit_into};
pub use gradient::{logit_grad_array, logit_grad_into};

use crate::array::NumericArray;
use crate::dtype::LogitElement;
use crate::error::LogitError;

/// Name of the forward operator and its exported symbol.
pub const FORWARD_OP: &str = "Logit";
/// Name of the gradient operator and its exported symbol.
pub const GRADIENT_OP: &str = "LogitGrad";

/// `true` for `0 <= p <= 1`; NaN is outside.
#[inline]
pub fn in_unit_interval<T: LogitElement>(p: T) -> bool {
    p >= T::zero() && p <= T::one()
}

/// `ln(p / (1 - p))`
#[inline]
pub fn logit<T: LogitElement>(p: T) -> T {
    if !in_unit_interval(p) {
        return T::nan();
    }
    (p / (T::one() - p)).ln()
}

/// `dz_dy * 1 / (p * (1 - p))`, without clamping.
#[inline]
pub fn logit_grad<T: LogitElement>(p: T, dz_dy: T) -> T {
    if !in_unit_interval(p) {
        return T::nan();
    }
    dz_dy / (p * (T::one() - p))
}

/// Forward kernel dispatched on the array's dtype.
pub fn forward(x: &NumericArray) -> Result<NumericArray, LogitError> {
    log::trace!("{FORWARD_OP} on {}", x.describe());
    match x {
        NumericArray::F32(a) => Ok(NumericArray::F32(logit_array(a.view()))),
        NumericArray::F64(a) => Ok(NumericArray::F64(logit_array(a.view()))),
        other => Err(LogitError::UnsupportedDType {
            op: FORWARD_OP,
            dtype: other.dtype(),
        }),
    }
}

/// Gradient kernel dispatched on the dtype of `x`.
///
/// `dz_dy` must have the dtype and shape of `x`.
pub fn backward(x: &NumericArray, dz_dy: &NumericArray) -> Result<NumericArray, LogitError> {
    log::trace!(
        "{GRADIENT_OP} on {} with upstream {}",
        x.describe(),
        dz_dy.describe()
    );
    match (x, dz_dy) {
        (NumericArray::F32(x), NumericArray::F32(g)) => {
            logit_grad_array(x.view(), g.view()).map(NumericArray::F32)
        }
        (NumericArray::F64(x), NumericArray::F64(g)) => {
            logit_grad_array(x.view(), g.view()).map(NumericArray::F64)
        }
        (x, _) if !x.dtype().is_float() => Err(LogitError::UnsupportedDType {
            op: GRADIENT_OP,
            dtype: x.dtype(),
        }),
        (_, g) if !g.dtype().is_float() => Err(LogitError::UnsupportedDType {
            op: GRADIENT_OP,
            dtype: g.dtype(),
        }),
        (x, g) => Err(LogitError::DTypeMismatch {
            op: GRADIENT_OP,
            expected: x.dtype(),
            found: g.dtype(),
        }),
    }
}
