use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

use super::{FORWARD_OP, logit};
use crate::dtype::LogitElement;
use crate::error::LogitError;

/// Elementwise logit into a new array of the same shape.
pub fn logit_array<T: LogitElement>(x: ArrayViewD<'_, T>) -> ArrayD<T> {
    x.mapv(logit)
}

/// Elementwise logit into a caller-provided buffer.
///
/// Every element of `out` is written exactly once.
pub fn logit_into<T: LogitElement>(
    x: ArrayViewD<'_, T>,
    out: ArrayViewMutD<'_, T>,
) -> Result<(), LogitError> {
    if x.shape() != out.shape() {
        return Err(LogitError::ShapeMismatch {
            op: FORWARD_OP,
            expected: x.shape().to_vec(),
            found: out.shape().to_vec(),
        });
    }
    Zip::from(out).and(x).for_each(|y, &p| *y = logit(p));
    Ok(())
}
