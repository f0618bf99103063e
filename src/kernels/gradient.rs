use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};

use super::{GRADIENT_OP, logit_grad};
use crate::dtype::LogitElement;
use crate::error::LogitError;

fn check_shapes(expected: &[usize], found: &[usize]) -> Result<(), LogitError> {
    if expected != found {
        return Err(LogitError::ShapeMismatch {
            op: GRADIENT_OP,
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Gradient of logit with respect to `x`, given the upstream gradient.
///
/// `dz_dy` must have exactly the shape of `x`; there is no broadcasting.
pub fn logit_grad_array<T: LogitElement>(
    x: ArrayViewD<'_, T>,
    dz_dy: ArrayViewD<'_, T>,
) -> Result<ArrayD<T>, LogitError> {
    check_shapes(x.shape(), dz_dy.shape())?;
    Ok(Zip::from(x)
        .and(dz_dy)
        .map_collect(|&p, &g| logit_grad(p, g)))
}

/// Like [`logit_grad_array`] but writes into `dz_dx`.
pub fn logit_grad_into<T: LogitElement>(
    x: ArrayViewD<'_, T>,
    dz_dy: ArrayViewD<'_, T>,
    dz_dx: ArrayViewMutD<'_, T>,
) -> Result<(), LogitError> {
    check_shapes(x.shape(), dz_dy.shape())?;
    check_shapes(x.shape(), dz_dx.shape())?;
    Zip::from(dz_dx)
        .and(x)
        .and(dz_dy)
        .for_each(|out, &p, &g| *out = logit_grad(p, g));
    Ok(())
}
