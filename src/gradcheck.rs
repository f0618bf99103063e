//! Numerical gradient checking.
//!
//! Compares the Jacobian obtained by back-propagating through the autograd
//! tape against one built from central differences of the forward kernel.

use autograd::{AutogradError, Differentiable, GradNode};
use ndarray::Array2;
use typed_builder::TypedBuilder;

use crate::array::NumericArray;
use crate::ops::{Op, registry};

/// Settings for [`check_gradient`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct GradCheckConfig {
    /// Finite-difference step
    #[builder(default = 1e-3)]
    pub delta: f64,
    #[builder(default = 1e-2)]
    pub rtol: f64,
    #[builder(default = 1e-2)]
    pub atol: f64,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Both Jacobians, indexed `[output element, input element]`.
#[derive(Debug, Clone)]
pub struct GradCheckReport {
    pub theoretical: Array2<f64>,
    pub numerical: Array2<f64>,
    pub rtol: f64,
    pub atol: f64,
}

impl GradCheckReport {
    pub fn max_abs_error(&self) -> f64 {
        (&self.theoretical - &self.numerical)
            .iter()
            .fold(0.0, |acc, e| acc.max(e.abs()))
    }

    /// `|t - n| <= atol + rtol * |n|` for every entry.
    pub fn is_close(&self) -> bool {
        self.theoretical
            .iter()
            .zip(self.numerical.iter())
            .all(|(&t, &n)| (t - n).abs() <= self.atol + self.rtol * n.abs())
    }
}

/// Builds both Jacobians of a single-input op at `x`.
pub fn check_gradient(
    op: Op,
    x: &NumericArray,
    config: &GradCheckConfig,
) -> Result<GradCheckReport, AutogradError> {
    let registry = registry();
    let n = x.len();
    let leaf = Differentiable::new_no_grad(x.clone());
    let y = registry.apply(op, &[&leaf])?.value();
    let m = y.len();

    // theoretical: one backward pass per output element
    let mut theoretical = Array2::zeros((m, n));
    for row in 0..m {
        let input = Differentiable::new(x.clone());
        let output = registry.apply(op, &[&input])?;
        output.backward_with(Differentiable::new_no_grad(y.one_hot_like(row)))?;
        if let Some(grad) = input.grad() {
            for (col, v) in grad.value().to_f64_vec().into_iter().enumerate() {
                theoretical[[row, col]] = v;
            }
        }
    }

    // numerical: one central difference per input element
    let mut numerical = Array2::zeros((m, n));
    for col in 0..n {
        let plus = perturb(x, col, config.delta)?;
        let minus = perturb(x, col, -config.delta)?;
        let y_plus = registry.apply(op, &[&Differentiable::new_no_grad(plus)])?.value();
        let y_minus = registry.apply(op, &[&Differentiable::new_no_grad(minus)])?.value();
        let diff = y_plus.accumulate(&negated(&y_minus))?;
        for (row, v) in diff.to_f64_vec().into_iter().enumerate() {
            numerical[[row, col]] = v / (2.0 * config.delta);
        }
    }

    log::debug!(
        "gradient check of `{}` on {}: {} x {} jacobian",
        op.symbol(),
        x.describe(),
        m,
        n
    );
    Ok(GradCheckReport {
        theoretical,
        numerical,
        rtol: config.rtol,
        atol: config.atol,
    })
}

fn perturb(x: &NumericArray, index: usize, delta: f64) -> Result<NumericArray, AutogradError> {
    x.perturbed(index, delta)
        .ok_or(AutogradError::IncompatibleGradient {
            expected: "a float array".to_string(),
            found: x.describe(),
        })
}

fn negated(a: &NumericArray) -> NumericArray {
    match a {
        NumericArray::F32(a) => NumericArray::F32(a.mapv(|v| -v)),
        NumericArray::F64(a) => NumericArray::F64(a.mapv(|v| -v)),
        NumericArray::I32(a) => NumericArray::I32(a.mapv(|v| -v)),
        NumericArray::I64(a) => NumericArray::I64(a.mapv(|v| -v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_default_config() {
        let config = GradCheckConfig::default();
        assert_eq!(config.delta, 1e-3);
        assert_eq!(config.rtol, 1e-2);
        assert_eq!(config.atol, 1e-2);

        let custom = GradCheckConfig::builder().delta(1e-4).build();
        assert_eq!(custom.delta, 1e-4);
        assert_eq!(custom.atol, 1e-2);
    }

    #[test]
    fn test_jacobian_is_diagonal() {
        let x = NumericArray::from(array![0.2_f64, 0.6].into_dyn());
        let report = check_gradient(Op::Logit, &x, &GradCheckConfig::default()).unwrap();
        assert_eq!(report.theoretical.dim(), (2, 2));
        assert_eq!(report.theoretical[[0, 1]], 0.0);
        assert_eq!(report.theoretical[[1, 0]], 0.0);
        assert!((report.theoretical[[0, 0]] - 1.0 / (0.2 * 0.8)).abs() < 1e-9);
        assert!(report.is_close());
        assert!(report.max_abs_error() < 1e-3);
    }

    #[test]
    fn test_integer_input_is_rejected() {
        let x = NumericArray::from(array![1_i32].into_dyn());
        assert!(check_gradient(Op::Logit, &x, &GradCheckConfig::default()).is_err());
    }
}
