//! Harp Logit: a differentiable logit primitive
//!
//! Computes `logit(p) = ln(p / (1 - p))` elementwise over n-dimensional
//! arrays, together with its analytic gradient, and registers the pair with
//! the `autograd` engine so it can take part in reverse-mode differentiation.
//!
//! # Architecture
//!
//! - **kernels**: forward and gradient kernels, generic over f32 / f64
//! - **ops**: operator key and registration with the autograd registry
//! - **ffi**: `Logit` / `LogitGrad` symbols exported from the cdylib
//! - **gradcheck**: finite-difference gradient checking
//!
//! # Example
//!
//! ```ignore
//! use harp_logit::prelude::*;
//!
//! let x = Differentiable::new(NumericArray::from(0.9_f64));
//! let y = x.logit()?;
//! y.backward()?;
//! // dL/dx = 1 / (0.9 * 0.1)
//! ```

// ============================================================================
// Core Modules
// ============================================================================

pub mod array;
pub mod dtype;
pub mod error;
pub mod ffi;
pub mod gradcheck;
pub mod kernels;
pub mod ops;

// ============================================================================
// Re-exports
// ============================================================================

pub use array::NumericArray;
pub use dtype::{DType, LogitElement};
pub use error::LogitError;
pub use ops::{LogitExt, Op, logit, register_ops, registry};

// ============================================================================
// Prelude
// ============================================================================

/// Prelude module with commonly used types and traits
pub mod prelude {
    pub use crate::array::NumericArray;
    pub use crate::dtype::DType;
    pub use crate::error::LogitError;
    pub use crate::ops::{LogitExt, Op};

    pub use autograd::{AutogradError, Differentiable};
}
