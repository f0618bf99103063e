//! Registration of the logit operator with the autograd engine.
//!
//! The process-wide registry is built on first use and never mutated after
//! that. Code that wants its own registry (for example to test duplicate
//! registration) builds one and calls [`register_ops`] on it.

use autograd::{AutogradError, Differentiable, OpDef, OpKey, OpRegistry, OpSchema, RecordedOp};
use once_cell::sync::Lazy;

use crate::array::NumericArray;
use crate::kernels::{self, FORWARD_OP, GRADIENT_OP};

/// Operators provided by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Logit,
}

impl Op {
    /// Exported symbol of the forward kernel.
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Logit => FORWARD_OP,
        }
    }

    /// Exported symbol of the gradient kernel.
    pub fn gradient_symbol(&self) -> &'static str {
        match self {
            Op::Logit => GRADIENT_OP,
        }
    }
}

impl OpKey for Op {
    fn name(&self) -> &'static str {
        self.symbol()
    }
}

pub const LOGIT_DOC: &str = "Inverse of the sigmoid function, logit(x) = log(x / (1 - x)).";

pub fn logit_def() -> OpDef<Op, NumericArray> {
    OpDef {
        schema: OpSchema {
            gradient_name: GRADIENT_OP,
            num_inputs: 1,
            doc: LOGIT_DOC,
        },
        forward: logit_forward,
        gradient: logit_gradient,
    }
}

/// Registers every operator of this crate.
pub fn register_ops(registry: &mut OpRegistry<Op, NumericArray>) -> Result<(), AutogradError> {
    registry.register(Op::Logit, logit_def())
}

static REGISTRY: Lazy<OpRegistry<Op, NumericArray>> = Lazy::new(|| {
    let mut registry = OpRegistry::new();
    if let Err(e) = register_ops(&mut registry) {
        log::error!("failed to register logit ops: {e}");
    }
    registry
});

/// The process-wide registry.
pub fn registry() -> &'static OpRegistry<Op, NumericArray> {
    &REGISTRY
}

fn logit_forward(inputs: &[&NumericArray]) -> Result<NumericArray, AutogradError> {
    let [x] = inputs else {
        return Err(AutogradError::ArityMismatch {
            op: FORWARD_OP,
            expected: 1,
            found: inputs.len(),
        });
    };
    kernels::forward(x).map_err(|e| AutogradError::kernel(FORWARD_OP, e))
}

fn logit_gradient(
    op: &RecordedOp<Op, NumericArray>,
    dz_dy: &NumericArray,
) -> Result<Vec<NumericArray>, AutogradError> {
    let x = op.input(0)?;
    let dz_dx = kernels::backward(x, dz_dy).map_err(|e| AutogradError::kernel(GRADIENT_OP, e))?;
    Ok(vec![dz_dx])
}

/// Differentiable logit through the process-wide registry.
pub fn logit(x: &Differentiable<NumericArray>) -> Result<Differentiable<NumericArray>, AutogradError> {
    registry().apply(Op::Logit, &[x])
}

/// Method syntax for [`logit`].
pub trait LogitExt {
    fn logit(&self) -> Result<Differentiable<NumericArray>, AutogradError>;
}

impl LogitExt for Differentiable<NumericArray> {
    fn logit(&self) -> Result<Differentiable<NumericArray>, AutogradError> {
        logit(self)
    }
}
