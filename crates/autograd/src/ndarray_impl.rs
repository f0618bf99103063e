//! ndarray に対する GradNode / GradRoot の実装

use std::ops::Add;

use ndarray::{ArrayD, Zip};
use num_traits::One;

use crate::error::AutogradError;
use crate::traits::{GradNode, GradRoot};

// ============================================================================
// GradNode の実装 (ArrayD)
// ============================================================================

impl<A> GradNode for ArrayD<A>
where
    A: Clone + Add<Output = A> + Send + Sync + 'static,
{
    fn accumulate(&self, other: &Self) -> Result<Self, AutogradError> {
        // ブロードキャストはしない: 勾配は必ず同じ形状で届く
        if self.shape() != other.shape() {
            return Err(AutogradError::IncompatibleGradient {
                expected: format!("{:?}", self.shape()),
                found: format!("{:?}", other.shape()),
            });
        }
        Ok(Zip::from(self)
            .and(other)
            .map_collect(|a, b| a.clone() + b.clone()))
    }
}

// ============================================================================
// GradRoot の実装 (ArrayD)
// ============================================================================

impl<A> GradRoot for ArrayD<A>
where
    A: Clone + Add<Output = A> + One + Send + Sync + 'static,
{
    fn unit_grad_like(&self) -> Self {
        ArrayD::from_elem(self.raw_dim(), A::one())
    }
}
