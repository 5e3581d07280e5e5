mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod optimizer;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use optimizer::{Optimizer, OptimizerSpec};

use crate::{Result, SolverErr};

/// Fails unless `grad`, `params` and the optimizer's own state all hold `len` values.
fn check_len(grad: &[f32], params: &[f32], len: usize) -> Result<()> {
    for (what, got) in [("gradient", grad.len()), ("params", params.len())] {
        if got != len {
            return Err(SolverErr::SizeMismatch {
                what,
                got,
                expected: len,
            });
        }
    }

    Ok(())
}

/// The gradient with an L2 penalty on `param` folded in.
#[inline]
fn regularized(grad: f32, param: f32, weight_decay: f32) -> f32 {
    grad + weight_decay * param
}
