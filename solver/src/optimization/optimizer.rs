use serde::{Deserialize, Serialize};

use super::{Adam, GradientDescent, GradientDescentWithMomentum};
use crate::Result;

/// Turns the gradient a solver computed into an update of its flat parameter vector.
///
/// Optimizers are stateful, one instance belongs to exactly one solver.
pub trait Optimizer: Send {
    /// Applies one update to `params`.
    ///
    /// # Arguments
    /// * `grad` - The flat gradient, already averaged across solvers.
    /// * `params` - The flat parameters, updated in place.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `grad`, `params` and the optimizer's state disagree in length.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }
}

/// A serializable description of an `Optimizer`.
///
/// Every variant takes an optional `weight_decay`, the L2 penalty folded into each update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        #[serde(default)]
        weight_decay: f32,
    },
    GradientDescent {
        learning_rate: f32,
        #[serde(default)]
        weight_decay: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
        #[serde(default)]
        weight_decay: f32,
    },
}

impl OptimizerSpec {
    /// Builds the optimizer this spec describes.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters the optimizer will update.
    ///
    /// # Returns
    /// A boxed optimizer.
    pub fn build(&self, len: usize) -> Box<dyn Optimizer> {
        match *self {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => Box::new(
                Adam::new(len, learning_rate, beta1, beta2, epsilon).with_weight_decay(weight_decay),
            ),
            OptimizerSpec::GradientDescent {
                learning_rate,
                weight_decay,
            } => Box::new(GradientDescent::new(learning_rate).with_weight_decay(weight_decay)),
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
                weight_decay,
            } => Box::new(
                GradientDescentWithMomentum::new(len, learning_rate, momentum)
                    .with_weight_decay(weight_decay),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_decay_defaults_to_zero() {
        let raw = r#"{ "gradient_descent_with_momentum": { "learning_rate": 0.1, "momentum": 0.9 } }"#;
        let spec: OptimizerSpec = serde_json::from_str(raw).unwrap();

        assert_eq!(
            spec,
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate: 0.1,
                momentum: 0.9,
                weight_decay: 0.,
            }
        );
    }

    #[test]
    fn built_optimizer_holds_state_for_len_params() {
        let spec = OptimizerSpec::Adam {
            learning_rate: 0.1,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.,
        };
        let mut optimizer = spec.build(3);

        assert!(optimizer.update_params(&[1.; 3], &mut [0.; 3]).is_ok());
        assert!(optimizer.update_params(&[1.; 4], &mut [0.; 4]).is_err());
    }
}
