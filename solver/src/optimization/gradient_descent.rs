use rayon::prelude::*;

use super::{Optimizer, check_len, regularized};
use crate::Result;

/// Plain gradient descent, `param -= learning_rate * (grad + weight_decay * param)`.
#[derive(Debug)]
pub struct GradientDescent {
    learning_rate: f32,
    weight_decay: f32,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The step size.
    ///
    /// # Returns
    /// A new `GradientDescent` instance without weight decay.
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            weight_decay: 0.,
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, params.len())?;

        let Self {
            learning_rate,
            weight_decay,
        } = *self;

        params
            .par_iter_mut()
            .zip(grad)
            .for_each(|(p, &g)| *p -= learning_rate * regularized(g, *p, weight_decay));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut optimizer = GradientDescent::new(0.5);
        let mut params = [1., 1.];

        optimizer.update_params(&[2., -2.], &mut params).unwrap();
        assert_eq!(params, [0., 2.]);
    }

    #[test]
    fn size_mismatch() {
        let mut optimizer = GradientDescent::new(0.5);
        assert!(optimizer.update_params(&[1.], &mut [0., 0.]).is_err());
    }
}
