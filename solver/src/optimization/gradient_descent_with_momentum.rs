use super::{Optimizer, check_len, regularized};
use crate::Result;

/// Gradient descent where each update keeps a fraction of the previous one.
///
/// The history holds the last applied update, already scaled by the learning rate, so
/// `update = momentum * update + learning_rate * (grad + weight_decay * param)`.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    weight_decay: f32,
    history: Box<[f32]>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer for `len` parameters.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            weight_decay: 0.,
            history: vec![0.; len].into(),
        }
    }

    /// Adds an L2 penalty of `weight_decay` to every update.
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.history.len())?;

        let (lr, mu, decay) = (self.learning_rate, self.momentum, self.weight_decay);

        for ((param, &g), update) in params.iter_mut().zip(grad).zip(self.history.iter_mut()) {
            let g = regularized(g, *param, decay);
            *update = mu * *update + lr * g;
            *param -= *update;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_accumulates() {
        let mut optimizer = GradientDescentWithMomentum::new(1, 1., 0.5);
        let mut params = [0.];

        optimizer.update_params(&[1.], &mut params).unwrap();
        assert_eq!(params, [-1.]);

        optimizer.update_params(&[1.], &mut params).unwrap();
        assert_eq!(params, [-2.5]);
    }

    #[test]
    fn weight_decay_pulls_towards_zero() {
        let mut optimizer = GradientDescentWithMomentum::new(2, 0.5, 0.).with_weight_decay(0.1);
        let mut params = [2., -4.];

        optimizer.update_params(&[0., 0.], &mut params).unwrap();

        assert!((params[0] - 1.9).abs() < 1e-6);
        assert!((params[1] + 3.8).abs() < 1e-6);
    }

    #[test]
    fn history_length_is_checked() {
        let mut optimizer = GradientDescentWithMomentum::new(3, 0.1, 0.9);
        assert!(optimizer.update_params(&[1., 1.], &mut [0., 0.]).is_err());
    }
}
