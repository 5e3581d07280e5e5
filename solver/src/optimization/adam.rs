use super::{Optimizer, check_len, regularized};
use crate::Result;

/// Adam, with bias corrected first and second moment estimates of the gradient.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    /// Updates applied so far.
    t: i32,
    /// Running mean and uncentered variance of each parameter's gradient.
    moments: Box<[(f32, f32)]>,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters to keep moments for.
    /// * `learning_rate` - The base step size.
    /// * `beta1` - Decay of the first moment estimate.
    /// * `beta2` - Decay of the second moment estimate.
    /// * `epsilon` - Keeps the denominator away from zero.
    ///
    /// # Returns
    /// A new `Adam` instance with zeroed moments.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            weight_decay: 0.,
            t: 0,
            moments: vec![(0., 0.); len].into(),
        }
    }

    /// Adds an L2 penalty of `weight_decay` to the gradient before the moments see it.
    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    /// Returns the step size for the current update, corrected for the zero initialized moments.
    fn corrected_rate(&self) -> f32 {
        let bias1 = 1. - self.beta1.powi(self.t);
        let bias2 = 1. - self.beta2.powi(self.t);
        self.learning_rate * bias2.sqrt() / bias1
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(grad, params, self.moments.len())?;

        self.t = self.t.saturating_add(1);
        let rate = self.corrected_rate();
        let (b1, b2, eps, decay) = (self.beta1, self.beta2, self.epsilon, self.weight_decay);

        for ((param, &g), (m, v)) in params.iter_mut().zip(grad).zip(self.moments.iter_mut()) {
            let g = regularized(g, *param, decay);
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            *param -= rate * *m / (v.sqrt() + eps);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut optimizer = Adam::new(2, 0.1, 0.9, 0.999, 1e-8);
        let mut params = [1., 1.];

        optimizer.update_params(&[3., -3.], &mut params).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-4);
        assert!((params[1] - 1.1).abs() < 1e-4);
    }

    #[test]
    fn step_size_ignores_gradient_scale() {
        let mut small = Adam::new(1, 0.01, 0.9, 0.999, 1e-8);
        let mut large = Adam::new(1, 0.01, 0.9, 0.999, 1e-8);
        let (mut a, mut b) = ([0.], [0.]);

        for _ in 0..5 {
            small.update_params(&[1e-3], &mut a).unwrap();
            large.update_params(&[1e3], &mut b).unwrap();
        }

        assert!((a[0] - b[0]).abs() < 1e-4, "{a:?} vs {b:?}");
    }
}
