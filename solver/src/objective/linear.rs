use std::num::NonZeroUsize;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::Objective;
use crate::{Blob, Net, Result, SolverErr};

/// Describes a synthetic linear regression dataset.
///
/// Every worker generates the same dataset from `seed`, the samples each one draws per
/// step depend on the solver's own random seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub samples: NonZeroUsize,
    pub weights: Vec<f32>,
    pub bias: f32,
    #[serde(default)]
    pub noise: f32,
    #[serde(default)]
    pub seed: u64,
}

/// Mean squared error of an affine model `y = x · w + b` over a synthetic dataset.
///
/// The flat parameter layout is the weights followed by the bias.
#[derive(Debug)]
pub struct LinearRegression<R: Rng> {
    x: Array2<f32>,
    y: Array1<f32>,
    batch_size: NonZeroUsize,
    rng: R,
}

impl LinearRegression<StdRng> {
    /// Creates a new `LinearRegression` over a dataset generated from `spec`.
    ///
    /// # Arguments
    /// * `spec` - The dataset to generate.
    /// * `batch_size` - The amount of samples per step.
    /// * `seed` - The seed for drawing batches, `None` to seed from the OS.
    ///
    /// # Returns
    /// A new `LinearRegression` instance or an `InvalidInput` error if the dataset has no features.
    pub fn synthetic(
        spec: &DatasetSpec,
        batch_size: NonZeroUsize,
        seed: Option<u64>,
    ) -> Result<Self> {
        if spec.weights.is_empty() {
            return Err(SolverErr::InvalidInput("the dataset needs at least one feature"));
        }

        let mut data_rng = StdRng::seed_from_u64(spec.seed);
        let features = spec.weights.len();
        let samples = spec.samples.get();

        let x = Array2::<f32>::from_shape_fn((samples, features), |_| {
            data_rng.random_range(-1.0..1.0)
        });

        let w = ArrayView1::from(&spec.weights);
        let y = x.dot(&w).mapv(|v| {
            let noise: f32 = data_rng.sample(StandardNormal);
            v + spec.bias + spec.noise * noise
        });

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            x,
            y,
            batch_size,
            rng,
        })
    }
}

impl<R: Rng> LinearRegression<R> {
    /// Returns the amount of input features.
    pub fn features(&self) -> usize {
        self.x.ncols()
    }

    /// Creates a `Net` with the right layout for this objective.
    ///
    /// # Arguments
    /// * `init` - The initial value for every parameter.
    pub fn net(&self, init: f32) -> Net {
        Net::new(vec![
            Blob::new("weights", vec![init; self.features()]),
            Blob::new("bias", vec![init]),
        ])
    }
}

impl<R: Rng + Send> Objective for LinearRegression<R> {
    fn len(&self) -> usize {
        self.features() + 1
    }

    fn gradient(&mut self, params: &[f32], grad: &mut [f32]) -> Result<f32> {
        let len = self.len();

        for (what, got) in [("params", params.len()), ("gradient", grad.len())] {
            if got != len {
                return Err(SolverErr::SizeMismatch {
                    what,
                    got,
                    expected: len,
                });
            }
        }

        let samples = self.x.nrows();
        let batch: Vec<usize> = (0..self.batch_size.get())
            .map(|_| self.rng.random_range(0..samples))
            .collect();

        let xb = self.x.select(Axis(0), &batch);
        let yb = self.y.select(Axis(0), &batch);

        let (w, b) = params.split_at(len - 1);
        let w = ArrayView1::from(w);

        let residual = xb.dot(&w) + b[0] - &yb;
        let n = batch.len() as f32;
        let loss = residual.mapv(|r| r.powi(2)).sum() / n;

        let grad_w = xb.t().dot(&residual) * (2. / n);
        let (gw, gb) = grad.split_at_mut(len - 1);

        gw.iter_mut().zip(&grad_w).for_each(|(g, v)| *g = *v);
        gb[0] = residual.sum() * (2. / n);

        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DatasetSpec {
        DatasetSpec {
            samples: NonZeroUsize::new(64).unwrap(),
            weights: vec![2., -1.],
            bias: 0.5,
            noise: 0.,
            seed: 7,
        }
    }

    #[test]
    fn zero_gradient_at_the_optimum() {
        let batch = NonZeroUsize::new(16).unwrap();
        let mut objective = LinearRegression::synthetic(&spec(), batch, Some(1)).unwrap();

        let mut grad = [1.; 3];
        let loss = objective.gradient(&[2., -1., 0.5], &mut grad).unwrap();

        assert!(loss < 1e-8);
        assert!(grad.iter().all(|g| g.abs() < 1e-4));
    }

    #[test]
    fn gradient_points_away_from_the_optimum() {
        let batch = NonZeroUsize::new(64).unwrap();
        let mut objective = LinearRegression::synthetic(&spec(), batch, Some(1)).unwrap();

        let mut grad = [0.; 3];
        objective.gradient(&[2., -1., 1.5], &mut grad).unwrap();

        // Only the bias is off by +1, so its derivative is exactly 2.
        assert!((grad[2] - 2.).abs() < 1e-4);
    }

    #[test]
    fn net_layout_matches_objective() {
        let batch = NonZeroUsize::new(4).unwrap();
        let objective = LinearRegression::synthetic(&spec(), batch, None).unwrap();
        let net = objective.net(0.);

        assert_eq!(net.total_size(), objective.len());
        assert_eq!(net.params()[0].name(), "weights");
    }

    #[test]
    fn wrong_sizes() {
        let batch = NonZeroUsize::new(4).unwrap();
        let mut objective = LinearRegression::synthetic(&spec(), batch, None).unwrap();

        assert!(objective.gradient(&[0.; 2], &mut [0.; 3]).is_err());
    }
}
