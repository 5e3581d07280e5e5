use std::sync::Arc;

use device::Runtime;
use log::{debug, info};

use crate::{
    Net, Result, Solver, SolverErr, SolverParams, StepCallback, objective::Objective,
    optimization::Optimizer,
};

/// A stochastic gradient solver.
///
/// Every step reads the parameters through the net's storage, asks the objective for a
/// gradient, writes it into the net's gradient storage and, once the callback had its say
/// over that gradient, applies it with the optimizer.
pub struct SgdSolver<J: Objective, O: Optimizer> {
    runtime: Arc<dyn Runtime>,
    params: SolverParams,
    net: Net,
    objective: J,
    optimizer: O,
    iter: usize,
    values: Vec<f32>,
    grad: Vec<f32>,
    losses: Vec<f32>,
}

impl<J: Objective, O: Optimizer> SgdSolver<J, O> {
    /// Creates a new `SgdSolver`.
    ///
    /// # Arguments
    /// * `runtime` - The runtime owning any device resident storage of the net.
    /// * `params` - The solver configuration.
    /// * `net` - The parameters to optimize.
    /// * `objective` - The gradient computation.
    /// * `optimizer` - The update rule.
    ///
    /// # Returns
    /// A new `SgdSolver` or a `SizeMismatch` error if the objective expects a different
    /// amount of parameters than the net holds.
    pub fn new(
        runtime: Arc<dyn Runtime>,
        params: SolverParams,
        net: Net,
        objective: J,
        optimizer: O,
    ) -> Result<Self> {
        let len = net.total_size();

        if objective.len() != len {
            return Err(SolverErr::SizeMismatch {
                what: "objective",
                got: objective.len(),
                expected: len,
            });
        }

        Ok(Self {
            runtime,
            params,
            net,
            objective,
            optimizer,
            iter: 0,
            values: vec![0.; len],
            grad: vec![0.; len],
            losses: Vec::new(),
        })
    }

    /// Returns the loss of every step executed so far.
    pub fn losses(&self) -> &[f32] {
        &self.losses
    }

    pub fn objective(&self) -> &J {
        &self.objective
    }

    pub fn objective_mut(&mut self) -> &mut J {
        &mut self.objective
    }
}

impl<J: Objective, O: Optimizer> Solver for SgdSolver<J, O> {
    fn params(&self) -> &SolverParams {
        &self.params
    }

    fn net(&self) -> &Net {
        &self.net
    }

    fn net_mut(&mut self) -> &mut Net {
        &mut self.net
    }

    fn iter(&self) -> usize {
        self.iter
    }

    fn step<C: StepCallback>(
        &mut self,
        iters: usize,
        callback: &mut C,
    ) -> std::result::Result<(), C::Error> {
        let device = self.params.device_id;
        let rt = &*self.runtime;

        for _ in 0..iters {
            if callback.must_stop() {
                debug!(device = device, iter = self.iter; "solver asked to stop");
                break;
            }

            callback.on_start()?;

            self.net.gather_data(rt, &mut self.values)?;
            let loss = self.objective.gradient(&self.values, &mut self.grad)?;
            self.net.scatter_diff(rt, &self.grad)?;

            callback.on_gradients_ready()?;

            if callback.applies_update() {
                self.net.gather_diff(rt, &mut self.grad)?;
                self.optimizer.update_params(&self.grad, &mut self.values)?;
                self.net.scatter_data(rt, &self.values)?;
            }

            self.iter += 1;
            self.losses.push(loss);

            let display = self.params.display;
            if display > 0 && self.iter % display == 0 {
                info!(device = device, iter = self.iter, loss = loss; "iteration");
            }
        }

        Ok(())
    }
}
