use device::DeviceId;
use serde::{Deserialize, Serialize};

use crate::{Net, SolverErr};

/// The configuration of a solver instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverParams {
    /// The device this solver's buffers live on.
    #[serde(default)]
    pub device_id: DeviceId,
    /// The iteration at which `solve` stops.
    pub max_iter: usize,
    /// The seed for any randomness of the solver, `None` for a non deterministic one.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Log the loss every `display` iterations, `0` disables it.
    #[serde(default)]
    pub display: usize,
}

/// The hooks a solver calls at fixed points of every optimization step.
///
/// A solver holds the callback only for the duration of `Solver::step`, which lets the
/// callback own everything except the solver itself.
pub trait StepCallback {
    type Error: From<SolverErr>;

    /// Called before the step reads its parameters.
    fn on_start(&mut self) -> Result<(), Self::Error>;

    /// Called once the local gradient is in the net's gradient storage and before it's applied.
    fn on_gradients_ready(&mut self) -> Result<(), Self::Error>;

    /// Whether the solver applies the gradient to its own parameters after
    /// `on_gradients_ready`.
    ///
    /// Callbacks that overwrite the parameters before the next step starts return `false`,
    /// the solver then leaves both its parameters and its gradient untouched until the
    /// next `on_start`.
    fn applies_update(&self) -> bool {
        true
    }

    /// Checked before every step, returning `true` ends the loop early.
    fn must_stop(&self) -> bool {
        false
    }
}

/// A callback that does nothing, for solvers running on their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSync;

impl StepCallback for NoSync {
    type Error = SolverErr;

    fn on_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn on_gradients_ready(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// An optimization loop over a `Net`.
pub trait Solver: Send {
    fn params(&self) -> &SolverParams;

    fn net(&self) -> &Net;

    fn net_mut(&mut self) -> &mut Net;

    /// Returns the amount of steps executed so far.
    fn iter(&self) -> usize;

    /// Runs `iters` optimization steps.
    ///
    /// # Arguments
    /// * `iters` - The amount of steps to run.
    /// * `callback` - The step boundary hooks.
    ///
    /// # Returns
    /// The first error raised by the solver or by the callback.
    fn step<C: StepCallback>(&mut self, iters: usize, callback: &mut C) -> Result<(), C::Error>;

    /// Runs steps until `max_iter` is reached.
    fn solve<C: StepCallback>(&mut self, callback: &mut C) -> Result<(), C::Error> {
        let remaining = self.params().max_iter.saturating_sub(self.iter());
        self.step(remaining, callback)
    }
}
