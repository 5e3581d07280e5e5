mod config;
mod error;

use std::{num::NonZeroUsize, sync::Arc};

use device::{HostRuntime, Runtime};
use log::info;
use p2p_sync::{P2PSync, divide_batch_size};
use solver::{SgdSolver, Solver, SolverParams, objective::LinearRegression};

pub use config::TrainingSpec;
pub use error::{Result, TrainerErr};

/// The outcome of a training session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// The trained parameters, weights first and bias last.
    pub params: Vec<f32>,
    pub iters: usize,
    /// The root's loss on its last step.
    pub loss: Option<f32>,
}

/// Trains a linear regression on a simulated machine as described by `spec`.
///
/// # Arguments
/// * `spec` - The training session to run.
///
/// # Returns
/// The trained model or the first error of the session.
pub fn train(spec: &TrainingSpec) -> Result<TrainingReport> {
    let runtime: Arc<dyn Runtime> = Arc::new(HostRuntime::new(&spec.topology)?);
    let devices = spec.devices();

    let Some(&root_device) = devices.first() else {
        return Err(TrainerErr::InvalidConfig("there are no devices to train on"));
    };

    let batch = divide_batch_size(spec.batch_size.get(), devices.len())?;
    let batch = NonZeroUsize::new(batch).ok_or(TrainerErr::InvalidConfig("empty batch"))?;

    info!(
        devices = devices.len(),
        batch_size = batch.get();
        "training on {} simulated devices",
        runtime.device_count()
    );

    let build = |params: SolverParams| -> solver::Result<_> {
        let objective = LinearRegression::synthetic(&spec.dataset, batch, params.random_seed)?;
        let net = objective.net(0.);
        let optimizer = spec.optimizer.build(net.total_size());

        SgdSolver::new(Arc::clone(&runtime), params, net, objective, optimizer)
    };

    let root = build(SolverParams {
        device_id: root_device,
        ..spec.solver.clone()
    })?;

    let solver = P2PSync::run(Arc::clone(&runtime), root, build, &devices, spec.sync)?;

    let mut params = vec![0.; solver.net().total_size()];
    solver.net().gather_data(&*runtime, &mut params)?;

    Ok(TrainingReport {
        params,
        iters: solver.iter(),
        loss: solver.losses().last().copied(),
    })
}
