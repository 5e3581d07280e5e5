use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, ScopedJoinHandle},
};

use device::{DeviceId, Runtime};
use log::{debug, info};
use solver::{Solver, SolverParams};

use crate::{
    DeviceParams, DevicePair, Result, SyncConfig, SyncErr, TopologyErr, tree::SyncTree,
    worker::SyncWorker,
};

/// Tree structured data parallel training across the devices of one machine.
pub struct P2PSync;

impl P2PSync {
    /// Trains `root` with one solver per device, keeping every solver in lockstep.
    ///
    /// The root solver runs on the calling thread, every other solver on its own thread.
    /// Before each step parameters flow from the root down the tree, after each step
    /// gradients are summed up the tree and the root averages them.
    ///
    /// # Arguments
    /// * `runtime` - The device runtime.
    /// * `root` - The solver whose parameters seed every other solver, its device must be
    ///   the first of `devices`.
    /// * `factory` - Builds a fresh solver from the params of a non-root device.
    /// * `devices` - The participating devices.
    /// * `config` - Run wide knobs.
    ///
    /// # Returns
    /// The root solver, moved back onto host memory and holding the trained parameters,
    /// or the error of the first worker that failed.
    pub fn run<S, F>(
        runtime: Arc<dyn Runtime>,
        root: S,
        mut factory: F,
        devices: &[DeviceId],
        config: SyncConfig,
    ) -> Result<S>
    where
        S: Solver,
        F: FnMut(SolverParams) -> solver::Result<S>,
    {
        let pairs = DevicePair::compute(devices, &*runtime)?;
        info!(depth = DevicePair::depth(&pairs); "computed synchronization tree");

        let tree = Arc::new(SyncTree::new(
            Arc::clone(&runtime),
            config,
            pairs.iter().map(DevicePair::device).collect(),
        ));

        let initial_iter = root.iter();
        let iters = root.params().max_iter.saturating_sub(initial_iter);
        let root_params = root.params().clone();

        let mut workers = Self::build(&runtime, &tree, &pairs, root, &root_params, &mut factory)?;

        info!(workers = workers.len(), iters = iters; "starting optimization");

        let (root, others) = workers
            .split_first_mut()
            .ok_or(TopologyErr::NoDevices)?;

        let shared: &SyncTree = &tree;
        let results = thread::scope(|s| -> Result<Vec<Result<()>>> {
            let mut handles = Vec::with_capacity(others.len());

            for worker in others.iter_mut() {
                let device = worker.device();
                let index = handles.len() + 1;

                let spawned = thread::Builder::new()
                    .name(format!("p2p-sync-{device}"))
                    .spawn_scoped(s, move || {
                        let _guard = AbortOnPanic {
                            tree: shared,
                            index,
                        };
                        worker.run(iters)
                    });

                match spawned {
                    Ok(handle) => handles.push((device, handle)),
                    Err(e) => {
                        shared.abort(0);
                        join_all(handles);
                        return Err(SyncErr::Spawn(e));
                    }
                }
            }

            let mut results = vec![solve_root(shared, root)];
            shared.stop();
            results.extend(join_all(handles));

            Ok(results)
        })?;

        if let Some(index) = tree.first_failure() {
            debug!(device = tree.device(index); "run failed");
            return Err(results
                .into_iter()
                .nth(index)
                .and_then(Result::err)
                .unwrap_or(SyncErr::Aborted));
        }

        results.into_iter().collect::<Result<Vec<()>>>()?;

        let mut workers = workers.into_iter();
        let root = workers.next().ok_or(TopologyErr::NoDevices)?;
        drop(workers);

        info!("optimization done");
        root.into_solver()
    }

    /// Builds the root worker and then every other worker once its parent exists.
    fn build<S, F>(
        runtime: &Arc<dyn Runtime>,
        tree: &Arc<SyncTree>,
        pairs: &[DevicePair],
        root: S,
        root_params: &SolverParams,
        factory: &mut F,
    ) -> Result<Vec<SyncWorker<S>>>
    where
        S: Solver,
        F: FnMut(SolverParams) -> solver::Result<S>,
    {
        let mut workers: Vec<Option<SyncWorker<S>>> = pairs.iter().map(|_| None).collect();
        let mut index_of = HashMap::with_capacity(pairs.len());

        let root_device = pairs[0].device();
        let params = DeviceParams::new(Arc::clone(runtime), root.net(), root_device)?;
        workers[0] = Some(SyncWorker::new(Arc::clone(tree), 0, params, root, None)?);
        index_of.insert(root_device, 0);

        for _ in 0..pairs.len() {
            for (i, pair) in pairs.iter().enumerate().skip(1) {
                if workers[i].is_some() {
                    continue;
                }

                let Some(&parent) = pair.parent().and_then(|p| index_of.get(&p)) else {
                    continue;
                };

                let device = pair.device();
                let Some(root) = &workers[0] else {
                    return Err(TopologyErr::Unreachable(root_device).into());
                };
                let params = DeviceParams::new(Arc::clone(runtime), root.solver().net(), device)?;

                let solver = factory(worker_params(root_params, device))?;
                let worker = SyncWorker::new(Arc::clone(tree), i, params, solver, Some(parent))?;

                if let (Some(link), Some(parent_worker)) =
                    (worker.hooks().link(), &mut workers[parent])
                {
                    parent_worker.hooks_mut().adopt(link);
                }

                workers[i] = Some(worker);
                index_of.insert(device, i);
            }
        }

        workers
            .into_iter()
            .zip(pairs)
            .map(|(worker, pair)| {
                worker.ok_or_else(|| SyncErr::from(TopologyErr::Unreachable(pair.device())))
            })
            .collect()
    }
}

/// The params of the solver running on `device`.
///
/// A configured seed is offset by the device id so that solvers draw different batches.
fn worker_params(root: &SolverParams, device: DeviceId) -> SolverParams {
    SolverParams {
        device_id: device,
        random_seed: root.random_seed.map(|seed| seed.wrapping_add(device as u64)),
        ..root.clone()
    }
}

/// Runs the root worker on the calling thread, a panic aborts the tree like any failure.
fn solve_root<S: Solver>(tree: &SyncTree, root: &mut SyncWorker<S>) -> Result<()> {
    let device = root.device();

    panic::catch_unwind(AssertUnwindSafe(|| root.solve())).unwrap_or_else(|_| {
        tree.abort(0);
        Err(SyncErr::WorkerPanicked(device))
    })
}

fn join_all(handles: Vec<(DeviceId, ScopedJoinHandle<'_, Result<()>>)>) -> Vec<Result<()>> {
    handles
        .into_iter()
        .map(|(device, handle)| {
            handle
                .join()
                .unwrap_or(Err(SyncErr::WorkerPanicked(device)))
        })
        .collect()
}

/// Tears the tree down if the worker thread unwinds, so no peer waits on it forever.
struct AbortOnPanic<'a> {
    tree: &'a SyncTree,
    index: usize,
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.tree.abort(self.index);
        }
    }
}
