use std::{sync::Arc, time::Instant};

use device::{DeviceId, DevicePtr};
use log::{debug, error, info};
use solver::{Solver, StepCallback};

use crate::{
    DeviceParams, Result, SyncErr,
    queue::{Closed, HandoffErr},
    timing::{StepTiming, SyncMetrics},
    tree::SyncTree,
};

/// The link from a worker up to its parent.
///
/// Owns the staging buffer the worker sends its gradient through, which lives on the
/// parent's device, and the peer access the worker enabled towards the parent.
struct ParentLink {
    tree: Arc<SyncTree>,
    index: usize,
    device: DeviceId,
    child: DeviceId,
    staging: DevicePtr,
    peer_access: bool,
}

impl ParentLink {
    fn attach(tree: Arc<SyncTree>, child: DeviceId, index: usize, size: usize) -> Result<Self> {
        let rt = tree.runtime();
        let peer = tree.device(index);

        let peer_access = rt.can_access_peer(child, peer)?;
        if peer_access {
            rt.enable_peer_access(child, peer)?;
        } else {
            info!("device {child} does not have peer access to device {peer}");
        }

        let staging = match rt.malloc(peer, size) {
            Ok(staging) => staging,
            Err(e) => {
                if peer_access {
                    if let Err(e) = rt.disable_peer_access(child, peer) {
                        error!(device = child; "failed to disable peer access: {e}");
                    }
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            tree,
            index,
            device: peer,
            child,
            staging,
            peer_access,
        })
    }
}

impl Drop for ParentLink {
    fn drop(&mut self) {
        let rt = self.tree.runtime();

        if let Err(e) = rt.free(self.staging) {
            error!(device = self.child; "failed to free staging buffer {}: {e}", self.staging);
        }

        if !self.peer_access {
            return;
        }

        if let Err(e) = rt.disable_peer_access(self.child, self.device) {
            error!(device = self.child; "failed to disable peer access: {e}");
        }
    }
}

/// What a parent needs to know about each of its children.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChildLink {
    index: usize,
    device: DeviceId,
    data: DevicePtr,
    staging: DevicePtr,
}

/// The synchronization side of a worker, handed to its solver as the step callback.
pub(crate) struct SyncHooks {
    tree: Arc<SyncTree>,
    index: usize,
    device: DeviceId,
    params: DeviceParams,
    parent: Option<ParentLink>,
    children: Vec<ChildLink>,
    received: Vec<usize>,
    step: usize,
    timing: StepTiming,
    metrics: SyncMetrics,
}

impl SyncHooks {
    /// Registers `child` as a child of this worker.
    pub fn adopt(&mut self, child: ChildLink) {
        self.children.push(child);
    }

    /// Returns the link a parent of this worker needs, `None` for the root.
    pub fn link(&self) -> Option<ChildLink> {
        self.parent.as_ref().map(|parent| ChildLink {
            index: self.index,
            device: self.device,
            data: self.params.data(),
            staging: parent.staging,
        })
    }

    fn pop(&self) -> Result<usize> {
        self.tree
            .queue(self.index)
            .pop()
            .map_err(|e| self.handoff_err(e))
    }

    fn push(&self, index: usize) -> Result<()> {
        self.tree
            .queue(index)
            .push(self.index)
            .map_err(|e| self.handoff_err(e))
    }

    fn handoff_err(&self, e: HandoffErr) -> SyncErr {
        match e {
            HandoffErr::Duplicate(sender) => SyncErr::DuplicateToken {
                device: self.device,
                sender: self.tree.device(sender),
            },
            HandoffErr::Closed(Closed::Shutdown) => SyncErr::Stopped,
            HandoffErr::Closed(Closed::Aborted) => SyncErr::Aborted,
        }
    }

    fn check_device(&self, what: &'static str, ptr: DevicePtr, expected: DeviceId) -> Result<()> {
        if !self.tree.config().debug_checks {
            return Ok(());
        }

        let got = self.tree.runtime().pointer_device(ptr)?;
        if got != expected {
            return Err(SyncErr::WrongDevice {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl StepCallback for SyncHooks {
    type Error = SyncErr;

    fn on_start(&mut self) -> Result<()> {
        self.timing = StepTiming::default();
        let rt = self.tree.runtime();

        if let Some(parent) = &self.parent {
            let start = Instant::now();
            let sender = self.pop()?;

            if sender != parent.index {
                return Err(SyncErr::UnexpectedSender {
                    device: self.device,
                    sender: self.tree.device(sender),
                });
            }

            self.timing.recv_param = Some(start.elapsed());
        }

        if self.children.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let src = self.params.data();

        for child in &self.children {
            self.check_device("parameter buffer", src, self.device)?;
            self.check_device("child parameter buffer", child.data, child.device)?;
            rt.memcpy_async(self.device, child.data.whole(), src.whole())?;
        }

        rt.synchronize(self.device)?;

        for child in &self.children {
            self.push(child.index)?;
        }

        self.timing.send_param = Some(start.elapsed());
        Ok(())
    }

    fn on_gradients_ready(&mut self) -> Result<()> {
        let rt = self.tree.runtime();
        let diff = self.params.diff();
        self.received.clear();

        for _ in 0..self.children.len() {
            let start = Instant::now();
            let sender = self.pop()?;

            let child = self
                .children
                .iter()
                .find(|child| child.index == sender)
                .ok_or(SyncErr::UnexpectedSender {
                    device: self.device,
                    sender: self.tree.device(sender),
                })?;

            if self.received.contains(&sender) {
                return Err(SyncErr::DuplicateToken {
                    device: self.device,
                    sender: child.device,
                });
            }
            self.received.push(sender);

            self.check_device("staging buffer", child.staging, self.device)?;
            self.check_device("gradient buffer", diff, self.device)?;
            rt.add(self.device, child.staging.whole(), diff.whole())?;

            let elapsed = start.elapsed();
            self.timing.add_grad = Some(self.timing.add_grad.unwrap_or_default() + elapsed);
        }

        match &self.parent {
            Some(parent) => {
                let start = Instant::now();

                self.check_device("gradient buffer", diff, self.device)?;
                self.check_device("staging buffer", parent.staging, parent.device)?;
                rt.memcpy_async(self.device, parent.staging.whole(), diff.whole())?;
                rt.synchronize(self.device)?;
                self.push(parent.index)?;

                self.timing.send_grad = Some(start.elapsed());
            }
            None => {
                // Every solver averaged over its own share of the batch.
                let alpha = 1. / self.tree.solver_count() as f32;
                rt.scale(self.device, alpha, diff.whole())?;
            }
        }

        self.step += 1;
        self.metrics.record(&self.timing);
        debug!(device = self.device, step = self.step; "timing{}", self.timing);

        Ok(())
    }

    /// Only the root updates, everyone else gets its parameters from the next broadcast
    /// and must not write them once its gradient is on the way up.
    fn applies_update(&self) -> bool {
        self.parent.is_none()
    }

    fn must_stop(&self) -> bool {
        self.tree.must_stop()
    }
}

/// A solver together with its place in the synchronization tree.
pub(crate) struct SyncWorker<S> {
    solver: S,
    hooks: SyncHooks,
}

impl<S: Solver> SyncWorker<S> {
    /// Creates a new `SyncWorker`.
    ///
    /// # Arguments
    /// * `tree` - The state shared by the run.
    /// * `index` - The arena index of this worker.
    /// * `params` - The mirror this worker's solver will run on.
    /// * `solver` - The solver, configured for the mirror's device.
    /// * `parent` - The arena index of the parent, `None` for the root.
    ///
    /// # Returns
    /// A new `SyncWorker` or an error if the solver doesn't fit the mirror.
    pub fn new(
        tree: Arc<SyncTree>,
        index: usize,
        params: DeviceParams,
        mut solver: S,
        parent: Option<usize>,
    ) -> Result<Self> {
        let device = params.device();
        let solver_device = solver.params().device_id;

        if solver_device != device {
            return Err(SyncErr::WrongDevice {
                what: "solver",
                got: solver_device,
                expected: device,
            });
        }

        params.configure(solver.net_mut())?;

        let parent = parent
            .map(|parent| ParentLink::attach(Arc::clone(&tree), device, parent, params.size()))
            .transpose()?;

        debug!(device = device, index = index; "built worker");

        Ok(Self {
            solver,
            hooks: SyncHooks {
                tree,
                index,
                device,
                params,
                parent,
                children: Vec::new(),
                received: Vec::new(),
                step: 0,
                timing: StepTiming::default(),
                metrics: SyncMetrics::default(),
            },
        })
    }

    pub fn device(&self) -> DeviceId {
        self.hooks.device
    }

    pub fn hooks(&self) -> &SyncHooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut SyncHooks {
        &mut self.hooks
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Runs `iters` synchronized steps, the entry point of non-root worker threads.
    pub fn run(&mut self, iters: usize) -> Result<()> {
        let res = self.solver.step(iters, &mut self.hooks);
        self.finish(res)
    }

    /// Runs the solver to its configured end, the entry point of the root.
    pub fn solve(&mut self) -> Result<()> {
        let res = self.solver.solve(&mut self.hooks);
        self.finish(res)
    }

    /// Detaches the solver from the mirror and hands it back.
    pub fn into_solver(self) -> Result<S> {
        let Self { mut solver, hooks } = self;
        hooks.params.restore_host(solver.net_mut())?;
        Ok(solver)
    }

    fn finish(&self, res: Result<()>) -> Result<()> {
        let device = self.hooks.device;
        let metrics = &self.hooks.metrics;

        match res {
            Ok(()) | Err(SyncErr::Stopped) => {
                info!(
                    device = device,
                    steps = metrics.steps,
                    sync_ms = metrics.total().as_secs_f64() * 1e3;
                    "worker done"
                );
                Ok(())
            }
            Err(SyncErr::Aborted) => {
                debug!(device = device; "worker aborted");
                Err(SyncErr::Aborted)
            }
            Err(e) => {
                error!(device = device; "worker failed: {e}");
                self.hooks.tree.abort(self.hooks.index);
                Err(e)
            }
        }
    }
}
