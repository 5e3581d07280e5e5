use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use device::{DeviceId, Runtime};
use log::warn;
use parking_lot::Mutex;

use crate::{
    SyncConfig,
    queue::{Closed, HandoffQueue},
};

/// The state every worker of a run shares.
///
/// Workers are addressed by their index in the run's arena, which is also the index of
/// their pair and of their queue.
pub(crate) struct SyncTree {
    runtime: Arc<dyn Runtime>,
    config: SyncConfig,
    devices: Box<[DeviceId]>,
    queues: Box<[HandoffQueue]>,
    stop: AtomicBool,
    failure: Mutex<Option<usize>>,
}

impl SyncTree {
    pub fn new(runtime: Arc<dyn Runtime>, config: SyncConfig, devices: Vec<DeviceId>) -> Self {
        let queues = devices.iter().map(|_| HandoffQueue::new()).collect();

        Self {
            runtime,
            config,
            devices: devices.into_boxed_slice(),
            queues,
            stop: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    pub fn runtime(&self) -> &dyn Runtime {
        &*self.runtime
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the amount of workers taking part in the run.
    pub fn solver_count(&self) -> usize {
        self.devices.len()
    }

    pub fn device(&self, index: usize) -> DeviceId {
        self.devices[index]
    }

    pub fn queue(&self, index: usize) -> &HandoffQueue {
        &self.queues[index]
    }

    pub fn must_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.failure.lock().is_some()
    }

    /// Asks every worker to stop between steps and releases any still waiting on a peer.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.close(Closed::Shutdown);
    }

    /// Tears the tree down after worker `index` failed.
    ///
    /// # Returns
    /// Whether `index` is the first failure of the run.
    pub fn abort(&self, index: usize) -> bool {
        let first = {
            let mut failure = self.failure.lock();
            let first = failure.is_none();
            failure.get_or_insert(index);
            first
        };

        if first {
            warn!(device = self.device(index); "worker failed, aborting every worker");
        }

        self.close(Closed::Aborted);
        first
    }

    /// Returns the index of the first worker that failed, if any.
    pub fn first_failure(&self) -> Option<usize> {
        *self.failure.lock()
    }

    fn close(&self, reason: Closed) {
        self.queues.iter().for_each(|queue| queue.close(reason));
    }
}

#[cfg(test)]
mod tests {
    use device::{HostRuntime, HostTopology};

    use super::*;
    use crate::queue::HandoffErr;

    fn tree() -> SyncTree {
        let rt = Arc::new(HostRuntime::new(&HostTopology::new(3)).unwrap());
        SyncTree::new(rt, SyncConfig::default(), vec![2, 0, 1])
    }

    #[test]
    fn first_failure_wins() {
        let tree = tree();
        assert!(!tree.must_stop());

        assert!(tree.abort(2));
        assert!(!tree.abort(1));

        assert_eq!(tree.first_failure(), Some(2));
        assert!(tree.must_stop());
        assert_eq!(
            tree.queue(0).pop(),
            Err(HandoffErr::Closed(Closed::Aborted))
        );
    }

    #[test]
    fn stop_shuts_every_queue_down() {
        let tree = tree();
        tree.stop();

        assert!(tree.must_stop());
        assert_eq!(tree.first_failure(), None);
        for index in 0..tree.solver_count() {
            assert_eq!(
                tree.queue(index).push(0),
                Err(HandoffErr::Closed(Closed::Shutdown))
            );
        }
        assert_eq!(tree.device(0), 2);
    }
}
