use std::{fs, num::NonZeroUsize, path::Path};

use device::{DeviceId, HostTopology};
use p2p_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use solver::{SolverParams, objective::DatasetSpec, optimization::OptimizerSpec};

use crate::Result;

/// Everything needed to run a synchronized training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSpec {
    /// The devices to train on, the first one hosts the root. Empty means every device.
    #[serde(default)]
    pub devices: Vec<DeviceId>,
    pub topology: HostTopology,
    pub solver: SolverParams,
    pub optimizer: OptimizerSpec,
    pub dataset: DatasetSpec,
    /// The batch size of one step across all devices.
    pub batch_size: NonZeroUsize,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl TrainingSpec {
    /// Reads a `TrainingSpec` from a json file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Returns the participating devices.
    pub fn devices(&self) -> Vec<DeviceId> {
        if self.devices.is_empty() {
            return (0..self.topology.devices).collect();
        }

        self.devices.clone()
    }
}
