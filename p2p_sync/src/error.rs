use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use device::{DeviceErr, DeviceId};
use solver::SolverErr;

/// The result type used in the entire p2p_sync crate.
pub type Result<T> = std::result::Result<T, SyncErr>;

/// Failures while turning a device set into a synchronization tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyErr {
    NoDevices,
    DuplicateDevice(DeviceId),
    CountMismatch { pairs: usize, devices: usize },
    SelfParent(DeviceId),
    MultipleParents(DeviceId),
    Unreachable(DeviceId),
    Device(DeviceErr),
}

impl Display for TopologyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => f.write_str("no devices to pair"),
            Self::DuplicateDevice(device) => write!(f, "device {device} is listed twice"),
            Self::CountMismatch { pairs, devices } => {
                write!(f, "pairing produced {pairs} pairs for {devices} devices")
            }
            Self::SelfParent(device) => write!(f, "device {device} is its own parent"),
            Self::MultipleParents(device) => write!(f, "device {device} has more than one parent"),
            Self::Unreachable(device) => {
                write!(f, "device {device} isn't connected to the root of the tree")
            }
            Self::Device(e) => write!(f, "device error while pairing: {e}"),
        }
    }
}

impl Error for TopologyErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceErr> for TopologyErr {
    fn from(value: DeviceErr) -> Self {
        Self::Device(value)
    }
}

/// Failures of a synchronized run.
#[derive(Debug)]
pub enum SyncErr {
    Topology(TopologyErr),
    Device(DeviceErr),
    Solver(SolverErr),
    /// The parameters of a net don't fit the mirror's buffers.
    Layout {
        got: usize,
        expected: usize,
    },
    /// A token arrived from a worker that isn't allowed to send one at this point.
    UnexpectedSender {
        device: DeviceId,
        sender: DeviceId,
    },
    /// A worker signaled twice before the first signal was consumed.
    DuplicateToken {
        device: DeviceId,
        sender: DeviceId,
    },
    /// A buffer lives on a device other than the one the protocol expects.
    WrongDevice {
        what: &'static str,
        got: DeviceId,
        expected: DeviceId,
    },
    IndivisibleBatch {
        total: usize,
        solvers: usize,
    },
    Spawn(io::Error),
    WorkerPanicked(DeviceId),
    /// The run was torn down because another worker failed.
    Aborted,
    /// The run ended while this worker was waiting on a peer.
    Stopped,
}

impl Display for SyncErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topology(e) => write!(f, "topology error: {e}"),
            Self::Device(e) => write!(f, "device error: {e}"),
            Self::Solver(e) => write!(f, "solver error: {e}"),
            Self::Layout { got, expected } => write!(
                f,
                "parameter layout mismatch, got {got} elements and the buffer holds {expected}"
            ),
            Self::UnexpectedSender { device, sender } => {
                write!(f, "device {device} got an unexpected token from device {sender}")
            }
            Self::DuplicateToken { device, sender } => write!(
                f,
                "device {sender} signaled device {device} again before it consumed the last signal"
            ),
            Self::WrongDevice {
                what,
                got,
                expected,
            } => write!(f, "{what} lives on device {got}, expected device {expected}"),
            Self::IndivisibleBatch { total, solvers } => write!(
                f,
                "batch size {total} must be divisible by the number of solvers ({solvers})"
            ),
            Self::Spawn(e) => write!(f, "failed to spawn worker thread: {e}"),
            Self::WorkerPanicked(device) => write!(f, "worker on device {device} panicked"),
            Self::Aborted => f.write_str("aborted by a failing peer"),
            Self::Stopped => f.write_str("the run stopped"),
        }
    }
}

impl Error for SyncErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Topology(e) => Some(e),
            Self::Device(e) => Some(e),
            Self::Solver(e) => Some(e),
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TopologyErr> for SyncErr {
    fn from(value: TopologyErr) -> Self {
        Self::Topology(value)
    }
}

impl From<DeviceErr> for SyncErr {
    fn from(value: DeviceErr) -> Self {
        Self::Device(value)
    }
}

impl From<SolverErr> for SyncErr {
    fn from(value: SolverErr) -> Self {
        match value {
            SolverErr::Device(e) => Self::Device(e),
            other => Self::Solver(other),
        }
    }
}
