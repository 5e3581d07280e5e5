use std::{error::Error, fmt, io};

use device::DeviceErr;
use p2p_sync::SyncErr;
use solver::SolverErr;

/// The trainer's result type.
pub type Result<T> = std::result::Result<T, TrainerErr>;

/// Everything that can go wrong while loading a spec and training it.
#[derive(Debug)]
pub enum TrainerErr {
    Io(io::Error),
    Parse(serde_json::Error),
    InvalidConfig(&'static str),
    Device(DeviceErr),
    Solver(SolverErr),
    Sync(SyncErr),
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerErr::Io(e) => write!(f, "io error: {e}"),
            TrainerErr::Parse(e) => write!(f, "invalid training spec: {e}"),
            TrainerErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            TrainerErr::Device(e) => write!(f, "device error: {e}"),
            TrainerErr::Solver(e) => write!(f, "solver error: {e}"),
            TrainerErr::Sync(e) => write!(f, "synchronization error: {e}"),
        }
    }
}

impl Error for TrainerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainerErr::Io(e) => Some(e),
            TrainerErr::Parse(e) => Some(e),
            TrainerErr::Device(e) => Some(e),
            TrainerErr::Solver(e) => Some(e),
            TrainerErr::Sync(e) => Some(e),
            TrainerErr::InvalidConfig(_) => None,
        }
    }
}

impl From<io::Error> for TrainerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TrainerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<DeviceErr> for TrainerErr {
    fn from(value: DeviceErr) -> Self {
        Self::Device(value)
    }
}

impl From<SolverErr> for TrainerErr {
    fn from(value: SolverErr) -> Self {
        Self::Solver(value)
    }
}

impl From<SyncErr> for TrainerErr {
    fn from(value: SyncErr) -> Self {
        Self::Sync(value)
    }
}

/// Boundary conversion for the binary.
impl From<TrainerErr> for io::Error {
    fn from(value: TrainerErr) -> Self {
        match value {
            TrainerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
