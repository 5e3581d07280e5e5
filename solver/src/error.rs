use std::{
    error::Error,
    fmt::{self, Display},
};

use device::DeviceErr;

/// The result type used in the entire solver crate.
pub type Result<T> = std::result::Result<T, SolverErr>;

/// The solver crate's error type.
#[derive(Debug)]
pub enum SolverErr {
    Device(DeviceErr),
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidInput(&'static str),
}

impl Display for SolverErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverErr::Device(e) => write!(f, "device error: {e}"),
            SolverErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}, got {got} and expected {expected}"),
            SolverErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl Error for SolverErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SolverErr::Device(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceErr> for SolverErr {
    fn from(value: DeviceErr) -> Self {
        Self::Device(value)
    }
}
