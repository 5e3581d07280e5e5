use std::{
    error::Error,
    fmt::{self, Display},
};

use crate::DeviceId;

/// The result type used by every device primitive.
pub type Result<T> = std::result::Result<T, DeviceErr>;

/// Failures reported by a device runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceErr {
    InvalidDevice {
        device: DeviceId,
        count: usize,
    },
    InvalidPointer {
        device: DeviceId,
        handle: u64,
    },
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    SizeMismatch {
        got: usize,
        expected: usize,
    },
    PeerAccessUnsupported {
        device: DeviceId,
        peer: DeviceId,
    },
    PeerAccessAlreadyEnabled {
        device: DeviceId,
        peer: DeviceId,
    },
    PeerAccessNotEnabled {
        device: DeviceId,
        peer: DeviceId,
    },
}

impl Display for DeviceErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDevice { device, count } => {
                write!(f, "invalid device {device}, there are {count} devices")
            }
            Self::InvalidPointer { device, handle } => {
                write!(f, "pointer {handle:#x} is not a live allocation on device {device}")
            }
            Self::OutOfBounds {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "region [{offset}, {}) is out of bounds for an allocation of {capacity} elements",
                offset + len
            ),
            Self::SizeMismatch { got, expected } => {
                write!(f, "transfer size mismatch, got {got} and expected {expected}")
            }
            Self::PeerAccessUnsupported { device, peer } => {
                write!(f, "device {device} can't access device {peer}")
            }
            Self::PeerAccessAlreadyEnabled { device, peer } => {
                write!(f, "peer access from device {device} to {peer} is already enabled")
            }
            Self::PeerAccessNotEnabled { device, peer } => {
                write!(f, "peer access from device {device} to {peer} is not enabled")
            }
        }
    }
}

impl Error for DeviceErr {}
