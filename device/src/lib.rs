mod error;
mod host;
mod ptr;
mod runtime;

pub use error::{DeviceErr, Result};
pub use host::{HostRuntime, HostTopology};
pub use ptr::{DevicePtr, DeviceSlice};
pub use runtime::{DeviceProps, Runtime};

/// The identifier of a device, as enumerated by the runtime.
pub type DeviceId = usize;
