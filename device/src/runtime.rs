use serde::{Deserialize, Serialize};

use crate::{DeviceId, DevicePtr, DeviceSlice, Result};

/// Static properties of a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProps {
    pub id: DeviceId,
    pub name: String,
    /// The board this device shares with other devices, `None` if it sits alone on its board.
    pub board_group: Option<u32>,
}

/// The primitives the synchronization tree needs from an accelerator driver.
///
/// Every operation names the device it runs on explicitly, there is no notion of a
/// thread-local "current device". Asynchronous copies are enqueued on the default
/// stream of the issuing device and only guaranteed to be visible after
/// `synchronize` is called on that same device. Kernels and blocking copies are
/// ordered after everything previously enqueued on their device's stream.
pub trait Runtime: Send + Sync {
    /// Returns the amount of devices visible to this runtime.
    fn device_count(&self) -> usize;

    /// Returns the static properties of `device`.
    fn properties(&self, device: DeviceId) -> Result<DeviceProps>;

    /// Whether `device` can read and write `peer`'s memory directly.
    fn can_access_peer(&self, device: DeviceId, peer: DeviceId) -> Result<bool>;

    /// Enables direct access from `device` into `peer`'s memory.
    fn enable_peer_access(&self, device: DeviceId, peer: DeviceId) -> Result<()>;

    /// Disables a previously enabled direct access from `device` into `peer`'s memory.
    fn disable_peer_access(&self, device: DeviceId, peer: DeviceId) -> Result<()>;

    /// Allocates `len` uninitialized elements on `device`.
    fn malloc(&self, device: DeviceId, len: usize) -> Result<DevicePtr>;

    /// Gives back an allocation.
    fn free(&self, ptr: DevicePtr) -> Result<()>;

    /// Returns the device a pointer belongs to, failing if it isn't a live allocation.
    fn pointer_device(&self, ptr: DevicePtr) -> Result<DeviceId>;

    /// Blocking host to device copy.
    ///
    /// # Arguments
    /// * `dst` - The destination region, must be exactly `src.len()` elements.
    /// * `src` - The host values.
    fn upload(&self, dst: DeviceSlice, src: &[f32]) -> Result<()>;

    /// Blocking device to host copy.
    ///
    /// # Arguments
    /// * `src` - The source region, must be exactly `dst.len()` elements.
    /// * `dst` - The host buffer to write into.
    fn download(&self, src: DeviceSlice, dst: &mut [f32]) -> Result<()>;

    /// Enqueues a device to device copy on the default stream of `stream`.
    ///
    /// Both regions may live on any device, intra and inter device copies are allowed.
    fn memcpy_async(&self, stream: DeviceId, dst: DeviceSlice, src: DeviceSlice) -> Result<()>;

    /// Blocks until every operation enqueued on the default stream of `device` completes.
    fn synchronize(&self, device: DeviceId) -> Result<()>;

    /// Sets every element of `dst` to `value`.
    fn fill(&self, device: DeviceId, dst: DeviceSlice, value: f32) -> Result<()>;

    /// Element-wise `dst += src`.
    fn add(&self, device: DeviceId, src: DeviceSlice, dst: DeviceSlice) -> Result<()>;

    /// Element-wise `dst *= alpha`.
    fn scale(&self, device: DeviceId, alpha: f32, dst: DeviceSlice) -> Result<()>;
}
