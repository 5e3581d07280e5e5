use std::sync::Arc;

use device::{DeviceId, DevicePtr, Runtime};
use log::{error, trace};
use solver::{Net, Storage};

use crate::{Result, SyncErr};

/// A flat, device resident copy of every learnable parameter of a net and its gradient.
///
/// Once a solver's net is configured onto a `DeviceParams`, every blob's values and
/// gradient alias a region of the two buffers, so the tree can move the whole model with a
/// single copy.
pub struct DeviceParams {
    runtime: Arc<dyn Runtime>,
    device: DeviceId,
    size: usize,
    data: DevicePtr,
    diff: DevicePtr,
}

impl DeviceParams {
    /// Creates a new `DeviceParams` holding the current values of `net`.
    ///
    /// # Arguments
    /// * `runtime` - The runtime to allocate with.
    /// * `net` - The net whose values seed the buffers.
    /// * `device` - The device to allocate on.
    ///
    /// # Returns
    /// A new `DeviceParams` with a zeroed gradient, or a device error.
    pub fn new(runtime: Arc<dyn Runtime>, net: &Net, device: DeviceId) -> Result<Self> {
        let params = Self::with_size(runtime, device, net.total_size())?;
        params.copy_from(net)?;
        Ok(params)
    }

    /// Creates a new `DeviceParams` with room for `size` parameters.
    ///
    /// The value buffer is left as the runtime hands it out, the gradient buffer is zeroed.
    pub fn with_size(runtime: Arc<dyn Runtime>, device: DeviceId, size: usize) -> Result<Self> {
        let data = runtime.malloc(device, size)?;

        let diff = match runtime.malloc(device, size) {
            Ok(diff) => diff,
            Err(e) => {
                if let Err(e) = runtime.free(data) {
                    error!(device = device; "failed to free parameter buffer: {e}");
                }
                return Err(e.into());
            }
        };

        let params = Self {
            runtime,
            device,
            size,
            data,
            diff,
        };

        params.runtime.fill(device, diff.whole(), 0.)?;
        trace!(device = device, size = size; "allocated parameter buffers");

        Ok(params)
    }

    /// Overwrites the value buffer with the current values of `net`.
    ///
    /// # Returns
    /// A `Layout` error if `net` doesn't hold exactly `size` parameters.
    pub fn copy_from(&self, net: &Net) -> Result<()> {
        self.check_layout(net)?;

        let mut values = vec![0.; self.size];
        net.gather_data(&*self.runtime, &mut values)?;
        self.runtime.upload(self.data.whole(), &values)?;

        Ok(())
    }

    /// Points every blob of `net` at its region of the two buffers.
    ///
    /// # Returns
    /// A `Layout` error if `net` doesn't hold exactly `size` parameters, in which case
    /// `net` is left untouched.
    pub fn configure(&self, net: &mut Net) -> Result<()> {
        self.check_layout(net)?;

        let mut offset = 0;
        for blob in net.params_mut() {
            let count = blob.count();
            blob.set_data(Storage::Device(self.data.slice(offset, count)?))?;
            blob.set_diff(Storage::Device(self.diff.slice(offset, count)?))?;
            offset += count;
        }

        Ok(())
    }

    /// Moves `net` back onto host memory holding the buffers' current contents.
    ///
    /// Must be called before dropping `self` if `net` outlives it.
    pub fn restore_host(&self, net: &mut Net) -> Result<()> {
        self.check_layout(net)?;

        let mut data = vec![0.; self.size];
        let mut diff = vec![0.; self.size];
        self.runtime.download(self.data.whole(), &mut data)?;
        self.runtime.download(self.diff.whole(), &mut diff)?;

        let mut offset = 0;
        for blob in net.params_mut() {
            let end = offset + blob.count();
            blob.set_data(Storage::Host(data[offset..end].into()))?;
            blob.set_diff(Storage::Host(diff[offset..end].into()))?;
            offset = end;
        }

        Ok(())
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Returns the amount of parameters each buffer holds.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> DevicePtr {
        self.data
    }

    pub fn diff(&self) -> DevicePtr {
        self.diff
    }

    fn check_layout(&self, net: &Net) -> Result<()> {
        let got = net.total_size();

        if got != self.size {
            return Err(SyncErr::Layout {
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

impl Drop for DeviceParams {
    fn drop(&mut self) {
        for ptr in [self.data, self.diff] {
            if let Err(e) = self.runtime.free(ptr) {
                error!(device = self.device; "failed to free parameter buffer {ptr}: {e}");
            }
        }
    }
}
