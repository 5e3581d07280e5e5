use device::{DeviceSlice, Runtime};

use crate::{Result, SolverErr};

/// Where the values of a tensor live.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    /// Owned host memory.
    Host(Box<[f32]>),
    /// A region of a device allocation owned by someone else.
    Device(DeviceSlice),
}

impl Storage {
    /// Returns the amount of elements held.
    pub fn len(&self) -> usize {
        match self {
            Storage::Host(values) => values.len(),
            Storage::Device(slice) => slice.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the stored values into `out`.
    ///
    /// # Arguments
    /// * `runtime` - The runtime owning device memory.
    /// * `out` - Where to copy the values, must be exactly `self.len()` long.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `out` has the wrong length or a device error.
    pub fn read(&self, runtime: &dyn Runtime, out: &mut [f32]) -> Result<()> {
        Self::check_len(out.len(), self.len())?;

        match self {
            Storage::Host(values) => out.copy_from_slice(values),
            Storage::Device(slice) => runtime.download(*slice, out)?,
        }

        Ok(())
    }

    /// Overwrites the stored values with `src`.
    ///
    /// # Arguments
    /// * `runtime` - The runtime owning device memory.
    /// * `src` - The new values, must be exactly `self.len()` long.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `src` has the wrong length or a device error.
    pub fn write(&mut self, runtime: &dyn Runtime, src: &[f32]) -> Result<()> {
        Self::check_len(src.len(), self.len())?;

        match self {
            Storage::Host(values) => values.copy_from_slice(src),
            Storage::Device(slice) => runtime.upload(*slice, src)?,
        }

        Ok(())
    }

    /// Sets every stored value to `value`.
    pub fn fill(&mut self, runtime: &dyn Runtime, value: f32) -> Result<()> {
        match self {
            Storage::Host(values) => values.fill(value),
            Storage::Device(slice) => runtime.fill(slice.device(), *slice, value)?,
        }

        Ok(())
    }

    fn check_len(got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(SolverErr::SizeMismatch {
                what: "storage",
                got,
                expected,
            });
        }

        Ok(())
    }
}

/// A learnable parameter tensor, its values and the gradient of the loss with respect to them.
///
/// Both storages can be swapped independently, which is how a device mirror takes over the
/// memory of a solver's parameters.
#[derive(Debug, Clone)]
pub struct Blob {
    name: String,
    count: usize,
    data: Storage,
    diff: Storage,
}

impl Blob {
    /// Creates a new host resident `Blob` with a zeroed gradient.
    ///
    /// # Arguments
    /// * `name` - A human readable name, only used for logging.
    /// * `values` - The initial values.
    ///
    /// # Returns
    /// A new `Blob` instance.
    pub fn new(name: impl Into<String>, values: Vec<f32>) -> Self {
        let count = values.len();

        Self {
            name: name.into(),
            count,
            data: Storage::Host(values.into_boxed_slice()),
            diff: Storage::Host(vec![0.; count].into_boxed_slice()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the amount of elements of the tensor.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn data(&self) -> &Storage {
        &self.data
    }

    pub fn diff(&self) -> &Storage {
        &self.diff
    }

    pub fn data_mut(&mut self) -> &mut Storage {
        &mut self.data
    }

    pub fn diff_mut(&mut self) -> &mut Storage {
        &mut self.diff
    }

    /// Replaces the storage backing the values.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `storage` isn't exactly `count` elements, in which case
    /// the old storage is kept.
    pub fn set_data(&mut self, storage: Storage) -> Result<()> {
        self.data = self.checked(storage)?;
        Ok(())
    }

    /// Replaces the storage backing the gradient.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `storage` isn't exactly `count` elements, in which case
    /// the old storage is kept.
    pub fn set_diff(&mut self, storage: Storage) -> Result<()> {
        self.diff = self.checked(storage)?;
        Ok(())
    }

    fn checked(&self, storage: Storage) -> Result<Storage> {
        if storage.len() != self.count {
            return Err(SolverErr::SizeMismatch {
                what: "blob storage",
                got: storage.len(),
                expected: self.count,
            });
        }

        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use device::{HostRuntime, HostTopology};

    use super::*;

    #[test]
    fn host_storage_round_trip() {
        let rt = HostRuntime::new(&HostTopology::new(1)).unwrap();
        let mut blob = Blob::new("w", vec![1., 2., 3.]);

        blob.data_mut().write(&rt, &[4., 5., 6.]).unwrap();

        let mut out = [0.; 3];
        blob.data().read(&rt, &mut out).unwrap();
        assert_eq!(out, [4., 5., 6.]);

        blob.diff().read(&rt, &mut out).unwrap();
        assert_eq!(out, [0.; 3]);
    }

    #[test]
    fn swapping_storage_to_device() {
        let rt = HostRuntime::new(&HostTopology::new(1)).unwrap();
        let ptr = rt.malloc(0, 5).unwrap();
        let mut blob = Blob::new("w", vec![0.; 2]);

        blob.set_data(Storage::Device(ptr.slice(3, 2).unwrap())).unwrap();
        blob.data_mut().write(&rt, &[7., 8.]).unwrap();

        let mut out = [0.; 5];
        rt.download(ptr.whole(), &mut out).unwrap();
        assert_eq!(out, [0., 0., 0., 7., 8.]);
    }

    #[test]
    fn rejects_wrong_sized_storage() {
        let mut blob = Blob::new("w", vec![0.; 2]);
        let err = blob.set_diff(Storage::Host(vec![0.; 3].into_boxed_slice()));

        assert!(matches!(
            err,
            Err(SolverErr::SizeMismatch {
                got: 3,
                expected: 2,
                ..
            })
        ));
        assert_eq!(blob.diff().len(), 2);
    }
}
