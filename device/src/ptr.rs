use std::fmt;

use crate::{DeviceErr, DeviceId, Result};

/// A handle to a contiguous `f32` allocation living on a device.
///
/// The handle carries no ownership, it's up to whoever called `Runtime::malloc`
/// to eventually give it back with `Runtime::free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr {
    device: DeviceId,
    handle: u64,
    len: usize,
}

impl DevicePtr {
    /// Creates a new `DevicePtr`, only runtimes should mint these.
    ///
    /// # Arguments
    /// * `device` - The device the allocation lives on.
    /// * `handle` - The runtime specific identifier of the allocation.
    /// * `len` - The amount of elements in the allocation.
    ///
    /// # Returns
    /// A new `DevicePtr` instance.
    pub fn new(device: DeviceId, handle: u64, len: usize) -> Self {
        Self {
            device,
            handle,
            len,
        }
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a view over the entire allocation.
    pub fn whole(&self) -> DeviceSlice {
        DeviceSlice {
            ptr: *self,
            offset: 0,
            len: self.len,
        }
    }

    /// Returns a view over `len` elements of the allocation starting at `offset`.
    ///
    /// # Arguments
    /// * `offset` - The first element of the view.
    /// * `len` - The amount of elements in the view.
    ///
    /// # Returns
    /// The view or an `OutOfBounds` error if the region exceeds the allocation.
    pub fn slice(&self, offset: usize, len: usize) -> Result<DeviceSlice> {
        if offset.checked_add(len).is_none_or(|end| end > self.len) {
            return Err(DeviceErr::OutOfBounds {
                offset,
                len,
                capacity: self.len,
            });
        }

        Ok(DeviceSlice {
            ptr: *self,
            offset,
            len,
        })
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#x}[{}]", self.device, self.handle, self.len)
    }
}

/// A region inside a device allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceSlice {
    ptr: DevicePtr,
    offset: usize,
    len: usize,
}

impl DeviceSlice {
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn device(&self) -> DeviceId {
        self.ptr.device
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The element range this slice covers inside its allocation.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_within_bounds() {
        let ptr = DevicePtr::new(1, 7, 10);
        let slice = ptr.slice(4, 6).unwrap();

        assert_eq!(slice.device(), 1);
        assert_eq!(slice.range(), 4..10);
        assert_eq!(ptr.whole().range(), 0..10);
    }

    #[test]
    fn slice_out_of_bounds() {
        let ptr = DevicePtr::new(0, 1, 10);
        let err = ptr.slice(8, 3).unwrap_err();

        assert_eq!(
            err,
            DeviceErr::OutOfBounds {
                offset: 8,
                len: 3,
                capacity: 10
            }
        );
    }

    #[test]
    fn slice_end_past_usize_max() {
        let ptr = DevicePtr::new(0, 1, 10);

        assert!(matches!(
            ptr.slice(usize::MAX, 2),
            Err(DeviceErr::OutOfBounds { capacity: 10, .. })
        ));
    }
}
