use std::{
    collections::{HashMap, HashSet},
    mem,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{DeviceErr, DeviceId, DeviceProps, DevicePtr, DeviceSlice, Result, Runtime};

/// The shape of a simulated multi-device machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostTopology {
    /// The amount of devices, they get ids `0..devices`.
    pub devices: usize,
    /// Groups of devices sharing a physical board, devices on the same board can access each other.
    #[serde(default)]
    pub boards: Vec<Vec<DeviceId>>,
    /// Pairs of devices with a direct high bandwidth link between them.
    #[serde(default)]
    pub links: Vec<(DeviceId, DeviceId)>,
}

impl HostTopology {
    /// Creates a new `HostTopology` with `devices` isolated devices.
    pub fn new(devices: usize) -> Self {
        Self {
            devices,
            ..Default::default()
        }
    }

    /// Places `devices` on a shared board.
    pub fn board<I: IntoIterator<Item = DeviceId>>(mut self, devices: I) -> Self {
        self.boards.push(devices.into_iter().collect());
        self
    }

    /// Adds a bidirectional direct link between `a` and `b`.
    pub fn link(mut self, a: DeviceId, b: DeviceId) -> Self {
        self.links.push((a, b));
        self
    }
}

type Allocation = Arc<Mutex<Box<[f32]>>>;

#[derive(Debug, Clone, Copy)]
struct PendingCopy {
    dst: DeviceSlice,
    src: DeviceSlice,
}

#[derive(Debug)]
struct HostDevice {
    props: DeviceProps,
    reachable: HashSet<DeviceId>,
    peers: Mutex<HashSet<DeviceId>>,
    memory: RwLock<HashMap<u64, Allocation>>,
    stream: Mutex<Vec<PendingCopy>>,
    allocated: AtomicUsize,
}

/// A `Runtime` that simulates every device in host memory.
///
/// Each device owns a set of allocations and a default stream. Asynchronous copies sit
/// in the issuing device's stream until that device is synchronized, which is enough
/// to surface ordering bugs that real hardware would hide most of the time.
#[derive(Debug)]
pub struct HostRuntime {
    devices: Box<[HostDevice]>,
    next_handle: AtomicU64,
}

impl HostRuntime {
    /// Creates a new `HostRuntime`.
    ///
    /// # Arguments
    /// * `topology` - The simulated machine layout.
    ///
    /// # Returns
    /// A new `HostRuntime` or an `InvalidDevice` error if a board or link names an
    /// unknown device or a device sits on two boards.
    pub fn new(topology: &HostTopology) -> Result<Self> {
        let count = topology.devices;
        let check = |device: DeviceId| {
            if device >= count {
                return Err(DeviceErr::InvalidDevice { device, count });
            }
            Ok(())
        };

        let mut board_of = vec![None; count];
        let mut reachable = vec![HashSet::new(); count];

        for (group, board) in topology.boards.iter().enumerate() {
            for &device in board {
                check(device)?;

                if board_of[device].is_some() {
                    return Err(DeviceErr::InvalidDevice { device, count });
                }

                if board.len() > 1 {
                    board_of[device] = Some(group as u32);
                }

                reachable[device].extend(board.iter().copied().filter(|&d| d != device));
            }
        }

        for &(a, b) in &topology.links {
            check(a)?;
            check(b)?;

            if a != b {
                reachable[a].insert(b);
                reachable[b].insert(a);
            }
        }

        let devices = board_of
            .into_iter()
            .zip(reachable)
            .enumerate()
            .map(|(id, (board_group, reachable))| HostDevice {
                props: DeviceProps {
                    id,
                    name: format!("host-sim-{id}"),
                    board_group,
                },
                reachable,
                peers: Mutex::new(HashSet::new()),
                memory: RwLock::new(HashMap::new()),
                stream: Mutex::new(Vec::new()),
                allocated: AtomicUsize::new(0),
            })
            .collect();

        debug!(devices = count; "created host runtime");

        Ok(Self {
            devices,
            next_handle: AtomicU64::new(1),
        })
    }

    /// Returns the amount of bytes currently allocated on `device`.
    pub fn allocated(&self, device: DeviceId) -> Result<usize> {
        Ok(self.device(device)?.allocated.load(Ordering::Acquire))
    }

    /// Returns the amount of copies enqueued on `device`'s stream that haven't executed yet.
    pub fn pending(&self, device: DeviceId) -> Result<usize> {
        Ok(self.device(device)?.stream.lock().len())
    }

    fn device(&self, device: DeviceId) -> Result<&HostDevice> {
        self.devices.get(device).ok_or(DeviceErr::InvalidDevice {
            device,
            count: self.devices.len(),
        })
    }

    fn allocation(&self, ptr: DevicePtr) -> Result<Allocation> {
        self.device(ptr.device())?
            .memory
            .read()
            .get(&ptr.handle())
            .cloned()
            .ok_or(DeviceErr::InvalidPointer {
                device: ptr.device(),
                handle: ptr.handle(),
            })
    }

    fn read(&self, src: DeviceSlice) -> Result<Vec<f32>> {
        let alloc = self.allocation(src.ptr())?;
        let data = alloc.lock();
        let capacity = data.len();

        data.get(src.range())
            .map(<[f32]>::to_vec)
            .ok_or(DeviceErr::OutOfBounds {
                offset: src.offset(),
                len: src.len(),
                capacity,
            })
    }

    fn write_with<F>(&self, dst: DeviceSlice, f: F) -> Result<()>
    where
        F: FnOnce(&mut [f32]),
    {
        let alloc = self.allocation(dst.ptr())?;
        let mut data = alloc.lock();
        let capacity = data.len();

        let region = data.get_mut(dst.range()).ok_or(DeviceErr::OutOfBounds {
            offset: dst.offset(),
            len: dst.len(),
            capacity,
        })?;

        f(region);
        Ok(())
    }

    /// Executes every pending copy of `device`'s stream in issue order.
    fn drain(&self, device: DeviceId) -> Result<()> {
        let pending = mem::take(&mut *self.device(device)?.stream.lock());

        for PendingCopy { dst, src } in pending {
            let values = self.read(src)?;
            self.write_with(dst, |region| region.copy_from_slice(&values))?;
        }

        Ok(())
    }

    fn check_len(got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(DeviceErr::SizeMismatch { got, expected });
        }

        Ok(())
    }
}

impl Runtime for HostRuntime {
    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn properties(&self, device: DeviceId) -> Result<DeviceProps> {
        Ok(self.device(device)?.props.clone())
    }

    fn can_access_peer(&self, device: DeviceId, peer: DeviceId) -> Result<bool> {
        self.device(peer)?;
        Ok(self.device(device)?.reachable.contains(&peer))
    }

    fn enable_peer_access(&self, device: DeviceId, peer: DeviceId) -> Result<()> {
        if !self.can_access_peer(device, peer)? {
            return Err(DeviceErr::PeerAccessUnsupported { device, peer });
        }

        if !self.device(device)?.peers.lock().insert(peer) {
            return Err(DeviceErr::PeerAccessAlreadyEnabled { device, peer });
        }

        Ok(())
    }

    fn disable_peer_access(&self, device: DeviceId, peer: DeviceId) -> Result<()> {
        if !self.device(device)?.peers.lock().remove(&peer) {
            return Err(DeviceErr::PeerAccessNotEnabled { device, peer });
        }

        Ok(())
    }

    fn malloc(&self, device: DeviceId, len: usize) -> Result<DevicePtr> {
        let host_device = self.device(device)?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let alloc = Arc::new(Mutex::new(vec![0.; len].into_boxed_slice()));

        host_device.memory.write().insert(handle, alloc);
        host_device
            .allocated
            .fetch_add(len * size_of::<f32>(), Ordering::AcqRel);

        trace!(device = device, handle = handle, len = len; "malloc");
        Ok(DevicePtr::new(device, handle, len))
    }

    fn free(&self, ptr: DevicePtr) -> Result<()> {
        let host_device = self.device(ptr.device())?;

        let alloc = host_device
            .memory
            .write()
            .remove(&ptr.handle())
            .ok_or(DeviceErr::InvalidPointer {
                device: ptr.device(),
                handle: ptr.handle(),
            })?;

        let len = alloc.lock().len();
        host_device
            .allocated
            .fetch_sub(len * size_of::<f32>(), Ordering::AcqRel);

        trace!(device = ptr.device(), handle = ptr.handle(); "free");
        Ok(())
    }

    fn pointer_device(&self, ptr: DevicePtr) -> Result<DeviceId> {
        self.allocation(ptr)?;
        Ok(ptr.device())
    }

    fn upload(&self, dst: DeviceSlice, src: &[f32]) -> Result<()> {
        Self::check_len(src.len(), dst.len())?;
        self.drain(dst.device())?;
        self.write_with(dst, |region| region.copy_from_slice(src))
    }

    fn download(&self, src: DeviceSlice, dst: &mut [f32]) -> Result<()> {
        Self::check_len(dst.len(), src.len())?;
        self.drain(src.device())?;
        let values = self.read(src)?;
        dst.copy_from_slice(&values);
        Ok(())
    }

    fn memcpy_async(&self, stream: DeviceId, dst: DeviceSlice, src: DeviceSlice) -> Result<()> {
        Self::check_len(src.len(), dst.len())?;
        self.allocation(dst.ptr())?;
        self.allocation(src.ptr())?;

        self.device(stream)?.stream.lock().push(PendingCopy { dst, src });
        Ok(())
    }

    fn synchronize(&self, device: DeviceId) -> Result<()> {
        self.drain(device)
    }

    fn fill(&self, device: DeviceId, dst: DeviceSlice, value: f32) -> Result<()> {
        self.drain(device)?;
        self.write_with(dst, |region| region.fill(value))
    }

    fn add(&self, device: DeviceId, src: DeviceSlice, dst: DeviceSlice) -> Result<()> {
        Self::check_len(src.len(), dst.len())?;
        self.drain(device)?;

        let values = self.read(src)?;
        self.write_with(dst, |region| {
            region
                .par_iter_mut()
                .zip(values.par_iter())
                .for_each(|(acc, v)| *acc += v);
        })
    }

    fn scale(&self, device: DeviceId, alpha: f32, dst: DeviceSlice) -> Result<()> {
        self.drain(device)?;
        self.write_with(dst, |region| {
            region.par_iter_mut().for_each(|v| *v *= alpha);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(devices: usize) -> HostRuntime {
        HostRuntime::new(&HostTopology::new(devices)).unwrap()
    }

    #[test]
    fn boards_and_links_define_reachability() {
        let topology = HostTopology::new(4).board([0, 1]).link(2, 3);
        let rt = HostRuntime::new(&topology).unwrap();

        assert_eq!(rt.properties(0).unwrap().board_group, Some(0));
        assert_eq!(rt.properties(2).unwrap().board_group, None);
        assert!(rt.can_access_peer(0, 1).unwrap());
        assert!(rt.can_access_peer(3, 2).unwrap());
        assert!(!rt.can_access_peer(1, 2).unwrap());
        assert!(!rt.can_access_peer(0, 0).unwrap());
    }

    #[test]
    fn rejects_unknown_devices() {
        let topology = HostTopology::new(2).link(0, 5);
        assert!(HostRuntime::new(&topology).is_err());

        let topology = HostTopology::new(3).board([0, 1]).board([1, 2]);
        assert!(HostRuntime::new(&topology).is_err());
    }

    #[test]
    fn async_copy_lands_on_synchronize() {
        let rt = runtime(2);
        let src = rt.malloc(0, 3).unwrap();
        let dst = rt.malloc(1, 3).unwrap();
        rt.upload(src.whole(), &[1., 2., 3.]).unwrap();

        rt.memcpy_async(0, dst.whole(), src.whole()).unwrap();
        assert_eq!(rt.pending(0).unwrap(), 1);

        let mut out = [0.; 3];
        rt.download(dst.whole(), &mut out).unwrap();
        assert_eq!(out, [0.; 3]);

        rt.synchronize(0).unwrap();
        rt.download(dst.whole(), &mut out).unwrap();
        assert_eq!(out, [1., 2., 3.]);
    }

    #[test]
    fn kernels_respect_stream_order() {
        let rt = runtime(1);
        let a = rt.malloc(0, 2).unwrap();
        let b = rt.malloc(0, 2).unwrap();
        rt.upload(a.whole(), &[1., 2.]).unwrap();

        rt.memcpy_async(0, b.whole(), a.whole()).unwrap();
        rt.add(0, a.whole(), b.whole()).unwrap();
        rt.scale(0, 0.5, b.whole()).unwrap();

        let mut out = [0.; 2];
        rt.download(b.whole(), &mut out).unwrap();
        assert_eq!(out, [1., 2.]);
    }

    #[test]
    fn allocation_accounting() {
        let rt = runtime(1);
        let ptr = rt.malloc(0, 8).unwrap();
        assert_eq!(rt.allocated(0).unwrap(), 8 * size_of::<f32>());

        rt.free(ptr).unwrap();
        assert_eq!(rt.allocated(0).unwrap(), 0);
        assert!(rt.free(ptr).is_err());
        assert!(rt.pointer_device(ptr).is_err());
    }

    #[test]
    fn peer_access_lifecycle() {
        let rt = HostRuntime::new(&HostTopology::new(3).link(0, 1)).unwrap();

        rt.enable_peer_access(1, 0).unwrap();
        assert_eq!(
            rt.enable_peer_access(1, 0),
            Err(DeviceErr::PeerAccessAlreadyEnabled { device: 1, peer: 0 })
        );
        assert_eq!(
            rt.enable_peer_access(2, 0),
            Err(DeviceErr::PeerAccessUnsupported { device: 2, peer: 0 })
        );

        rt.disable_peer_access(1, 0).unwrap();
        assert!(rt.disable_peer_access(1, 0).is_err());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let rt = runtime(1);
        let ptr = rt.malloc(0, 4).unwrap();

        assert_eq!(
            rt.upload(ptr.whole(), &[1.; 3]),
            Err(DeviceErr::SizeMismatch {
                got: 3,
                expected: 4
            })
        );
    }
}
