use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use device::{DeviceId, Runtime};
use log::{debug, info};

use crate::TopologyErr;

/// An edge of the synchronization tree, `parent` is `None` for the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePair {
    parent: Option<DeviceId>,
    device: DeviceId,
}

impl DevicePair {
    pub fn new(parent: Option<DeviceId>, device: DeviceId) -> Self {
        Self { parent, device }
    }

    pub fn root(device: DeviceId) -> Self {
        Self::new(None, device)
    }

    pub fn parent(&self) -> Option<DeviceId> {
        self.parent
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Pairs up `devices` into a tree, preferring the fastest links available.
    ///
    /// Devices sharing a board are paired first, then devices with direct peer access and
    /// finally whatever is left, in input order. Every sweep goes left to right, pairing
    /// each device with the first compatible one after it and dropping only the latter, so
    /// the parent keeps taking part in the following sweeps. The last remaining device
    /// becomes the root.
    ///
    /// # Arguments
    /// * `devices` - The participating devices.
    /// * `topology` - Answers board membership and peer reachability questions.
    ///
    /// # Returns
    /// The pairs with the root first, or a `TopologyErr` if the input is empty, repeats a
    /// device or the result isn't a valid tree.
    pub fn compute(
        devices: &[DeviceId],
        topology: &dyn Runtime,
    ) -> Result<Vec<DevicePair>, TopologyErr> {
        if devices.is_empty() {
            return Err(TopologyErr::NoDevices);
        }

        let mut seen = HashSet::with_capacity(devices.len());
        for &device in devices {
            if !seen.insert(device) {
                return Err(TopologyErr::DuplicateDevice(device));
            }
        }

        let boards = devices
            .iter()
            .map(|&device| -> Result<_, TopologyErr> {
                Ok((device, topology.properties(device)?.board_group))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut remaining = devices.to_vec();
        let mut pairs = Vec::with_capacity(devices.len());

        sweep(&mut remaining, &mut pairs, |a, b| {
            Ok(matches!((boards[&a], boards[&b]), (Some(x), Some(y)) if x == y))
        })?;
        debug!("devices paired by boards, remaining: {}", join(&remaining));

        sweep(&mut remaining, &mut pairs, |a, b| {
            Ok(topology.can_access_peer(a, b)?)
        })?;
        debug!("devices paired by peer access, remaining: {}", join(&remaining));

        while remaining.len() > 1 {
            sweep(&mut remaining, &mut pairs, |_, _| Ok(true))?;
        }

        let [root] = remaining[..] else {
            return Err(TopologyErr::CountMismatch {
                pairs: pairs.len(),
                devices: devices.len(),
            });
        };
        pairs.insert(0, DevicePair::root(root));

        check(&pairs, devices.len())?;

        let edges = pairs[1..]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!(root = root; "device pairs {edges}");

        Ok(pairs)
    }

    /// Returns the depth of the tree described by `pairs`, the root being at depth 0.
    pub fn depth(pairs: &[DevicePair]) -> usize {
        let parents: HashMap<_, _> = pairs.iter().map(|p| (p.device, p.parent)).collect();

        pairs
            .iter()
            .map(|pair| {
                let mut depth = 0;
                let mut parent = pair.parent;

                while let Some(p) = parent {
                    depth += 1;
                    if depth > pairs.len() {
                        break;
                    }
                    parent = parents.get(&p).copied().flatten();
                }

                depth
            })
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for DevicePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) => write!(f, "{parent}:{}", self.device),
            None => write!(f, "-1:{}", self.device),
        }
    }
}

fn sweep<F>(
    remaining: &mut Vec<DeviceId>,
    pairs: &mut Vec<DevicePair>,
    mut compatible: F,
) -> Result<(), TopologyErr>
where
    F: FnMut(DeviceId, DeviceId) -> Result<bool, TopologyErr>,
{
    let mut i = 0;

    while i < remaining.len() {
        for j in i + 1..remaining.len() {
            if compatible(remaining[i], remaining[j])? {
                pairs.push(DevicePair::new(Some(remaining[i]), remaining[j]));
                remaining.remove(j);
                break;
            }
        }

        i += 1;
    }

    Ok(())
}

fn check(pairs: &[DevicePair], devices: usize) -> Result<(), TopologyErr> {
    if pairs.len() != devices {
        return Err(TopologyErr::CountMismatch {
            pairs: pairs.len(),
            devices,
        });
    }

    let mut children = HashSet::with_capacity(pairs.len());

    for pair in pairs {
        if pair.parent == Some(pair.device) {
            return Err(TopologyErr::SelfParent(pair.device));
        }

        if !children.insert(pair.device) {
            return Err(TopologyErr::MultipleParents(pair.device));
        }
    }

    Ok(())
}

fn join(devices: &[DeviceId]) -> String {
    devices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use device::{HostRuntime, HostTopology};

    use super::*;

    fn pairs(topology: HostTopology, devices: &[DeviceId]) -> Vec<DevicePair> {
        let rt = HostRuntime::new(&topology).unwrap();
        DevicePair::compute(devices, &rt).unwrap()
    }

    fn pair(parent: DeviceId, device: DeviceId) -> DevicePair {
        DevicePair::new(Some(parent), device)
    }

    #[test]
    fn single_device_is_the_root() {
        assert_eq!(pairs(HostTopology::new(1), &[0]), [DevicePair::root(0)]);
    }

    #[test]
    fn boards_are_paired_first() {
        let topology = HostTopology::new(4).board([1, 3]).board([0, 2]);
        let got = pairs(topology, &[0, 1, 2, 3]);

        assert_eq!(got, [DevicePair::root(0), pair(0, 2), pair(1, 3), pair(0, 1)]);
    }

    #[test]
    fn links_are_preferred_over_fallback() {
        let topology = HostTopology::new(3).link(1, 2);
        let got = pairs(topology, &[0, 1, 2]);

        assert_eq!(got, [DevicePair::root(0), pair(1, 2), pair(0, 1)]);
    }

    #[test]
    fn fallback_repeats_until_one_device_remains() {
        let got = pairs(HostTopology::new(4), &[0, 1, 2, 3]);

        assert_eq!(got, [DevicePair::root(0), pair(0, 1), pair(2, 3), pair(0, 2)]);
        assert_eq!(DevicePair::depth(&got), 2);
    }

    #[test]
    fn input_order_picks_the_root() {
        let got = pairs(HostTopology::new(3), &[2, 0, 1]);

        assert_eq!(got[0], DevicePair::root(2));
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn rejects_bad_input() {
        let rt = HostRuntime::new(&HostTopology::new(2)).unwrap();

        assert_eq!(DevicePair::compute(&[], &rt), Err(TopologyErr::NoDevices));
        assert_eq!(
            DevicePair::compute(&[0, 1, 0], &rt),
            Err(TopologyErr::DuplicateDevice(0))
        );
        assert!(matches!(
            DevicePair::compute(&[0, 5], &rt),
            Err(TopologyErr::Device(_))
        ));
    }

    #[test]
    fn postconditions() {
        assert!(check(&[DevicePair::root(0), pair(1, 1)], 2).is_err());
        assert_eq!(
            check(&[DevicePair::root(0), pair(0, 0)], 2),
            Err(TopologyErr::SelfParent(0))
        );
        assert_eq!(
            check(&[DevicePair::root(0), pair(0, 1), pair(0, 1)], 3),
            Err(TopologyErr::MultipleParents(1))
        );
        assert!(check(&[DevicePair::root(0)], 2).is_err());
    }

    #[test]
    fn display_uses_minus_one_for_the_root() {
        assert_eq!(DevicePair::root(3).to_string(), "-1:3");
        assert_eq!(pair(0, 3).to_string(), "0:3");
    }
}
