use std::collections::HashSet;

use device::{DeviceId, HostRuntime, HostTopology};
use p2p_sync::DevicePair;

fn topologies(devices: usize) -> Vec<HostTopology> {
    let ids = || 0..devices;

    vec![
        HostTopology::new(devices),
        HostTopology::new(devices).board(ids().filter(|d| d % 2 == 0)),
        ids()
            .step_by(2)
            .fold(HostTopology::new(devices), |t, d| t.board([d, (d + 1) % devices])),
        ids().fold(HostTopology::new(devices), |t, d| t.link(d, (d + 3) % devices)),
        HostTopology::new(devices)
            .board(ids().filter(|d| d % 3 == 1))
            .link(0, devices - 1),
    ]
}

fn assert_valid_tree(pairs: &[DevicePair], devices: &[DeviceId]) {
    assert_eq!(pairs.len(), devices.len());
    assert!(pairs[0].is_root());
    assert_eq!(pairs.iter().filter(|p| p.is_root()).count(), 1);

    let children: HashSet<_> = pairs.iter().map(DevicePair::device).collect();
    assert_eq!(children, devices.iter().copied().collect::<HashSet<_>>());

    for pair in pairs {
        assert_ne!(pair.parent(), Some(pair.device()));
        if let Some(parent) = pair.parent() {
            assert!(children.contains(&parent));
        }
    }

    assert!(DevicePair::depth(pairs) < devices.len());
}

#[test]
fn every_device_set_becomes_a_tree() {
    for n in 2..10 {
        let devices: Vec<_> = (0..n).collect();

        for topology in topologies(n) {
            // Overlapping boards aren't a valid machine.
            let Ok(rt) = HostRuntime::new(&topology) else {
                continue;
            };

            let pairs = DevicePair::compute(&devices, &rt).unwrap();
            assert_valid_tree(&pairs, &devices);
        }
    }
}

#[test]
fn pairing_is_idempotent() {
    let topology = HostTopology::new(6).board([1, 4]).link(0, 5).link(2, 3);
    let rt = HostRuntime::new(&topology).unwrap();
    let devices = [5, 1, 0, 4, 3, 2];

    let first = DevicePair::compute(&devices, &rt).unwrap();
    let second = DevicePair::compute(&devices, &rt).unwrap();

    assert_eq!(first, second);
    assert_valid_tree(&first, &devices);
}

#[test]
fn four_plain_devices_have_depth_two() {
    let rt = HostRuntime::new(&HostTopology::new(4)).unwrap();
    let pairs = DevicePair::compute(&[0, 1, 2, 3], &rt).unwrap();

    assert!(DevicePair::depth(&pairs) <= 2);
    assert_eq!(
        pairs.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ["-1:0", "0:1", "2:3", "0:2"]
    );
}

#[test]
fn subset_of_devices() {
    let topology = HostTopology::new(8).board([6, 7]);
    let rt = HostRuntime::new(&topology).unwrap();
    let devices = [7, 2, 6];

    let pairs = DevicePair::compute(&devices, &rt).unwrap();

    assert_valid_tree(&pairs, &devices);
    assert_eq!(pairs[0], DevicePair::root(7));
    assert!(pairs.contains(&DevicePair::new(Some(7), 6)));
}
