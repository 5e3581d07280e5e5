use std::path::PathBuf;

use p2p_sync::SyncErr;
use trainer::{TrainerErr, TrainingSpec};

fn spec() -> TrainingSpec {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs/four_devices.json");
    TrainingSpec::from_path(path).unwrap()
}

#[test]
fn sample_spec_trains_to_the_generating_model() {
    let spec = spec();
    let report = trainer::train(&spec).unwrap();

    assert_eq!(report.iters, spec.solver.max_iter);

    let mut want = spec.dataset.weights.clone();
    want.push(spec.dataset.bias);
    for (got, want) in report.params.iter().zip(want) {
        assert!((got - want).abs() < 5e-2, "got {:?}", report.params);
    }
    assert!(report.loss.is_some_and(|loss| loss < 1e-2));
}

#[test]
fn batch_must_split_evenly() {
    let mut spec = spec();
    spec.devices = vec![0, 1, 2];

    let res = trainer::train(&spec);

    assert!(matches!(
        res,
        Err(TrainerErr::Sync(SyncErr::IndivisibleBatch {
            total: 64,
            solvers: 3
        }))
    ));
}

#[test]
fn no_devices_is_an_invalid_config() {
    let mut spec = spec();
    spec.devices.clear();
    spec.topology.devices = 0;
    spec.topology.boards.clear();
    spec.topology.links.clear();

    assert!(matches!(
        trainer::train(&spec),
        Err(TrainerErr::InvalidConfig(_))
    ));
}

#[test]
fn missing_spec_file_is_an_io_error() {
    let res = TrainingSpec::from_path("does/not/exist.json");
    assert!(matches!(res, Err(TrainerErr::Io(_))));
}
