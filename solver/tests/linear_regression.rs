use std::{num::NonZeroUsize, sync::Arc};

use device::{HostRuntime, HostTopology, Runtime};
use solver::{
    NoSync, SgdSolver, Solver, SolverParams,
    objective::{DatasetSpec, LinearRegression},
    optimization::OptimizerSpec,
};

#[test]
fn sgd_recovers_linear_model() {
    let runtime: Arc<dyn Runtime> = Arc::new(HostRuntime::new(&HostTopology::new(1)).unwrap());

    let dataset: DatasetSpec = serde_json::from_str(
        r#"{ "samples": 128, "weights": [1.5, -2.0, 0.5], "bias": 0.25, "seed": 3 }"#,
    )
    .unwrap();
    let params: SolverParams =
        serde_json::from_str(r#"{ "max_iter": 400, "random_seed": 11, "display": 100 }"#).unwrap();
    let optimizer: OptimizerSpec =
        serde_json::from_str(r#"{ "gradient_descent": { "learning_rate": 0.1 } }"#).unwrap();

    let objective =
        LinearRegression::synthetic(&dataset, NonZeroUsize::new(16).unwrap(), params.random_seed)
            .unwrap();
    let net = objective.net(0.);
    let len = net.total_size();

    let mut solver = SgdSolver::new(
        runtime.clone(),
        params,
        net,
        objective,
        optimizer.build(len),
    )
    .unwrap();
    solver.solve(&mut NoSync).unwrap();

    let mut learned = vec![0.; len];
    solver.net().gather_data(&*runtime, &mut learned).unwrap();

    let expected = [1.5, -2.0, 0.5, 0.25];
    for (got, want) in learned.iter().zip(expected) {
        assert!((got - want).abs() < 1e-2, "got {learned:?}");
    }

    let losses = solver.losses();
    assert_eq!(losses.len(), 400);
    assert!(losses[losses.len() - 1] < losses[0]);
}

#[test]
fn solve_resumes_from_current_iteration() {
    let runtime: Arc<dyn Runtime> = Arc::new(HostRuntime::new(&HostTopology::new(1)).unwrap());
    let dataset = DatasetSpec {
        samples: NonZeroUsize::new(8).unwrap(),
        weights: vec![1.],
        bias: 0.,
        noise: 0.,
        seed: 0,
    };
    let params = SolverParams {
        device_id: 0,
        max_iter: 10,
        random_seed: Some(1),
        display: 0,
    };

    let objective =
        LinearRegression::synthetic(&dataset, NonZeroUsize::new(2).unwrap(), Some(1)).unwrap();
    let net = objective.net(0.);
    let optimizer = OptimizerSpec::GradientDescent {
        learning_rate: 0.1,
        weight_decay: 0.,
    }
    .build(2);
    let mut solver = SgdSolver::new(runtime, params, net, objective, optimizer).unwrap();

    solver.step(4, &mut NoSync).unwrap();
    assert_eq!(solver.iter(), 4);

    solver.solve(&mut NoSync).unwrap();
    assert_eq!(solver.iter(), 10);
}
