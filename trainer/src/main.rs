use std::{env, io};

use log::info;
use trainer::TrainingSpec;

const SPEC_VAR: &str = "TRAINING_SPEC";

fn main() -> io::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var(SPEC_VAR).ok())
        .ok_or_else(|| io::Error::other(format!("usage: trainer <spec.json>, or set {SPEC_VAR}")))?;

    let spec = TrainingSpec::from_path(&path)?;
    info!("loaded training spec from {path}");

    let report = trainer::train(&spec)?;
    info!(iters = report.iters; "training done, final loss {:?}", report.loss);

    println!("trained params: {:?}", report.params);
    Ok(())
}
