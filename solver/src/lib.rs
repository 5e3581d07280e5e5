mod blob;
mod error;
mod net;
pub mod objective;
pub mod optimization;
mod sgd;
mod solver;

pub use blob::{Blob, Storage};
pub use error::{Result, SolverErr};
pub use net::Net;
pub use sgd::SgdSolver;
pub use solver::{NoSync, Solver, SolverParams, StepCallback};
