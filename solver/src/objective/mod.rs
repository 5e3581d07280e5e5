mod linear;
mod objective;

pub use linear::{DatasetSpec, LinearRegression};
pub use objective::Objective;
