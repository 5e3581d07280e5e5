//! Tree structured gradient synchronization across the devices of a single machine.
//!
//! Devices are paired into a tree preferring shared boards, then direct peer links. Every
//! device runs its own solver over a flat device mirror of the model's parameters; before
//! each step parameters are broadcast down the tree and after it gradients are summed up
//! to the root, which averages them.

mod batch;
mod config;
mod error;
mod pairing;
mod params;
mod queue;
mod run;
mod timing;
mod tree;
mod worker;

pub use batch::divide_batch_size;
pub use config::SyncConfig;
pub use error::{Result, SyncErr, TopologyErr};
pub use pairing::DevicePair;
pub use params::DeviceParams;
pub use queue::{Closed, HandoffErr, HandoffQueue};
pub use run::P2PSync;
pub use timing::{StepTiming, SyncMetrics};
