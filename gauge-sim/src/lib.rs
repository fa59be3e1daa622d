pub mod action;
pub mod comms;
pub mod config;
pub mod error;
pub mod field;
pub mod geometry;
pub mod mcmc;
pub mod observables;
pub mod random;
pub mod simulation;
pub mod statistics;
pub mod su3;

mod parallel;

pub use config::{ActionKind, LatticeConfig, RunConfig, UpdateMethod};
pub use error::{GaugeError, Result};
pub use simulation::{run_replicas, run_sweep_loop, GaugeLattice};
pub use statistics::SweepResult;
