pub mod sweep;
pub mod update;

pub use sweep::{block_sweep, serial_sweep, SweepStats};
pub use update::UpdateContext;
