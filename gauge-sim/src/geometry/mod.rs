pub mod blocks;
pub mod lattice;
pub mod paths;

pub use blocks::{BlockColor, BlockColoring};
pub use lattice::{LatticeGeometry, LinkCoord, N_DIMS};
pub use paths::Step;
