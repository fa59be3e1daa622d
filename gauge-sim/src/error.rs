use thiserror::Error;

pub type Result<T> = std::result::Result<T, GaugeError>;

/// Failures surfaced by the engine.
///
/// Everything here is raised at construction or at the public accessor
/// boundary; the update hot path itself never returns an error.
#[derive(Debug, Error)]
pub enum GaugeError {
    /// Chunk size and lattice extents do not tile into a valid colouring.
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// Direct link access outside `[0, n_links)`.
    #[error("link index {index} out of range for a lattice with {n_links} links")]
    IndexOutOfRange { index: usize, n_links: usize },

    /// Lattice direction outside `0..4`.
    #[error("direction {0} out of range, expected 0..4")]
    InvalidDirection(usize),

    /// Rejected by config validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A sweep loop was stopped between sweeps by the driver.
    #[error("interrupted")]
    Interrupted,
}

impl From<validator::ValidationErrors> for GaugeError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::InvalidConfig(format!("{e}"))
    }
}
