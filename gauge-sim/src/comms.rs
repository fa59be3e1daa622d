use crate::error::{GaugeError, Result};

/// Rank/size view of a multi-process run.
///
/// The engine never talks to other processes itself; it only uses the
/// communicator to decide which share of the sites this process measures.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Whether this rank owns `site` under a round-robin partition.
    fn owns_site(&self, site: usize) -> bool {
        site % self.size() == self.rank()
    }
}

/// The only process of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

/// Fixed rank/size handed in by an external launcher.
#[derive(Debug, Clone, Copy)]
pub struct StaticRank {
    rank: usize,
    size: usize,
}

impl StaticRank {
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 || rank >= size {
            return Err(GaugeError::InvalidConfig(format!(
                "rank {rank} is not valid for a run of size {size}"
            )));
        }
        Ok(Self { rank, size })
    }
}

impl Communicator for StaticRank {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}
