use super::lattice::{LatticeGeometry, N_DIMS};
use crate::error::{GaugeError, Result};
use GaugeError::GeometryMismatch;

/// Checkerboard colour of a block, from the parity of its block-coordinate sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockColor {
    Even,
    Odd,
}

/// Partition of the lattice into hypercubic blocks of edge `chunk_size`.
///
/// Each block is identified by its id (row-major over block coordinates) and
/// by its base link, the `mu = 0` link of its lowest corner. A block's links
/// are `base + offset` for every offset in [`chunk_sequence`](Self::chunk_sequence),
/// with no wraparound.
///
/// Within a colour, blocks are further split into waves by the per-axis
/// parity of their block coordinates. Two distinct blocks of one wave sit at
/// least two blocks apart along some axis, so with `chunk_size >= reach` they
/// never read each other's links.
#[derive(Debug, Clone)]
pub struct BlockColoring {
    chunk_size: usize,
    blocks_per_axis: [usize; N_DIMS],
    chunk_sequence: Vec<usize>,
    bases: Vec<usize>,
    even_blocks: Vec<usize>,
    odd_blocks: Vec<usize>,
    /// Block ids per parity pattern; bit `d` of the index is the parity along axis `d`.
    waves: Vec<Vec<usize>>,
}

impl BlockColoring {
    pub fn new(geometry: &LatticeGeometry, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(GeometryMismatch("chunk size must be positive".into()));
        }
        for (d, &extent) in geometry.shape.iter().enumerate() {
            if extent % chunk_size != 0 {
                return Err(GeometryMismatch(format!(
                    "chunk size {chunk_size} does not divide extent {extent} along axis {d}"
                )));
            }
        }
        let blocks_per_axis = geometry.shape.map(|n| n / chunk_size);
        let n_blocks: usize = blocks_per_axis.iter().product();
        let c = chunk_size as isize;

        // t, x, y, z, mu order
        let mut chunk_sequence = Vec::with_capacity(chunk_size.pow(4) * N_DIMS);
        for t in 0..c {
            for x in 0..c {
                for y in 0..c {
                    for z in 0..c {
                        for mu in 0..N_DIMS {
                            chunk_sequence.push(geometry.link_index(t, x, y, z, mu));
                        }
                    }
                }
            }
        }

        let mut bases = Vec::with_capacity(n_blocks);
        let mut even_blocks = Vec::new();
        let mut odd_blocks = Vec::new();
        let mut waves = vec![Vec::new(); 1 << N_DIMS];
        for id in 0..n_blocks {
            let coords = block_coords(&blocks_per_axis, id);
            let base = geometry.link_index(
                coords[0] as isize * c,
                coords[1] as isize * c,
                coords[2] as isize * c,
                coords[3] as isize * c,
                0,
            );
            bases.push(base);
            if coords.iter().sum::<usize>() % 2 == 0 {
                even_blocks.push(base);
            } else {
                odd_blocks.push(base);
            }
            let pattern = (0..N_DIMS).fold(0, |acc, d| acc | ((coords[d] & 1) << d));
            waves[pattern].push(id);
        }

        Ok(Self {
            chunk_size,
            blocks_per_axis,
            chunk_sequence,
            bases,
            even_blocks,
            odd_blocks,
            waves,
        })
    }

    /// Check that blocks of one wave can be updated concurrently by an action
    /// whose loops extend `reach` sites from the updated link.
    pub fn validate_parallel(&self, reach: usize) -> Result<()> {
        for (d, &nb) in self.blocks_per_axis.iter().enumerate() {
            if nb > 1 && nb % 2 != 0 {
                return Err(GeometryMismatch(format!(
                    "{nb} blocks along axis {d}: parallel updates need 1 or an even number of blocks per axis"
                )));
            }
            if nb >= 4 && self.chunk_size < reach {
                return Err(GeometryMismatch(format!(
                    "chunk size {} is smaller than the action's reach {reach}",
                    self.chunk_size
                )));
            }
        }
        Ok(())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Offset-relative link indices covered by one block, in update order.
    pub fn chunk_sequence(&self) -> &[usize] {
        &self.chunk_sequence
    }

    pub fn n_blocks(&self) -> usize {
        self.bases.len()
    }

    pub fn block_base(&self, id: usize) -> usize {
        self.bases[id]
    }

    /// Base link indices of the even blocks.
    pub fn even_blocks(&self) -> &[usize] {
        &self.even_blocks
    }

    /// Base link indices of the odd blocks.
    pub fn odd_blocks(&self) -> &[usize] {
        &self.odd_blocks
    }

    /// Non-empty waves of `color`, each a list of block ids.
    pub fn waves(&self, color: BlockColor) -> impl Iterator<Item = &[usize]> {
        let want = matches!(color, BlockColor::Odd) as u32;
        self.waves
            .iter()
            .enumerate()
            .filter(move |(pattern, ids)| (*pattern as u32).count_ones() % 2 == want && !ids.is_empty())
            .map(|(_, ids)| ids.as_slice())
    }
}

fn block_coords(blocks_per_axis: &[usize; N_DIMS], id: usize) -> [usize; N_DIMS] {
    let mut coords = [0usize; N_DIMS];
    let mut rem = id;
    for d in (0..N_DIMS).rev() {
        coords[d] = rem % blocks_per_axis[d];
        rem /= blocks_per_axis[d];
    }
    coords
}
