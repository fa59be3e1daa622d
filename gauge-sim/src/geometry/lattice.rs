use crate::error::{GaugeError, Result};

/// Number of lattice directions; direction 0 is time.
pub const N_DIMS: usize = 4;

/// A link coordinate `(t, x, y, z, mu)`.
///
/// Site coordinates may lie outside the lattice; they are reduced
/// periodically when converted to an index. Only the direction is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkCoord {
    site: [isize; N_DIMS],
    mu: usize,
}

impl LinkCoord {
    pub fn new(t: isize, x: isize, y: isize, z: isize, mu: usize) -> Result<Self> {
        if mu >= N_DIMS {
            return Err(GaugeError::InvalidDirection(mu));
        }
        Ok(Self {
            site: [t, x, y, z],
            mu,
        })
    }

    pub fn t(&self) -> isize {
        self.site[0]
    }
    pub fn x(&self) -> isize {
        self.site[1]
    }
    pub fn y(&self) -> isize {
        self.site[2]
    }
    pub fn z(&self) -> isize {
        self.site[3]
    }
    pub fn mu(&self) -> usize {
        self.mu
    }
    pub fn site(&self) -> [isize; N_DIMS] {
        self.site
    }
}

/// Periodic 4D lattice of extent `T × S × S × S` with a precomputed site
/// neighbor table.
///
/// Sites are indexed in row-major order over `(t, x, y, z)`. Links are
/// indexed `site * 4 + mu`, so the four links leaving a site are contiguous.
#[derive(Debug, Clone)]
pub struct LatticeGeometry {
    /// Sites per spatial axis.
    pub spatial_extent: usize,
    /// Sites along the time axis.
    pub temporal_extent: usize,
    /// `[T, S, S, S]`.
    pub shape: [usize; N_DIMS],
    /// Row-major site strides: `strides[d] = product of shape[d+1..]`.
    pub strides: [usize; N_DIMS],
    pub n_sites: usize,
    /// `n_sites * 4`.
    pub n_links: usize,
    /// Layout: `neighbors[(site * 4 + d) * 2 + dir]`, `dir = 0` forward.
    neighbors: Vec<u32>,
}

impl LatticeGeometry {
    pub fn new(spatial_extent: usize, temporal_extent: usize) -> Self {
        assert!(
            spatial_extent > 0 && temporal_extent > 0,
            "lattice extents must be positive, got S={spatial_extent}, T={temporal_extent}"
        );
        let shape = [temporal_extent, spatial_extent, spatial_extent, spatial_extent];
        let mut strides = [1usize; N_DIMS];
        for d in (0..N_DIMS - 1).rev() {
            strides[d] = strides[d + 1] * shape[d + 1];
        }
        let n_sites: usize = shape.iter().product();

        let mut neighbors = vec![0u32; n_sites * N_DIMS * 2];
        for i in 0..n_sites {
            let coords: [usize; N_DIMS] = std::array::from_fn(|d| (i / strides[d]) % shape[d]);
            for d in 0..N_DIMS {
                for (dir, sign) in [(0, 1isize), (1, -1isize)] {
                    let mut flat = 0usize;
                    for dim in 0..N_DIMS {
                        let step = if dim == d { sign } else { 0 };
                        let c = (coords[dim] as isize + step).rem_euclid(shape[dim] as isize) as usize;
                        flat += c * strides[dim];
                    }
                    neighbors[(i * N_DIMS + d) * 2 + dir] = flat as u32;
                }
            }
        }

        Self {
            spatial_extent,
            temporal_extent,
            shape,
            strides,
            n_sites,
            n_links: n_sites * N_DIMS,
            neighbors,
        }
    }

    /// Flat index of a site, reducing every coordinate periodically.
    #[inline]
    pub fn site_index(&self, coords: [isize; N_DIMS]) -> usize {
        let mut flat = 0usize;
        for d in 0..N_DIMS {
            flat += coords[d].rem_euclid(self.shape[d] as isize) as usize * self.strides[d];
        }
        flat
    }

    #[inline]
    pub fn site_coords(&self, site: usize) -> [usize; N_DIMS] {
        std::array::from_fn(|d| (site / self.strides[d]) % self.shape[d])
    }

    /// Link index of `(t, x, y, z, mu)` with periodic reduction of the site.
    #[inline]
    pub fn link_index(&self, t: isize, x: isize, y: isize, z: isize, mu: usize) -> usize {
        debug_assert!(mu < N_DIMS, "direction {mu} out of range");
        self.site_index([t, x, y, z]) * N_DIMS + mu
    }

    #[inline]
    pub fn link_at(&self, coord: LinkCoord) -> usize {
        self.site_index(coord.site) * N_DIMS + coord.mu
    }

    /// Inverse of [`link_index`](Self::link_index); coordinates come back reduced.
    pub fn link_coords(&self, link: usize) -> LinkCoord {
        let c = self.site_coords(link / N_DIMS);
        LinkCoord {
            site: c.map(|v| v as isize),
            mu: link % N_DIMS,
        }
    }

    /// Neighbor of `site` one step along `dim`.
    #[inline]
    pub fn neighbor_site(&self, site: usize, dim: usize, forward: bool) -> usize {
        self.neighbors[(site * N_DIMS + dim) * 2 + (!forward as usize)] as usize
    }

    /// Link with the same direction as `link`, rooted one step along `dim`.
    #[inline]
    pub fn neighbor(&self, link: usize, dim: usize, forward: bool) -> usize {
        self.neighbor_site(link / N_DIMS, dim, forward) * N_DIMS + link % N_DIMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn link_index_is_a_bijection() {
        let geom = LatticeGeometry::new(3, 4);
        assert_eq!(geom.n_links, 3 * 3 * 3 * 4 * 4);
        let mut seen = HashSet::new();
        for t in 0..4 {
            for x in 0..3 {
                for y in 0..3 {
                    for z in 0..3 {
                        for mu in 0..4 {
                            let i = geom.link_index(t, x, y, z, mu);
                            assert!(i < geom.n_links);
                            assert!(seen.insert(i), "duplicate index {i}");
                            let back = geom.link_coords(i);
                            assert_eq!((back.t(), back.x(), back.y(), back.z()), (t, x, y, z));
                            assert_eq!(back.mu(), mu);
                        }
                    }
                }
            }
        }
        assert_eq!(seen.len(), geom.n_links);
    }

    #[test]
    fn link_index_is_periodic() {
        let geom = LatticeGeometry::new(4, 6);
        for mu in 0..4 {
            assert_eq!(
                geom.link_index(1, 2, 3, 0, mu),
                geom.link_index(1 + 6, 2 + 4, 3 + 4, 4, mu)
            );
            assert_eq!(geom.link_index(-1, 0, 0, 0, mu), geom.link_index(5, 0, 0, 0, mu));
        }
    }

    #[test]
    fn neighbors_wrap() {
        let geom = LatticeGeometry::new(4, 8);
        assert_eq!(geom.strides, [64, 16, 4, 1]);

        // t-forward from the origin
        assert_eq!(geom.neighbor_site(0, 0, true), 64);
        // z-backward from the origin wraps to z = 3
        assert_eq!(geom.neighbor_site(0, 3, false), 3);
        // t-forward from the last time slice wraps to t = 0
        let last = geom.site_index([7, 1, 2, 3]);
        assert_eq!(geom.neighbor_site(last, 0, true), geom.site_index([0, 1, 2, 3]));

        let link = geom.link_index(0, 0, 0, 0, 2);
        assert_eq!(geom.neighbor(link, 1, false), geom.link_index(0, 3, 0, 0, 2));
        assert_eq!(geom.site_index([0, 0, -5, 0]), geom.site_index([0, 0, 3, 0]));
    }

    #[test]
    fn link_coord_rejects_bad_direction() {
        assert!(matches!(
            LinkCoord::new(0, 0, 0, 0, 4),
            Err(GaugeError::InvalidDirection(4))
        ));
        let geom = LatticeGeometry::new(4, 4);
        let c = LinkCoord::new(5, -1, 2, 3, 1).unwrap();
        assert_eq!(geom.link_at(c), geom.link_index(1, 3, 2, 3, 1));
    }
}
