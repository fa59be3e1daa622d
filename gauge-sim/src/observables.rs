//! Gauge-invariant observables traced from closed paths.
//!
//! Every function reads links and never writes them; smearing works on a
//! copy.

use crate::comms::Communicator;
use crate::field::LinkSource;
use crate::geometry::{paths, LatticeGeometry, Step, N_DIMS};
use crate::su3::{re_trace, reunitarize, CMatrix3};
use nalgebra::Complex;
use rayon::prelude::*;

/// APE staple weight used when a caller does not choose one.
pub const DEFAULT_SMEARING_PARAMETER: f64 = 1.0;

/// Product of links along `steps` from the site at `start`.
pub fn compute_path(geometry: &LatticeGeometry, links: &[CMatrix3], start: [isize; N_DIMS], steps: &[Step]) -> CMatrix3 {
    links.path_product(geometry, geometry.site_index(start), steps)
}

/// Product of links from `start` to `finish`, moving along t, x, y, z in turn
/// by the signed coordinate differences.
pub fn compute_line(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    start: [isize; N_DIMS],
    finish: [isize; N_DIMS],
) -> CMatrix3 {
    compute_path(geometry, links, start, &line_steps(start, finish))
}

fn line_steps(start: [isize; N_DIMS], finish: [isize; N_DIMS]) -> Vec<Step> {
    (0..N_DIMS)
        .flat_map(|d| paths::straight(d, finish[d] - start[d]))
        .collect()
}

/// `Re Tr` of the `(d1, d2)` plaquette at `site`, divided by 3.
pub fn plaquette(geometry: &LatticeGeometry, links: &[CMatrix3], site: [isize; N_DIMS], d1: usize, d2: usize) -> f64 {
    re_trace(&compute_path(geometry, links, site, &paths::plaquette(d1, d2))) / 3.0
}

/// 2×1 rectangle, long along `d1`.
pub fn rectangle(geometry: &LatticeGeometry, links: &[CMatrix3], site: [isize; N_DIMS], d1: usize, d2: usize) -> f64 {
    re_trace(&compute_path(geometry, links, site, &paths::rectangle(d1, d2))) / 3.0
}

/// Twisted rectangle, long along `d1`.
pub fn twisted_rectangle(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    site: [isize; N_DIMS],
    d1: usize,
    d2: usize,
) -> f64 {
    re_trace(&compute_path(geometry, links, site, &paths::twisted_rectangle(d1, d2))) / 3.0
}

/// Rectangular Wilson loop spanned by two corners: from `corner1` through
/// the point at `corner1`'s time and `corner2`'s position, to `corner2`,
/// back through `corner2`'s time at `corner1`'s position.
pub fn wilson_loop(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    corner1: [isize; N_DIMS],
    corner2: [isize; N_DIMS],
) -> f64 {
    let mid1 = [corner1[0], corner2[1], corner2[2], corner2[3]];
    let mid2 = [corner2[0], corner1[1], corner1[2], corner1[3]];
    let mut steps = line_steps(corner1, mid1);
    steps.extend(line_steps(mid1, corner2));
    steps.extend(line_steps(corner2, mid2));
    steps.extend(line_steps(mid2, corner1));
    re_trace(&compute_path(geometry, links, corner1, &steps)) / 3.0
}

/// `r × t` Wilson loop with its spatial side along `dim`.
pub fn wilson_loop_rt(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    corner: [isize; N_DIMS],
    r: usize,
    t: usize,
    dim: usize,
) -> f64 {
    re_trace(&compute_path(geometry, links, corner, &paths::wilson_loop(r, t, dim))) / 3.0
}

fn site_average(geometry: &LatticeGeometry, per_site: impl Fn(usize) -> f64 + Send + Sync) -> f64 {
    (0..geometry.n_sites).into_par_iter().map(per_site).sum::<f64>() / geometry.n_sites as f64
}

fn plaquette_sum(geometry: &LatticeGeometry, links: &[CMatrix3], site: usize) -> f64 {
    let mut s = 0.0;
    for mu in 0..N_DIMS {
        for nu in mu + 1..N_DIMS {
            s += re_trace(&links.path_product(geometry, site, &paths::plaquette(mu, nu)));
        }
    }
    s / 3.0
}

fn loop_sum(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    site: usize,
    shape: fn(usize, usize) -> Vec<Step>,
) -> f64 {
    let mut s = 0.0;
    for mu in 0..N_DIMS {
        for nu in (0..N_DIMS).filter(|&nu| nu != mu) {
            s += re_trace(&links.path_product(geometry, site, &shape(mu, nu)));
        }
    }
    s / 3.0
}

/// Plaquette averaged over all sites and the six planes.
pub fn average_plaquette(geometry: &LatticeGeometry, links: &[CMatrix3]) -> f64 {
    site_average(geometry, |site| plaquette_sum(geometry, links, site)) / 6.0
}

/// Rectangle averaged over all sites and the twelve orientations.
pub fn average_rectangle(geometry: &LatticeGeometry, links: &[CMatrix3]) -> f64 {
    site_average(geometry, |site| loop_sum(geometry, links, site, paths::rectangle)) / 12.0
}

/// Twisted rectangle averaged over all sites and the twelve orientations.
pub fn average_twisted_rectangle(geometry: &LatticeGeometry, links: &[CMatrix3]) -> f64 {
    site_average(geometry, |site| loop_sum(geometry, links, site, paths::twisted_rectangle)) / 12.0
}

/// `r × t` Wilson loop averaged over all sites and the three spatial
/// directions, after `n_smears` APE smearing steps on a copy of the links.
pub fn average_wilson_loop(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    r: usize,
    t: usize,
    n_smears: usize,
    smearing_parameter: f64,
) -> f64 {
    let smeared;
    let links = if n_smears > 0 {
        smeared = smear_links(geometry, links, None, n_smears, smearing_parameter);
        smeared.as_slice()
    } else {
        links
    };
    let shapes: Vec<Vec<Step>> = (1..N_DIMS).map(|dim| paths::wilson_loop(r, t, dim)).collect();
    site_average(geometry, |site| {
        shapes
            .iter()
            .map(|steps| re_trace(&links.path_product(geometry, site, steps)))
            .sum::<f64>()
            / 3.0
    }) / 3.0
}

/// `<Re Tr U> / 3` over every link.
pub fn mean_link(links: &[CMatrix3]) -> f64 {
    links.par_iter().map(re_trace).sum::<f64>() / (3.0 * links.len() as f64)
}

/// Plaquette sum over the sites owned by `comm`, with the number of
/// plaquettes summed. Reducing these across ranks gives the global average.
pub fn partial_plaquette_sum(geometry: &LatticeGeometry, links: &[CMatrix3], comm: &dyn Communicator) -> (f64, usize) {
    let owned: Vec<usize> = (0..geometry.n_sites).filter(|&s| comm.owns_site(s)).collect();
    let sum = owned
        .par_iter()
        .map(|&site| plaquette_sum(geometry, links, site))
        .sum::<f64>();
    (sum, owned.len() * 6)
}

/// Rectangle counterpart of [`partial_plaquette_sum`].
pub fn partial_rectangle_sum(geometry: &LatticeGeometry, links: &[CMatrix3], comm: &dyn Communicator) -> (f64, usize) {
    let owned: Vec<usize> = (0..geometry.n_sites).filter(|&s| comm.owns_site(s)).collect();
    let sum = owned
        .par_iter()
        .map(|&site| loop_sum(geometry, links, site, paths::rectangle))
        .sum::<f64>();
    (sum, owned.len() * 12)
}

/// APE-smeared copy of the spatial links.
///
/// Each step replaces every spatial link `U` by `Proj_SU3(U + rho Q)`, where
/// `Q` is the sum of the four spatial staples from `x` to `x + mu`. All
/// links of one step are computed from the previous step's links. With
/// `time = Some(t)` only that time slice is smeared.
pub fn smear_links(
    geometry: &LatticeGeometry,
    links: &[CMatrix3],
    time: Option<usize>,
    n_smears: usize,
    rho: f64,
) -> Vec<CMatrix3> {
    let mut current = links.to_vec();
    let rho = Complex::new(rho, 0.0);
    for _ in 0..n_smears {
        let prev = current.clone();
        current.par_iter_mut().enumerate().for_each(|(link, u)| {
            let (site, mu) = (link / N_DIMS, link % N_DIMS);
            if mu == 0 {
                return;
            }
            if let Some(t) = time {
                if geometry.site_coords(site)[0] != t % geometry.temporal_extent {
                    return;
                }
            }
            *u = reunitarize(&(*u + spatial_staple(geometry, &prev, link) * rho));
        });
    }
    current
}

/// Sum of spatial staples running from `x` to `x + mu`.
fn spatial_staple(geometry: &LatticeGeometry, links: &[CMatrix3], link: usize) -> CMatrix3 {
    let (site, mu) = (link / N_DIMS, link % N_DIMS);
    let start = geometry.neighbor_site(site, mu, true);
    let mut q = CMatrix3::zeros();
    for nu in (1..N_DIMS).filter(|&nu| nu != mu) {
        for s in [true, false] {
            let steps = [Step::signed(nu, s), Step::back(mu), Step::signed(nu, !s)];
            q += links.path_product(geometry, start, &steps).adjoint();
        }
    }
    q
}
