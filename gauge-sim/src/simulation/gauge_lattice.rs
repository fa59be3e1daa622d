use crate::action::Action;
use crate::config::{resolve_update_method, LatticeConfig, UpdateMethod};
use crate::error::{GaugeError, Result};
use crate::field::{GaugeField, LinkView};
use crate::geometry::{BlockColoring, LatticeGeometry, LinkCoord, Step, N_DIMS};
use crate::mcmc::{self, SweepStats, UpdateContext};
use crate::observables;
use crate::random::RandomSu3Pool;
use crate::su3::CMatrix3;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use tracing::{debug, info, warn};
use validator::Validate;

/// One SU(3) gauge configuration together with everything needed to update
/// and measure it.
///
/// Randomness is split into one stream per update block plus one serial
/// stream, seeded `seed + block_id` and `seed + n_blocks`, so a trajectory
/// only depends on the seed and not on thread scheduling. `Clone` copies
/// every stream and yields an exact replica; use [`GaugeLattice::reseeded`]
/// for an independent one.
#[derive(Debug, Clone)]
pub struct GaugeLattice {
    config: LatticeConfig,
    geometry: LatticeGeometry,
    coloring: BlockColoring,
    action: Action,
    method: UpdateMethod,
    pool: RandomSu3Pool,
    /// Whether the blocks of a wave may run on separate threads.
    concurrent_blocks: bool,
    field: GaugeField,
    block_rngs: Vec<Xoshiro256StarStar>,
    serial_rng: Xoshiro256StarStar,
    seed: u64,
    stats: SweepStats,
    n_sweeps: usize,
}

impl GaugeLattice {
    /// Validate `config` and build a cold-start lattice.
    pub fn new(config: LatticeConfig) -> Result<Self> {
        config.validate()?;

        let geometry = LatticeGeometry::new(config.spatial_extent, config.temporal_extent);
        let action = Action::new(config.action, config.beta, config.u0, config.anisotropy);
        let method = resolve_update_method(config.action, config.update_method);
        let coloring = BlockColoring::new(&geometry, config.chunk_size)?;
        let concurrent_blocks = config.parallel
            && match coloring.validate_parallel(action.reach()) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{e}; running block sweeps sequentially");
                    false
                }
            };

        let seed = match config.seed {
            Some(s) => s,
            None => {
                let s = rand::random::<u64>();
                info!(seed = s, "no seed given, drew one from OS entropy");
                s
            }
        };

        let n_blocks = coloring.n_blocks();
        let (block_rngs, serial_rng, pool) = seed_streams(seed, n_blocks);
        let field = GaugeField::cold(geometry.n_links);

        info!(
            sites = geometry.n_sites,
            blocks = n_blocks,
            action = config.action.name(),
            method = method.name(),
            concurrent_blocks,
            "lattice ready"
        );

        Ok(Self {
            config,
            geometry,
            coloring,
            action,
            method,
            pool,
            concurrent_blocks,
            field,
            block_rngs,
            serial_rng,
            seed,
            stats: SweepStats::default(),
            n_sweeps: 0,
        })
    }

    /// Replica with the same links and parameters but fresh random streams
    /// derived from `seed`.
    pub fn reseeded(&self, seed: u64) -> Self {
        let mut replica = self.clone();
        let (block_rngs, serial_rng, pool) = seed_streams(seed, self.coloring.n_blocks());
        replica.block_rngs = block_rngs;
        replica.serial_rng = serial_rng;
        replica.pool = pool;
        replica.seed = seed;
        replica.config.seed = Some(seed);
        replica.stats = SweepStats::default();
        replica
    }

    /// Replace every link by a random SU(3) matrix.
    pub fn hot_start(&mut self) {
        self.field = GaugeField::hot(self.geometry.n_links, &mut self.serial_rng);
    }

    /// Replace every link by the identity.
    pub fn cold_start(&mut self) {
        self.field = GaugeField::cold(self.geometry.n_links);
    }

    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    pub fn geometry(&self) -> &LatticeGeometry {
        &self.geometry
    }

    pub fn coloring(&self) -> &BlockColoring {
        &self.coloring
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Update method actually in use, after any fallback.
    pub fn update_method(&self) -> UpdateMethod {
        self.method
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// False when the lattice is serial or its blocks cannot be swept
    /// concurrently without races; waves then run one block at a time.
    pub fn concurrent_blocks(&self) -> bool {
        self.concurrent_blocks
    }

    pub fn field(&self) -> &GaugeField {
        &self.field
    }

    pub fn links(&self) -> &[CMatrix3] {
        self.field.links()
    }

    pub fn link(&self, index: usize) -> Result<CMatrix3> {
        self.field.get(index).copied()
    }

    pub fn set_link(&mut self, index: usize, matrix: CMatrix3) -> Result<()> {
        self.field.set(index, matrix)
    }

    pub fn link_at(&self, coord: LinkCoord) -> CMatrix3 {
        self.field.links()[self.geometry.link_at(coord)]
    }

    /// Proposal statistics accumulated since construction.
    pub fn sweep_stats(&self) -> SweepStats {
        self.stats
    }

    pub fn acceptance_rate(&self) -> f64 {
        self.stats.acceptance_rate()
    }

    /// Update a single link with the serial stream.
    pub fn update_link(&mut self, index: usize) -> Result<bool> {
        if index >= self.geometry.n_links {
            return Err(GaugeError::IndexOutOfRange {
                index,
                n_links: self.geometry.n_links,
            });
        }
        let ctx = UpdateContext::new(&self.geometry, &self.action, &self.pool, self.method);
        let mut view = LinkView::new(self.field.links_mut());
        let accepted = ctx.update_link(&mut view, index, &mut self.serial_rng);
        self.stats.merge(SweepStats {
            proposals: 1,
            accepted: accepted as u64,
        });
        Ok(accepted)
    }

    /// One sweep over the whole lattice: block-parallel when configured,
    /// a single ordered pass otherwise.
    pub fn update(&mut self) {
        if self.config.parallel {
            self.schwarz_update(1);
        } else {
            self.serial_update();
        }
    }

    /// Block sweep with `n_updates` passes over each block before moving on.
    /// Runs the blocks of a wave on rayon only when [`Self::concurrent_blocks`].
    pub fn schwarz_update(&mut self, n_updates: usize) {
        let ctx = UpdateContext::new(&self.geometry, &self.action, &self.pool, self.method);
        let stats = mcmc::block_sweep(
            &ctx,
            &self.coloring,
            self.field.links_mut(),
            &mut self.block_rngs,
            n_updates,
            !self.concurrent_blocks,
        );
        self.finish_sweep(stats);
    }

    /// One ordered pass over every link with the serial stream.
    pub fn serial_update(&mut self) {
        let ctx = UpdateContext::new(&self.geometry, &self.action, &self.pool, self.method);
        let stats = mcmc::serial_sweep(&ctx, self.field.links_mut(), &mut self.serial_rng);
        self.finish_sweep(stats);
    }

    fn finish_sweep(&mut self, stats: SweepStats) {
        self.stats.merge(stats);
        self.n_sweeps += 1;
        let interval = self.config.reunitarize_interval;
        if interval > 0 && self.n_sweeps % interval == 0 {
            debug!(
                deviation = self.field.max_unitarity_deviation(),
                sweep = self.n_sweeps,
                "reunitarizing"
            );
            self.field.reunitarize();
        }
    }

    pub fn thermalize(&mut self, n_sweeps: usize) {
        info!(n_sweeps, "thermalizing");
        for _ in 0..n_sweeps {
            self.update();
        }
        info!(plaquette = self.av_plaquette(), "thermalization done");
    }

    /// Advance `n_correlations` sweeps to the next measured configuration.
    pub fn next_config(&mut self) {
        for _ in 0..self.config.n_correlations {
            self.update();
        }
    }

    pub fn reunitarize(&mut self) {
        self.field.reunitarize();
    }

    pub fn max_unitarity_deviation(&self) -> f64 {
        self.field.max_unitarity_deviation()
    }

    /// Total action of the current configuration.
    pub fn total_action(&self) -> f64 {
        self.action.total_action(&self.geometry, self.field.links())
    }

    pub fn compute_path(&self, start: [isize; N_DIMS], steps: &[Step]) -> Result<CMatrix3> {
        if let Some(step) = steps.iter().find(|s| s.dim >= N_DIMS) {
            return Err(GaugeError::InvalidDirection(step.dim));
        }
        Ok(observables::compute_path(&self.geometry, self.field.links(), start, steps))
    }

    pub fn compute_line(&self, start: [isize; N_DIMS], finish: [isize; N_DIMS]) -> CMatrix3 {
        observables::compute_line(&self.geometry, self.field.links(), start, finish)
    }

    pub fn plaquette(&self, site: [isize; N_DIMS], d1: usize, d2: usize) -> Result<f64> {
        check_plane(d1, d2)?;
        Ok(observables::plaquette(&self.geometry, self.field.links(), site, d1, d2))
    }

    pub fn rectangle(&self, site: [isize; N_DIMS], d1: usize, d2: usize) -> Result<f64> {
        check_plane(d1, d2)?;
        Ok(observables::rectangle(&self.geometry, self.field.links(), site, d1, d2))
    }

    pub fn twisted_rectangle(&self, site: [isize; N_DIMS], d1: usize, d2: usize) -> Result<f64> {
        check_plane(d1, d2)?;
        Ok(observables::twisted_rectangle(&self.geometry, self.field.links(), site, d1, d2))
    }

    /// Wilson loop between two corners, measured on a copy smeared
    /// `n_smears` times when `n_smears > 0`.
    pub fn wilson_loop(
        &self,
        corner1: [isize; N_DIMS],
        corner2: [isize; N_DIMS],
        n_smears: usize,
        smearing_parameter: f64,
    ) -> f64 {
        if n_smears == 0 {
            return observables::wilson_loop(&self.geometry, self.field.links(), corner1, corner2);
        }
        let smeared = self.smeared_links(None, n_smears, smearing_parameter);
        observables::wilson_loop(&self.geometry, &smeared, corner1, corner2)
    }

    pub fn wilson_loop_rt(&self, corner: [isize; N_DIMS], r: usize, t: usize, dim: usize) -> Result<f64> {
        if dim == 0 || dim >= N_DIMS {
            return Err(GaugeError::InvalidDirection(dim));
        }
        Ok(observables::wilson_loop_rt(&self.geometry, self.field.links(), corner, r, t, dim))
    }

    pub fn av_plaquette(&self) -> f64 {
        observables::average_plaquette(&self.geometry, self.field.links())
    }

    pub fn av_rectangle(&self) -> f64 {
        observables::average_rectangle(&self.geometry, self.field.links())
    }

    pub fn av_twisted_rectangle(&self) -> f64 {
        observables::average_twisted_rectangle(&self.geometry, self.field.links())
    }

    pub fn av_wilson_loop(&self, r: usize, t: usize, n_smears: usize, smearing_parameter: f64) -> f64 {
        observables::average_wilson_loop(&self.geometry, self.field.links(), r, t, n_smears, smearing_parameter)
    }

    pub fn mean_link(&self) -> f64 {
        observables::mean_link(self.field.links())
    }

    /// APE-smeared copy of the links; the lattice itself is untouched.
    pub fn smeared_links(&self, time: Option<usize>, n_smears: usize, rho: f64) -> Vec<CMatrix3> {
        observables::smear_links(&self.geometry, self.field.links(), time, n_smears, rho)
    }
}

fn check_plane(d1: usize, d2: usize) -> Result<()> {
    for d in [d1, d2] {
        if d >= N_DIMS {
            return Err(GaugeError::InvalidDirection(d));
        }
    }
    Ok(())
}

fn seed_streams(seed: u64, n_blocks: usize) -> (Vec<Xoshiro256StarStar>, Xoshiro256StarStar, RandomSu3Pool) {
    let block_rngs = (0..n_blocks as u64)
        .map(|i| Xoshiro256StarStar::seed_from_u64(seed.wrapping_add(i)))
        .collect();
    let serial_rng = Xoshiro256StarStar::seed_from_u64(seed.wrapping_add(n_blocks as u64));
    let pool = RandomSu3Pool::generate(seed.wrapping_add(n_blocks as u64 + 1));
    (block_rngs, serial_rng, pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionKind;
    use approx::assert_abs_diff_eq;

    fn config(beta: f64, parallel: bool) -> LatticeConfig {
        LatticeConfig {
            spatial_extent: 4,
            temporal_extent: 4,
            beta,
            chunk_size: 2,
            parallel,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn mean_plaquette(lattice: &mut GaugeLattice, n_therm: usize, n_meas: usize) -> f64 {
        lattice.thermalize(n_therm);
        let mut sum = 0.0;
        for _ in 0..n_meas {
            lattice.update();
            sum += lattice.av_plaquette();
        }
        sum / n_meas as f64
    }

    #[test]
    fn cold_start_is_ordered() {
        let lattice = GaugeLattice::new(LatticeConfig {
            seed: Some(1),
            ..Default::default()
        })
        .unwrap();
        assert_abs_diff_eq!(lattice.av_plaquette(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lattice.av_rectangle(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lattice.mean_link(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(lattice.wilson_loop([0, 0, 0, 0], [2, 1, 1, 0], 2, 0.4), 1.0, epsilon = 1e-12);
        assert_eq!(lattice.geometry().n_links, 4 * 4 * 4 * 8 * 4);
    }

    #[test]
    fn strong_coupling_plaquette() {
        // leading order <P> = beta / 18
        let mut heatbath = GaugeLattice::new(config(1.0, true)).unwrap();
        assert_abs_diff_eq!(mean_plaquette(&mut heatbath, 20, 20), 1.0 / 18.0, epsilon = 0.02);

        let mut metropolis = GaugeLattice::new(LatticeConfig {
            update_method: UpdateMethod::Metropolis,
            ..config(1.0, true)
        })
        .unwrap();
        metropolis.hot_start();
        assert_abs_diff_eq!(mean_plaquette(&mut metropolis, 40, 20), 1.0 / 18.0, epsilon = 0.02);
        let rate = metropolis.acceptance_rate();
        assert!(rate > 0.0 && rate < 1.0);
    }

    #[test]
    fn weak_coupling_plaquette() {
        let mut lattice = GaugeLattice::new(config(6.0, true)).unwrap();
        let p = mean_plaquette(&mut lattice, 30, 20);
        assert!((0.5..0.7).contains(&p), "plaquette {p}");
        assert!(lattice.max_unitarity_deviation() < 1e-8);
    }

    #[test]
    fn unparallelisable_geometry_sweeps_sequentially() {
        // three blocks along each axis
        let odd_blocks = LatticeConfig {
            spatial_extent: 6,
            temporal_extent: 6,
            ..config(5.5, true)
        };
        // chunk narrower than the rectangle's reach
        let thin_chunks = LatticeConfig {
            spatial_extent: 4,
            temporal_extent: 8,
            action: ActionKind::Rectangle,
            chunk_size: 1,
            ..config(5.5, true)
        };
        for cfg in [odd_blocks, thin_chunks] {
            let mut lattice = GaugeLattice::new(cfg).unwrap();
            assert!(!lattice.concurrent_blocks());
            let mut twin = lattice.clone();
            for _ in 0..2 {
                lattice.update();
                twin.schwarz_update(1);
            }
            assert_eq!(lattice.links(), twin.links());
            assert!(lattice.av_plaquette() < 1.0);
            assert_eq!(lattice.sweep_stats().proposals, 2 * lattice.geometry().n_links as u64);
            assert!(lattice.max_unitarity_deviation() < 1e-8);
        }
        assert!(GaugeLattice::new(config(5.5, true)).unwrap().concurrent_blocks());
        assert!(!GaugeLattice::new(config(5.5, false)).unwrap().concurrent_blocks());
    }

    #[test]
    fn twisted_action_falls_back_to_metropolis_without_staples() {
        let mut lattice = GaugeLattice::new(LatticeConfig {
            action: ActionKind::TwistedRectangle,
            update_method: UpdateMethod::Heatbath,
            temporal_extent: 8,
            ..config(5.0, true)
        })
        .unwrap();
        assert_eq!(lattice.update_method(), UpdateMethod::MetropolisNoStaples);
        lattice.update();
        assert!(lattice.av_plaquette() < 1.0);
        assert!(lattice.av_twisted_rectangle() < 1.0);
        assert!(lattice.max_unitarity_deviation() < 1e-8);
    }

    #[test]
    fn non_dividing_chunk_is_rejected() {
        let err = GaugeLattice::new(LatticeConfig {
            chunk_size: 3,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, GaugeError::GeometryMismatch(_)));
        assert!(matches!(
            GaugeLattice::new(LatticeConfig {
                beta: -1.0,
                ..Default::default()
            }),
            Err(GaugeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn clone_replicates_and_reseeded_diverges() {
        let mut a = GaugeLattice::new(config(5.5, true)).unwrap();
        a.update();
        let mut b = a.clone();
        let mut c = a.reseeded(99);
        for l in [&mut a, &mut b, &mut c] {
            l.update();
        }
        assert_eq!(a.links(), b.links());
        assert_ne!(a.links(), c.links());
        assert_eq!(c.seed(), 99);
    }

    #[test]
    fn link_access_is_checked() {
        let mut lattice = GaugeLattice::new(config(5.5, false)).unwrap();
        let n = lattice.geometry().n_links;
        assert!(matches!(
            lattice.link(n),
            Err(GaugeError::IndexOutOfRange { index, .. }) if index == n
        ));
        assert!(lattice.update_link(n).is_err());
        assert!(lattice.update_link(3).unwrap());
        assert!(lattice.plaquette([0; 4], 0, 4).is_err());

        let coord = LinkCoord::new(1, 2, 3, 0, 2).unwrap();
        let scaled = CMatrix3::identity() * nalgebra::Complex::new(0.5, 0.0);
        lattice.set_link(lattice.geometry().link_at(coord), scaled).unwrap();
        assert_eq!(lattice.link_at(coord), scaled);
    }

    #[test]
    fn auto_reunitarize_keeps_links_unitary() {
        let mut lattice = GaugeLattice::new(LatticeConfig {
            reunitarize_interval: 1,
            ..config(5.5, true)
        })
        .unwrap();
        lattice.set_link(0, CMatrix3::identity() * nalgebra::Complex::new(1.1, 0.0)).unwrap();
        lattice.update();
        assert!(lattice.max_unitarity_deviation() < 1e-10);
    }
}
