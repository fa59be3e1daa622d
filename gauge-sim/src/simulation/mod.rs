pub mod gauge_lattice;

pub use gauge_lattice::GaugeLattice;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::RunConfig;
use crate::error::{GaugeError, Result};
use crate::statistics::{sokal_tau, AutocorrAccum, Diagnostics, EquilDiagnosticAccum, Statistics, SweepResult};
use rayon::prelude::*;
use tracing::debug;
use validator::Validate;

/// Run warmup + measurement sweeps on one [`GaugeLattice`].
///
/// Each sweep consists of:
/// 1. A full lattice update ([`GaugeLattice::update`])
/// 2. Equilibration bookkeeping (when `equilibration_diagnostic` is set)
/// 3. Measurement, after `warmup_sweeps` and every `measure_interval` sweeps
///
/// `on_sweep` is called once per sweep (useful for progress bars). The
/// `interrupted` flag is checked between sweeps.
pub fn run_sweep_loop(
    lattice: &mut GaugeLattice,
    config: &RunConfig,
    interrupted: &AtomicBool,
    on_sweep: &(dyn Fn() + Sync),
) -> Result<SweepResult> {
    config.validate()?;

    let n_sweeps = config.n_sweeps;
    let warmup_sweeps = config.warmup_sweeps;
    let stats_before = lattice.sweep_stats();

    let mut plaquette_stat = Statistics::new();
    let mut plaquette2_stat = Statistics::new();
    let mut rectangle_stat = Statistics::new();
    let mut link_stat = Statistics::new();

    let n_measurements = (n_sweeps - warmup_sweeps).div_ceil(config.measure_interval);
    let ac_max_lag = config
        .autocorrelation_max_lag
        .map(|k| k.min(n_measurements / 4).max(1));
    let mut plaquette_accum = ac_max_lag.map(AutocorrAccum::new);
    let mut equil_accum = config
        .equilibration_diagnostic
        .then(|| EquilDiagnosticAccum::new(n_sweeps));

    for sweep_id in 0..n_sweeps {
        if interrupted.load(Ordering::Relaxed) {
            return Err(GaugeError::Interrupted);
        }
        on_sweep();
        let record = sweep_id >= warmup_sweeps && (sweep_id - warmup_sweeps) % config.measure_interval == 0;

        lattice.update();

        if !record && equil_accum.is_none() {
            continue;
        }

        let plaquette = lattice.av_plaquette();
        let rectangle = lattice.av_rectangle();

        if let Some(acc) = equil_accum.as_mut() {
            acc.push(plaquette, rectangle);
        }

        if record {
            plaquette_stat.update(plaquette);
            plaquette2_stat.update(plaquette * plaquette);
            rectangle_stat.update(rectangle);
            link_stat.update(lattice.mean_link());
            if let Some(acc) = plaquette_accum.as_mut() {
                acc.push(plaquette);
            }
        }
    }

    let plaquette_autocorrelation = plaquette_accum.map(|acc| acc.finish()).unwrap_or_default();
    let plaquette_tau = (!plaquette_autocorrelation.is_empty()).then(|| sokal_tau(&plaquette_autocorrelation));
    let equil_checkpoints = equil_accum.map(|acc| acc.finish()).unwrap_or_default();

    let stats = lattice.sweep_stats();
    let proposals = stats.proposals - stats_before.proposals;
    let accepted = stats.accepted - stats_before.accepted;

    debug!(
        measurements = plaquette_stat.count,
        plaquette = plaquette_stat.average(),
        "sweep loop finished"
    );

    Ok(SweepResult {
        plaquette: plaquette_stat.average(),
        plaquette2: plaquette2_stat.average(),
        plaquette_error: plaquette_stat.std_error(),
        rectangle: rectangle_stat.average(),
        mean_link: link_stat.average(),
        acceptance_rate: if proposals == 0 {
            0.0
        } else {
            accepted as f64 / proposals as f64
        },
        n_measurements: plaquette_stat.count,
        diagnostics: Diagnostics {
            plaquette_autocorrelation,
            plaquette_tau,
            equil_checkpoints,
        },
    })
}

/// Run the sweep loop in parallel over independent replicas.
///
/// Each replica is processed by [`run_sweep_loop`], then results are
/// averaged via [`SweepResult::aggregate`]. For a single replica the call is
/// made directly, skipping rayon thread-pool overhead.
pub fn run_replicas(
    replicas: &mut [GaugeLattice],
    config: &RunConfig,
    interrupted: &AtomicBool,
    on_sweep: &(dyn Fn() + Sync),
) -> Result<SweepResult> {
    if replicas.is_empty() {
        return Err(GaugeError::InvalidConfig("no replicas to run".to_string()));
    }
    if replicas.len() == 1 {
        return run_sweep_loop(&mut replicas[0], config, interrupted, on_sweep);
    }

    let results: Vec<Result<SweepResult>> = replicas
        .par_iter_mut()
        .map(|lattice| run_sweep_loop(lattice, config, interrupted, on_sweep))
        .collect();

    let results: Vec<SweepResult> = results.into_iter().collect::<Result<Vec<_>>>()?;
    Ok(SweepResult::aggregate(&results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LatticeConfig, UpdateMethod};
    use std::ops::Range;
    use std::sync::atomic::AtomicUsize;

    fn lattice(seed: u64) -> GaugeLattice {
        GaugeLattice::new(LatticeConfig {
            spatial_extent: 4,
            temporal_extent: 4,
            beta: 6.0,
            chunk_size: 2,
            update_method: UpdateMethod::Metropolis,
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap()
    }

    fn run_config() -> RunConfig {
        RunConfig {
            n_sweeps: 40,
            warmup_sweeps: 20,
            measure_interval: 2,
            autocorrelation_max_lag: Some(4),
            equilibration_diagnostic: true,
        }
    }

    #[test]
    fn loop_measures_after_warmup() {
        let mut l = lattice(3);
        let calls = AtomicUsize::new(0);
        let res = run_sweep_loop(&mut l, &run_config(), &AtomicBool::new(false), &|| {
            calls.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 40);
        assert_eq!(res.n_measurements, 10);
        assert!(res.plaquette > 0.4 && res.plaquette < 1.0);
        assert!(res.plaquette2 >= res.plaquette * res.plaquette - 1e-12);
        assert!(res.rectangle < res.plaquette);
        assert!(res.acceptance_rate > 0.0 && res.acceptance_rate < 1.0);
        assert_eq!(res.diagnostics.plaquette_autocorrelation.len(), 2);
        assert!(res.diagnostics.plaquette_tau.is_some());
        assert_eq!(res.diagnostics.equil_checkpoints.len(), 1);
        assert_eq!(res.diagnostics.equil_checkpoints[0].sweep, 40);
    }

    #[test]
    fn interrupted_loop_stops() {
        let mut l = lattice(3);
        let res = run_sweep_loop(&mut l, &run_config(), &AtomicBool::new(true), &|| {});
        assert!(matches!(res, Err(GaugeError::Interrupted)));
    }

    #[test]
    fn invalid_run_config_is_rejected() {
        let mut l = lattice(3);
        let cfg = RunConfig {
            warmup_sweeps: 50,
            ..run_config()
        };
        let res = run_sweep_loop(&mut l, &cfg, &AtomicBool::new(false), &|| {});
        assert!(matches!(res, Err(GaugeError::InvalidConfig(_))));
    }

    #[test]
    fn replicas_aggregate() {
        let base = lattice(5);
        let mut replicas: Vec<_> = (0..3).map(|i| base.reseeded(100 + i)).collect();
        let res = run_replicas(&mut replicas, &run_config(), &AtomicBool::new(false), &|| {}).unwrap();
        assert_eq!(res.n_measurements, 30);
        assert!(res.plaquette > 0.4 && res.plaquette < 1.0);
        assert_ne!(replicas[0].links(), replicas[1].links());
        assert!(run_replicas(&mut [], &run_config(), &AtomicBool::new(false), &|| {}).is_err());
    }

    fn heatbath_lattice(parallel: bool) -> GaugeLattice {
        GaugeLattice::new(LatticeConfig {
            spatial_extent: 4,
            temporal_extent: 4,
            beta: 6.0,
            chunk_size: 2,
            parallel,
            seed: Some(17),
            ..Default::default()
        })
        .unwrap()
    }

    fn ensemble(base: &GaugeLattice, seeds: Range<u64>, n_sweeps: usize, warmup_sweeps: usize) -> SweepResult {
        let mut replicas: Vec<_> = seeds.map(|s| base.reseeded(s)).collect();
        let cfg = RunConfig {
            n_sweeps,
            warmup_sweeps,
            measure_interval: 1,
            autocorrelation_max_lag: Some(8),
            equilibration_diagnostic: false,
        };
        run_replicas(&mut replicas, &cfg, &AtomicBool::new(false), &|| {}).unwrap()
    }

    /// Replica means must agree within five combined standard errors,
    /// inflated by the integrated autocorrelation time, or within `floor`.
    fn assert_same_equilibrium(a: &SweepResult, b: &SweepResult, floor: f64) {
        let tau = [a, b]
            .iter()
            .filter_map(|r| r.diagnostics.plaquette_tau)
            .fold(0.5, f64::max);
        let sigma = (a.plaquette_error.powi(2) + b.plaquette_error.powi(2)).sqrt() * (2.0 * tau).sqrt();
        let diff = (a.plaquette - b.plaquette).abs();
        assert!(
            diff < (5.0 * sigma).max(floor),
            "plaquettes {} and {} differ by {diff}, sigma {sigma}",
            a.plaquette,
            b.plaquette
        );
    }

    #[test]
    fn parallel_and_serial_ensembles_agree() {
        let parallel = ensemble(&heatbath_lattice(true), 200..204, 70, 30);
        let serial = ensemble(&heatbath_lattice(false), 300..304, 70, 30);
        assert_eq!(parallel.n_measurements, 160);
        assert!(parallel.plaquette_error > 0.0 && serial.plaquette_error > 0.0);
        assert_same_equilibrium(&parallel, &serial, 0.008);
    }

    #[test]
    fn heatbath_hot_and_cold_starts_agree() {
        let cold = heatbath_lattice(true);
        let mut hot = heatbath_lattice(true);
        hot.hot_start();
        assert!(hot.av_plaquette() < 0.2);
        let cold = ensemble(&cold, 400..404, 90, 60);
        let hot = ensemble(&hot, 500..504, 90, 60);
        assert_same_equilibrium(&cold, &hot, 0.008);
    }

    #[test]
    fn update_methods_share_an_equilibrium() {
        let mut thermalized = heatbath_lattice(true);
        thermalized.thermalize(60);
        let reference = ensemble(&thermalized, 600..604, 50, 10);

        for (i, method) in [UpdateMethod::Metropolis, UpdateMethod::MetropolisNoStaples]
            .into_iter()
            .enumerate()
        {
            let mut base = GaugeLattice::new(LatticeConfig {
                update_method: method,
                ..thermalized.config().clone()
            })
            .unwrap();
            for (index, u) in thermalized.links().iter().enumerate() {
                base.set_link(index, *u).unwrap();
            }
            let start = 700 + 10 * i as u64;
            let res = ensemble(&base, start..start + 4, 50, 10);
            assert!(res.acceptance_rate > 0.0 && res.acceptance_rate < 1.0);
            assert_same_equilibrium(&reference, &res, 0.008);
        }
    }

    #[test]
    fn error_shrinks_with_more_measurements() {
        let mut base = heatbath_lattice(true);
        base.thermalize(30);
        let short = ensemble(&base, 800..804, 10, 0);
        let long = ensemble(&base, 900..904, 80, 0);
        assert_eq!(short.n_measurements, 40);
        assert_eq!(long.n_measurements, 320);
        assert!(
            long.plaquette_error < short.plaquette_error,
            "{} vs {}",
            long.plaquette_error,
            short.plaquette_error
        );
    }
}
