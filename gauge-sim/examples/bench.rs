use std::sync::atomic::AtomicBool;
use std::time::Instant;

use gauge_sim::{run_replicas, ActionKind, GaugeLattice, LatticeConfig, RunConfig, UpdateMethod};

const S: usize = 8;
const T: usize = 16;
const BETA: f64 = 6.0;
const N_SWEEPS: usize = 20;
const N_REPLICAS: usize = 4;

fn time_sweeps(config: LatticeConfig) -> f64 {
    let mut lattice = GaugeLattice::new(config).unwrap();
    let t0 = Instant::now();
    for _ in 0..N_SWEEPS {
        lattice.update();
    }
    let elapsed = t0.elapsed().as_secs_f64();
    println!(
        "  plaquette {:.5}  acceptance {:.3}  |  {:.3} ms/sweep",
        lattice.av_plaquette(),
        lattice.acceptance_rate(),
        elapsed / N_SWEEPS as f64 * 1000.0
    );
    elapsed
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!(
        "Lattice: {}^3x{}  |  beta: {}  |  Sweeps: {}  |  Replicas: {}",
        S, T, BETA, N_SWEEPS, N_REPLICAS
    );
    println!("{}", "-".repeat(70));

    for (action, method) in [
        (ActionKind::Wilson, UpdateMethod::Heatbath),
        (ActionKind::Rectangle, UpdateMethod::Heatbath),
        (ActionKind::TwistedRectangle, UpdateMethod::MetropolisNoStaples),
    ] {
        for parallel in [true, false] {
            println!(
                "{} / {} / {}",
                action.name(),
                method.name(),
                if parallel { "parallel" } else { "serial" }
            );
            time_sweeps(LatticeConfig {
                spatial_extent: S,
                temporal_extent: T,
                beta: BETA,
                action,
                update_method: method,
                parallel,
                chunk_size: 2,
                seed: Some(42),
                ..Default::default()
            });
        }
    }

    println!("{}", "-".repeat(70));
    let base = GaugeLattice::new(LatticeConfig {
        spatial_extent: S,
        temporal_extent: T,
        beta: BETA,
        chunk_size: 2,
        seed: Some(7),
        ..Default::default()
    })
    .unwrap();
    let mut replicas: Vec<_> = (0..N_REPLICAS as u64).map(|i| base.reseeded(100 + i)).collect();
    let config = RunConfig {
        n_sweeps: N_SWEEPS,
        warmup_sweeps: N_SWEEPS / 2,
        measure_interval: 1,
        autocorrelation_max_lag: Some(4),
        equilibration_diagnostic: false,
    };
    let interrupted = AtomicBool::new(false);
    let t0 = Instant::now();
    let result = run_replicas(&mut replicas, &config, &interrupted, &|| {}).unwrap();
    let elapsed = t0.elapsed().as_secs_f64();
    println!(
        "replicas: plaquette {:.5} +- {:.5}  tau {:?}  |  {:.3} s",
        result.plaquette, result.plaquette_error, result.diagnostics.plaquette_tau, elapsed
    );
}
