use super::equilibration::EquilCheckpoint;

/// Autocorrelation and equilibration diagnostics of one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Normalized autocorrelation Γ(δ) of the plaquette, length `max_lag`.
    /// Empty if autocorrelation_max_lag is None.
    pub plaquette_autocorrelation: Vec<f64>,
    /// Integrated autocorrelation time of the plaquette, in measurements.
    pub plaquette_tau: Option<f64>,
    pub equil_checkpoints: Vec<EquilCheckpoint>,
}

/// Observables averaged over measured configurations (and replicas, after
/// [`SweepResult::aggregate`]).
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    /// ⟨P⟩, mean plaquette Re Tr/3.
    pub plaquette: f64,
    /// ⟨P²⟩.
    pub plaquette2: f64,
    /// Naive standard error of ⟨P⟩.
    pub plaquette_error: f64,
    /// ⟨R⟩, mean 2×1 rectangle Re Tr/3.
    pub rectangle: f64,
    /// ⟨L⟩, mean link Re Tr/3.
    pub mean_link: f64,
    /// Accepted fraction of proposals over the whole run.
    pub acceptance_rate: f64,
    pub n_measurements: usize,
    pub diagnostics: Diagnostics,
}

impl SweepResult {
    /// Average [`SweepResult`]s across independent replicas.
    ///
    /// Panics if `results` is empty.
    pub fn aggregate(results: &[Self]) -> Self {
        assert!(!results.is_empty(), "no results to aggregate");
        let n = results.len() as f64;
        let mean = |f: fn(&Self) -> f64| results.iter().map(f).sum::<f64>() / n;

        let ac_len = results[0].diagnostics.plaquette_autocorrelation.len();
        let mut autocorrelation = vec![0.0; ac_len];
        for r in results {
            for (a, &v) in autocorrelation
                .iter_mut()
                .zip(r.diagnostics.plaquette_autocorrelation.iter())
            {
                *a += v / n;
            }
        }

        let taus: Vec<f64> = results.iter().filter_map(|r| r.diagnostics.plaquette_tau).collect();
        let plaquette_tau = (!taus.is_empty()).then(|| taus.iter().sum::<f64>() / taus.len() as f64);

        // error of the replica mean, treating replicas as independent
        let plaquette_error = (results
            .iter()
            .map(|r| r.plaquette_error * r.plaquette_error)
            .sum::<f64>())
        .sqrt()
            / n;

        SweepResult {
            plaquette: mean(|r| r.plaquette),
            plaquette2: mean(|r| r.plaquette2),
            plaquette_error,
            rectangle: mean(|r| r.rectangle),
            mean_link: mean(|r| r.mean_link),
            acceptance_rate: mean(|r| r.acceptance_rate),
            n_measurements: results.iter().map(|r| r.n_measurements).sum(),
            diagnostics: Diagnostics {
                plaquette_autocorrelation: autocorrelation,
                plaquette_tau,
                // checkpoints are per-run trajectories and are not averaged
                equil_checkpoints: results[0].diagnostics.equil_checkpoints.clone(),
            },
        }
    }
}
