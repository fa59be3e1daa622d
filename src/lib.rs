use std::sync::atomic::{AtomicBool, Ordering};

use gauge_sim::config::{ActionKind, LatticeConfig, RunConfig, UpdateMethod};
use gauge_sim::geometry::LinkCoord;
use gauge_sim::observables::DEFAULT_SMEARING_PARAMETER;
use gauge_sim::su3::CMatrix3;
use gauge_sim::{run_sweep_loop, GaugeError, GaugeLattice};
use indicatif::{ProgressBar, ProgressStyle};
use numpy::ndarray::{Array1, Array2};
use numpy::{Complex64, IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::{PyIndexError, PyKeyboardInterrupt, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn to_py_err(e: GaugeError) -> PyErr {
    match e {
        GaugeError::IndexOutOfRange { .. } => PyIndexError::new_err(e.to_string()),
        GaugeError::Interrupted => PyKeyboardInterrupt::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn progress_bar(n: usize, msg: &'static str) -> PyResult<ProgressBar> {
    let pb = ProgressBar::new(n as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:40}] {pos}/{len} [{elapsed_precise} < {eta_precise}, {per_sec}]",
        )
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))?
        .progress_chars("=> "),
    );
    pb.set_message(msg);
    Ok(pb)
}

/// Tick the bar and turn a pending Ctrl-C into an interrupt request.
fn tick(pb: &ProgressBar, interrupted: &AtomicBool) {
    pb.inc(1);
    if Python::with_gil(|py| py.check_signals()).is_err() {
        interrupted.store(true, Ordering::Relaxed);
    }
}

/// Action or update method given by name or by legacy integer code.
#[derive(FromPyObject)]
enum Selector {
    Code(i64),
    Name(String),
}

impl Selector {
    fn action(&self) -> ActionKind {
        match self {
            Self::Code(code) => ActionKind::from_code_or_default(*code),
            Self::Name(name) => ActionKind::from_selector(name),
        }
    }

    fn update_method(&self) -> UpdateMethod {
        match self {
            Self::Code(code) => UpdateMethod::from_code_or_default(*code),
            Self::Name(name) => UpdateMethod::from_selector(name),
        }
    }
}

#[pyclass]
struct Lattice {
    inner: GaugeLattice,
}

#[pymethods]
impl Lattice {
    /// Create a cold-start SU(3) lattice of shape T × S³.
    ///
    /// Arguments:
    ///   spatial_extent, temporal_extent: sites per spatial axis / along time
    ///   beta: inverse coupling
    ///   u0: tadpole factor
    ///   action: "wilson", "rectangle" or "twisted_rectangle", or code 0-2
    ///     (default "wilson")
    ///   n_correlations: sweeps between configurations returned by next_config
    ///   update_method: "heatbath", "metropolis" or "metropolis_no_staples",
    ///     or code 0-2 (default "heatbath")
    ///   parallel: block-parallel sweeps
    ///   chunk_size: edge length of the update blocks; must divide both extents
    ///   rand_seed: master seed (drawn from OS entropy if None)
    ///   anisotropy: bare anisotropy ξ
    ///   reunitarize_interval: sweeps between automatic reunitarisations (0 = off)
    #[new]
    #[pyo3(signature = (spatial_extent=4, temporal_extent=8, beta=5.5, u0=1.0, action=None, n_correlations=50, update_method=None, parallel=true, chunk_size=4, rand_seed=None, anisotropy=1.0, reunitarize_interval=0))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        spatial_extent: usize,
        temporal_extent: usize,
        beta: f64,
        u0: f64,
        action: Option<Selector>,
        n_correlations: usize,
        update_method: Option<Selector>,
        parallel: bool,
        chunk_size: usize,
        rand_seed: Option<u64>,
        anisotropy: f64,
        reunitarize_interval: usize,
    ) -> PyResult<Self> {
        let config = LatticeConfig {
            spatial_extent,
            temporal_extent,
            beta,
            u0,
            anisotropy,
            action: action.map(|a| a.action()).unwrap_or_default(),
            update_method: update_method.map(|m| m.update_method()).unwrap_or_default(),
            n_correlations,
            parallel,
            chunk_size,
            seed: rand_seed,
            reunitarize_interval,
        };
        let inner = GaugeLattice::new(config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Run `n_sweeps` updates with a progress bar. Ctrl-C stops between sweeps.
    fn thermalize(&mut self, py: Python<'_>, n_sweeps: usize) -> PyResult<()> {
        let pb = progress_bar(n_sweeps, "thermalizing")?;
        let interrupted = AtomicBool::new(false);
        let inner = &mut self.inner;
        let done = py.allow_threads(|| {
            for _ in 0..n_sweeps {
                if interrupted.load(Ordering::Relaxed) {
                    return false;
                }
                inner.update();
                tick(&pb, &interrupted);
            }
            true
        });
        pb.finish();
        if !done {
            return Err(to_py_err(GaugeError::Interrupted));
        }
        Ok(())
    }

    /// Advance `n_correlations` sweeps.
    fn next_config(&mut self, py: Python<'_>) {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.next_config());
    }

    fn update(&mut self, py: Python<'_>) {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.update());
    }

    #[pyo3(signature = (n_updates=1))]
    fn schwarz_update(&mut self, py: Python<'_>, n_updates: usize) {
        let inner = &mut self.inner;
        py.allow_threads(|| inner.schwarz_update(n_updates));
    }

    fn update_link(&mut self, index: usize) -> PyResult<bool> {
        self.inner.update_link(index).map_err(to_py_err)
    }

    fn reunitarize(&mut self) {
        self.inner.reunitarize();
    }

    fn hot_start(&mut self) {
        self.inner.hot_start();
    }

    fn cold_start(&mut self) {
        self.inner.cold_start();
    }

    /// Link U_mu(t, x, y, z) as a 3×3 complex128 array.
    fn get_link<'py>(
        &self,
        py: Python<'py>,
        t: isize,
        x: isize,
        y: isize,
        z: isize,
        mu: usize,
    ) -> PyResult<Bound<'py, PyArray2<Complex64>>> {
        let coord = LinkCoord::new(t, x, y, z, mu).map_err(to_py_err)?;
        let m = self.inner.link_at(coord);
        Ok(Array2::from_shape_fn((3, 3), |(i, j)| m[(i, j)]).into_pyarray(py))
    }

    #[allow(clippy::too_many_arguments)]
    fn set_link(
        &mut self,
        t: isize,
        x: isize,
        y: isize,
        z: isize,
        mu: usize,
        matrix: PyReadonlyArray2<Complex64>,
    ) -> PyResult<()> {
        let coord = LinkCoord::new(t, x, y, z, mu).map_err(to_py_err)?;
        let view = matrix.as_array();
        if view.shape() != [3, 3] {
            return Err(PyValueError::new_err(format!(
                "expected a 3x3 matrix, got shape {:?}",
                view.shape()
            )));
        }
        let m = CMatrix3::from_fn(|i, j| view[[i, j]]);
        let index = self.inner.geometry().link_at(coord);
        self.inner.set_link(index, m).map_err(to_py_err)
    }

    fn plaquette(&self, site: [isize; 4], mu: usize, nu: usize) -> PyResult<f64> {
        self.inner.plaquette(site, mu, nu).map_err(to_py_err)
    }

    fn rectangle(&self, site: [isize; 4], mu: usize, nu: usize) -> PyResult<f64> {
        self.inner.rectangle(site, mu, nu).map_err(to_py_err)
    }

    fn twisted_rectangle(&self, site: [isize; 4], mu: usize, nu: usize) -> PyResult<f64> {
        self.inner.twisted_rectangle(site, mu, nu).map_err(to_py_err)
    }

    #[pyo3(signature = (corner1, corner2, n_smears=0, smearing_parameter=DEFAULT_SMEARING_PARAMETER))]
    fn wilson_loop(&self, corner1: [isize; 4], corner2: [isize; 4], n_smears: usize, smearing_parameter: f64) -> f64 {
        self.inner.wilson_loop(corner1, corner2, n_smears, smearing_parameter)
    }

    fn av_plaquette(&self) -> f64 {
        self.inner.av_plaquette()
    }

    fn av_rectangle(&self) -> f64 {
        self.inner.av_rectangle()
    }

    fn av_twisted_rectangle(&self) -> f64 {
        self.inner.av_twisted_rectangle()
    }

    #[pyo3(signature = (r, t, n_smears=0, smearing_parameter=DEFAULT_SMEARING_PARAMETER))]
    fn av_wilson_loop(&self, r: usize, t: usize, n_smears: usize, smearing_parameter: f64) -> f64 {
        self.inner.av_wilson_loop(r, t, n_smears, smearing_parameter)
    }

    fn mean_link(&self) -> f64 {
        self.inner.mean_link()
    }

    fn total_action(&self) -> f64 {
        self.inner.total_action()
    }

    fn max_unitarity_deviation(&self) -> f64 {
        self.inner.max_unitarity_deviation()
    }

    fn acceptance_rate(&self) -> f64 {
        self.inner.acceptance_rate()
    }

    #[getter]
    fn beta(&self) -> f64 {
        self.inner.action().beta()
    }

    #[getter]
    fn u0(&self) -> f64 {
        self.inner.action().u0()
    }

    #[getter]
    fn spatial_extent(&self) -> usize {
        self.inner.geometry().spatial_extent
    }

    #[getter]
    fn temporal_extent(&self) -> usize {
        self.inner.geometry().temporal_extent
    }

    #[getter]
    fn n_links(&self) -> usize {
        self.inner.geometry().n_links
    }

    #[getter]
    fn action(&self) -> &'static str {
        self.inner.action().kind().name()
    }

    #[getter]
    fn update_method(&self) -> &'static str {
        self.inner.update_method().name()
    }

    #[getter]
    fn seed(&self) -> u64 {
        self.inner.seed()
    }

    /// Run warmup + measurement sweeps.
    ///
    /// Returns: dict with keys "plaquette", "plaquette2", "plaquette_error",
    ///   "rectangle", "mean_link", "acceptance_rate", "n_measurements", and
    ///   when requested "plaquette_autocorrelation", "plaquette_tau",
    ///   "equil_checkpoints" (list of (sweep, plaquette, rectangle)).
    #[pyo3(signature = (n_sweeps, warmup_ratio=0.25, measure_interval=1, autocorrelation_max_lag=None, equilibration_diagnostic=false))]
    fn sample<'py>(
        &mut self,
        py: Python<'py>,
        n_sweeps: usize,
        warmup_ratio: f64,
        measure_interval: usize,
        autocorrelation_max_lag: Option<usize>,
        equilibration_diagnostic: bool,
    ) -> PyResult<Bound<'py, PyDict>> {
        let config = RunConfig {
            n_sweeps,
            warmup_sweeps: (n_sweeps as f64 * warmup_ratio).round() as usize,
            measure_interval,
            autocorrelation_max_lag,
            equilibration_diagnostic,
        };

        let pb = progress_bar(n_sweeps, "sweeps")?;
        let interrupted = AtomicBool::new(false);
        let inner = &mut self.inner;
        let result = py
            .allow_threads(|| run_sweep_loop(inner, &config, &interrupted, &|| tick(&pb, &interrupted)))
            .map_err(to_py_err);
        pb.finish();
        let result = result?;

        let dict = PyDict::new(py);
        dict.set_item("plaquette", result.plaquette)?;
        dict.set_item("plaquette2", result.plaquette2)?;
        dict.set_item("plaquette_error", result.plaquette_error)?;
        dict.set_item("rectangle", result.rectangle)?;
        dict.set_item("mean_link", result.mean_link)?;
        dict.set_item("acceptance_rate", result.acceptance_rate)?;
        dict.set_item("n_measurements", result.n_measurements)?;

        let diag = result.diagnostics;
        if autocorrelation_max_lag.is_some() {
            dict.set_item(
                "plaquette_autocorrelation",
                Array1::from(diag.plaquette_autocorrelation).into_pyarray(py),
            )?;
            dict.set_item("plaquette_tau", diag.plaquette_tau)?;
        }
        if equilibration_diagnostic {
            let checkpoints: Vec<(usize, f64, f64)> = diag
                .equil_checkpoints
                .iter()
                .map(|c| (c.sweep, c.plaquette_avg, c.rectangle_avg))
                .collect();
            dict.set_item("equil_checkpoints", checkpoints)?;
        }

        Ok(dict)
    }
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Lattice>()?;
    Ok(())
}
