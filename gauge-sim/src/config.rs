use tracing::warn;
use validator::{Validate, ValidationError};

/// Gauge action formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    #[default]
    Wilson,
    /// Tree-level Symanzik improved: plaquettes plus 2×1 rectangles.
    Rectangle,
    /// Plaquettes plus twisted rectangles. Has no linear staple.
    TwistedRectangle,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wilson => "wilson",
            Self::Rectangle => "rectangle",
            Self::TwistedRectangle => "twisted_rectangle",
        }
    }

    /// Integer codes used by older drivers: 0 wilson, 1 rectangle, 2 twisted.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Wilson),
            1 => Some(Self::Rectangle),
            2 => Some(Self::TwistedRectangle),
            _ => None,
        }
    }

    /// Lenient parse for driver input: unknown selectors fall back to Wilson.
    pub fn from_selector(s: &str) -> Self {
        Self::try_from(s).unwrap_or_else(|e| {
            warn!("{e}; falling back to the wilson action");
            Self::Wilson
        })
    }

    pub fn from_code_or_default(code: i64) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            warn!("unknown action code {code}; falling back to the wilson action");
            Self::Wilson
        })
    }
}

impl TryFrom<&str> for ActionKind {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "wilson" => Ok(Self::Wilson),
            "rectangle" | "rectangle_improved" => Ok(Self::Rectangle),
            "twisted_rectangle" | "twisted_rectangle_improved" => Ok(Self::TwistedRectangle),
            _ => Err(format!(
                "unknown action '{s}', expected 'wilson', 'rectangle' or 'twisted_rectangle'"
            )),
        }
    }
}

/// Single-link update algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMethod {
    #[default]
    Heatbath,
    /// Metropolis with the acceptance computed from a cached staple.
    Metropolis,
    /// Metropolis with the acceptance computed from the local action.
    MetropolisNoStaples,
}

impl UpdateMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Heatbath => "heatbath",
            Self::Metropolis => "metropolis",
            Self::MetropolisNoStaples => "metropolis_no_staples",
        }
    }

    /// Integer codes used by older drivers: 0 heatbath, 1 metropolis,
    /// 2 metropolis without staples.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Heatbath),
            1 => Some(Self::Metropolis),
            2 => Some(Self::MetropolisNoStaples),
            _ => None,
        }
    }

    /// Lenient parse for driver input: unknown selectors fall back to heatbath.
    pub fn from_selector(s: &str) -> Self {
        Self::try_from(s).unwrap_or_else(|e| {
            warn!("{e}; falling back to heatbath updates");
            Self::Heatbath
        })
    }

    pub fn from_code_or_default(code: i64) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            warn!("unknown update method code {code}; falling back to heatbath updates");
            Self::Heatbath
        })
    }

    pub fn uses_staples(&self) -> bool {
        !matches!(self, Self::MetropolisNoStaples)
    }
}

impl TryFrom<&str> for UpdateMethod {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "heatbath" => Ok(Self::Heatbath),
            "metropolis" => Ok(Self::Metropolis),
            "metropolis_no_staples" => Ok(Self::MetropolisNoStaples),
            _ => Err(format!(
                "unknown update_method '{s}', expected 'heatbath', 'metropolis' or 'metropolis_no_staples'"
            )),
        }
    }
}

/// Pick the update method actually run for `action`.
///
/// The twisted-rectangle action has no linear staple, so both staple-based
/// methods are replaced by Metropolis without staples.
pub fn resolve_update_method(action: ActionKind, requested: UpdateMethod) -> UpdateMethod {
    if action == ActionKind::TwistedRectangle && requested.uses_staples() {
        warn!(
            "{} updates are not compatible with the twisted rectangle action, using metropolis_no_staples instead",
            requested.name()
        );
        return UpdateMethod::MetropolisNoStaples;
    }
    requested
}

fn validate_lattice_config(cfg: &LatticeConfig) -> Result<(), ValidationError> {
    if cfg.spatial_extent < 2 || cfg.temporal_extent < 2 {
        return Err(ValidationError::new("lattice extents must be >= 2"));
    }
    if !(cfg.beta > 0.0) {
        return Err(ValidationError::new("beta must be > 0"));
    }
    if !(cfg.u0 > 0.0) {
        return Err(ValidationError::new("u0 must be > 0"));
    }
    if !(cfg.anisotropy > 0.0) {
        return Err(ValidationError::new("anisotropy must be > 0"));
    }
    if cfg.chunk_size < 1 {
        return Err(ValidationError::new("chunk_size must be >= 1"));
    }
    if cfg.n_correlations < 1 {
        return Err(ValidationError::new("n_correlations must be >= 1"));
    }
    Ok(())
}

/// Everything needed to build a [`GaugeLattice`](crate::GaugeLattice).
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_lattice_config"))]
pub struct LatticeConfig {
    /// Sites along each spatial axis.
    pub spatial_extent: usize,
    /// Sites along the time axis.
    pub temporal_extent: usize,
    /// Inverse bare coupling.
    pub beta: f64,
    /// Tadpole improvement factor (mean link).
    pub u0: f64,
    /// Bare anisotropy ξ; weights temporal against spatial planes in the
    /// improved actions.
    pub anisotropy: f64,
    pub action: ActionKind,
    pub update_method: UpdateMethod,
    /// Sweeps between successive measured configurations.
    pub n_correlations: usize,
    /// Block-parallel sweeps when true, one global ordered pass otherwise.
    pub parallel: bool,
    /// Edge length of the hypercubic update blocks.
    pub chunk_size: usize,
    /// Master seed; drawn from OS entropy when `None`.
    pub seed: Option<u64>,
    /// Reunitarize the whole field every this many sweeps (0 disables).
    pub reunitarize_interval: usize,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            spatial_extent: 4,
            temporal_extent: 8,
            beta: 5.5,
            u0: 1.0,
            anisotropy: 1.0,
            action: ActionKind::Wilson,
            update_method: UpdateMethod::Heatbath,
            n_correlations: 50,
            parallel: true,
            chunk_size: 4,
            seed: None,
            reunitarize_interval: 0,
        }
    }
}

fn validate_run_config(cfg: &RunConfig) -> Result<(), ValidationError> {
    if cfg.n_sweeps < 1 {
        return Err(ValidationError::new("n_sweeps must be >= 1"));
    }
    if cfg.warmup_sweeps > cfg.n_sweeps {
        return Err(ValidationError::new("warmup_sweeps must be <= n_sweeps"));
    }
    if cfg.measure_interval < 1 {
        return Err(ValidationError::new("measure_interval must be >= 1"));
    }
    Ok(())
}

/// Warmup + measurement schedule for [`run_sweep_loop`](crate::run_sweep_loop).
#[derive(Debug, Clone, Validate)]
#[validate(schema(function = "validate_run_config"))]
pub struct RunConfig {
    pub n_sweeps: usize,
    pub warmup_sweeps: usize,
    /// Measure every this many sweeps after warmup.
    pub measure_interval: usize,
    pub autocorrelation_max_lag: Option<usize>,
    pub equilibration_diagnostic: bool,
}
