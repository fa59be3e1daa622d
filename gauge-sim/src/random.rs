use crate::su3::{embed, su2_from_coefficients, CMatrix2, CMatrix3, SUBGROUPS};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::f64::consts::PI;

/// Matrices generated per pool; each is stored next to its adjoint.
pub const POOL_SIZE: usize = 200;

/// Spread of the near-identity SU(2) factors composed into pool matrices.
pub const POOL_SPREAD: f64 = 0.24;

/// Heatbath rejection loops give up after this many attempts.
const MAX_HEATBATH_ATTEMPTS: usize = 10_000;

/// Weightings below this sample from the Haar measure.
const ALPHA_EPS: f64 = 1e-12;

/// Read-only pool of SU(3) Metropolis proposals.
///
/// Entry `2k + 1` is the adjoint of entry `2k`, so drawing uniformly keeps
/// proposals symmetric.
#[derive(Debug, Clone)]
pub struct RandomSu3Pool {
    matrices: Vec<CMatrix3>,
}

impl RandomSu3Pool {
    /// Deterministic pool for a given seed.
    pub fn generate(seed: u64) -> Self {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        Self::generate_with(&mut rng, POOL_SIZE, POOL_SPREAD)
    }

    pub fn generate_with<R: Rng>(rng: &mut R, n: usize, spread: f64) -> Self {
        let mut matrices = Vec::with_capacity(2 * n);
        for _ in 0..n {
            let mut m = CMatrix3::identity();
            for (i, j) in SUBGROUPS {
                m = embed(&random_su2_near_identity(rng, spread), i, j) * m;
            }
            matrices.push(m);
            matrices.push(m.adjoint());
        }
        Self { matrices }
    }

    #[inline]
    pub fn draw<R: Rng>(&self, rng: &mut R) -> &CMatrix3 {
        &self.matrices[rng.gen_range(0..self.matrices.len())]
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CMatrix3> {
        self.matrices.iter()
    }
}

/// Uniformly distributed unit 3-vector.
fn random_direction<R: Rng>(rng: &mut R) -> [f64; 3] {
    let cos_theta: f64 = rng.gen_range(-1.0..=1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.gen::<f64>();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta]
}

/// SU(2) element within `spread` of `±1`: `x0 = sign(r0) sqrt(1 - ε²)`,
/// `x⃗ = ε r̂`.
pub fn random_su2_near_identity<R: Rng>(rng: &mut R, spread: f64) -> CMatrix2 {
    let r0: f64 = rng.gen::<f64>() - 0.5;
    let x0 = r0.signum() * (1.0 - spread * spread).sqrt();
    let n = random_direction(rng);
    su2_from_coefficients([x0, spread * n[0], spread * n[1], spread * n[2]])
}

/// Random SU(3) matrix for hot starts: a product of Haar-random SU(2)
/// rotations, one in each subgroup.
pub fn random_su3<R: Rng>(rng: &mut R) -> CMatrix3 {
    SUBGROUPS
        .iter()
        .fold(CMatrix3::identity(), |m, &(i, j)| embed(&random_su2_haar(rng), i, j) * m)
}

/// Quaternion coefficients distributed as `sqrt(1 - x0²) exp(alpha x0) dx0`
/// with a uniformly random direction for `(x1, x2, x3)`.
///
/// Large weightings use Kennedy-Pendleton, small ones Creutz's method, and a
/// vanishing weighting samples the Haar measure.
pub fn heatbath_su2_coefficients<R: Rng>(rng: &mut R, alpha: f64) -> [f64; 4] {
    let x0 = if alpha > 2.0 {
        kennedy_pendleton(rng, alpha)
    } else if alpha > ALPHA_EPS {
        creutz(rng, alpha)
    } else {
        haar_x0(rng)
    };
    let r = (1.0 - x0 * x0).max(0.0).sqrt();
    let n = random_direction(rng);
    [x0, r * n[0], r * n[1], r * n[2]]
}

/// SU(2) matrix sampled from the heatbath distribution with weighting `alpha`.
pub fn sample_heatbath_su2<R: Rng>(rng: &mut R, alpha: f64) -> CMatrix2 {
    su2_from_coefficients(heatbath_su2_coefficients(rng, alpha))
}

/// Haar-random SU(2) matrix.
pub fn random_su2_haar<R: Rng>(rng: &mut R) -> CMatrix2 {
    sample_heatbath_su2(rng, 0.0)
}

fn kennedy_pendleton<R: Rng>(rng: &mut R, alpha: f64) -> f64 {
    for _ in 0..MAX_HEATBATH_ATTEMPTS {
        let r1 = 1.0 - rng.gen::<f64>();
        let r2 = rng.gen::<f64>();
        let r3 = 1.0 - rng.gen::<f64>();
        let c = (2.0 * PI * r2).cos();
        let lambda2 = -(r1.ln() + c * c * r3.ln()) / (2.0 * alpha);
        let r4 = rng.gen::<f64>();
        if r4 * r4 <= 1.0 - lambda2 {
            return 1.0 - 2.0 * lambda2;
        }
    }
    rejection_exhausted(alpha)
}

fn creutz<R: Rng>(rng: &mut R, alpha: f64) -> f64 {
    let y_min = (-2.0 * alpha).exp();
    for _ in 0..MAX_HEATBATH_ATTEMPTS {
        let y = y_min + (1.0 - y_min) * (1.0 - rng.gen::<f64>());
        let x0 = (1.0 + y.ln() / alpha).clamp(-1.0, 1.0);
        if rng.gen::<f64>() <= (1.0 - x0 * x0).sqrt() {
            return x0;
        }
    }
    rejection_exhausted(alpha)
}

fn haar_x0<R: Rng>(rng: &mut R) -> f64 {
    for _ in 0..MAX_HEATBATH_ATTEMPTS {
        let x0: f64 = rng.gen_range(-1.0..=1.0);
        if rng.gen::<f64>() <= (1.0 - x0 * x0).sqrt() {
            return x0;
        }
    }
    rejection_exhausted(0.0)
}

fn rejection_exhausted(alpha: f64) -> ! {
    panic!("heatbath rejection sampling exceeded {MAX_HEATBATH_ATTEMPTS} attempts at alpha = {alpha}");
}
