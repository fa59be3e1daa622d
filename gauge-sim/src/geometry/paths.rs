/// One link step of a lattice path.
///
/// A forward step multiplies by `U_dim(site)` and then moves; a backward step
/// moves first and multiplies by `U_dim(site)†`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub dim: usize,
    pub forward: bool,
}

impl Step {
    pub const fn fwd(dim: usize) -> Self {
        Self { dim, forward: true }
    }

    pub const fn back(dim: usize) -> Self {
        Self {
            dim,
            forward: false,
        }
    }

    /// Step along `dim` in the direction given by `sign`.
    pub const fn signed(dim: usize, sign: bool) -> Self {
        Self { dim, forward: sign }
    }

    pub const fn reversed(self) -> Self {
        Self {
            dim: self.dim,
            forward: !self.forward,
        }
    }
}

/// `n.abs()` steps along `dim`, forward for positive `n`.
pub fn straight(dim: usize, n: isize) -> Vec<Step> {
    vec![Step::signed(dim, n > 0); n.unsigned_abs()]
}

/// Elementary 1×1 loop in the `(mu, nu)` plane.
pub fn plaquette(mu: usize, nu: usize) -> Vec<Step> {
    vec![Step::fwd(mu), Step::fwd(nu), Step::back(mu), Step::back(nu)]
}

/// 2×1 loop, long along `mu`.
pub fn rectangle(mu: usize, nu: usize) -> Vec<Step> {
    vec![
        Step::fwd(mu),
        Step::fwd(mu),
        Step::fwd(nu),
        Step::back(mu),
        Step::back(mu),
        Step::back(nu),
    ]
}

/// Two adjacent plaquettes, long along `mu`, whose shared `nu` link is
/// traversed twice in the same direction.
pub fn twisted_rectangle(mu: usize, nu: usize) -> Vec<Step> {
    vec![
        Step::fwd(mu),
        Step::fwd(nu),
        Step::fwd(mu),
        Step::back(nu),
        Step::back(mu),
        Step::fwd(nu),
        Step::back(mu),
        Step::back(nu),
    ]
}

/// Closed `r × t` loop with extent `r` along spatial direction `dim` and `t`
/// along time.
pub fn wilson_loop(r: usize, t: usize, dim: usize) -> Vec<Step> {
    let (r, t) = (r as isize, t as isize);
    let mut path = straight(dim, r);
    path.extend(straight(0, t));
    path.extend(straight(dim, -r));
    path.extend(straight(0, -t));
    path
}
