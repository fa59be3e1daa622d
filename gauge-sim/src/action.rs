use crate::config::ActionKind;
use crate::field::LinkSource;
use crate::geometry::{paths, LatticeGeometry, Step, N_DIMS};
use crate::su3::{re_trace, CMatrix3};
use nalgebra::Complex;

/// Closed path from `x + mu` back to `x`, weighted.
#[derive(Debug, Clone)]
struct StaplePath {
    weight: f64,
    steps: Vec<Step>,
}

/// A twisted rectangle containing the link `(x, mu)`.
#[derive(Debug, Clone)]
struct TwistedTerm {
    weight: f64,
    /// Walk from `x` to the loop origin.
    to_origin: Vec<Step>,
    long: usize,
    short: usize,
    steps: Vec<Step>,
}

/// Anisotropy weights: 1 on the diagonal, `xi` for temporal planes, `1/xi`
/// for purely spatial ones.
pub fn anisotropy_table(xi: f64) -> [[f64; N_DIMS]; N_DIMS] {
    std::array::from_fn(|mu| {
        std::array::from_fn(|nu| {
            if mu == nu {
                1.0
            } else if mu == 0 || nu == 0 {
                xi
            } else {
                1.0 / xi
            }
        })
    })
}

/// A gauge action with per-link staples and local action.
///
/// The action is `S = -(beta/3) sum_loops w Re Tr(loop)`, and a link's
/// staple `A` is chosen so that the part of `S` linear in the link `U` is
/// `-(beta/3) Re Tr(U A)`. The twisted rectangle contains some links twice
/// and only contributes through [`local_action`](Self::local_action).
#[derive(Debug, Clone)]
pub struct Action {
    kind: ActionKind,
    beta: f64,
    u0: f64,
    /// Plaquette weight per plane.
    plaquette_weight: [[f64; N_DIMS]; N_DIMS],
    /// Rectangle or twisted-rectangle weight per plane, zero for Wilson.
    loop_weight: [[f64; N_DIMS]; N_DIMS],
    staples: [Vec<StaplePath>; N_DIMS],
    twisted: [Vec<TwistedTerm>; N_DIMS],
}

impl Action {
    pub fn new(kind: ActionKind, beta: f64, u0: f64, anisotropy: f64) -> Self {
        let c = anisotropy_table(anisotropy);
        let u4 = u0.powi(4);
        let (plaquette_weight, loop_weight) = match kind {
            ActionKind::Wilson => ([[1.0 / u4; N_DIMS]; N_DIMS], [[0.0; N_DIMS]; N_DIMS]),
            ActionKind::Rectangle => (
                c.map(|row| row.map(|v| 5.0 / 3.0 * v / u4)),
                c.map(|row| row.map(|v| -v / (12.0 * u0.powi(6)))),
            ),
            ActionKind::TwistedRectangle => (
                c.map(|row| row.map(|v| v / u4)),
                c.map(|row| row.map(|v| -v / (12.0 * u0.powi(8)))),
            ),
        };

        let staples = std::array::from_fn(|mu| {
            let mut out: Vec<StaplePath> = Vec::new();
            for nu in (0..N_DIMS).filter(|&nu| nu != mu) {
                for s in [true, false] {
                    let (fwd, back) = (Step::signed(nu, s), Step::signed(nu, !s));
                    out.push(StaplePath {
                        weight: plaquette_weight[mu][nu],
                        steps: vec![fwd, Step::back(mu), back],
                    });
                    if kind == ActionKind::Rectangle {
                        let w = loop_weight[mu][nu];
                        out.push(StaplePath {
                            weight: w,
                            steps: vec![Step::fwd(mu), fwd, Step::back(mu), Step::back(mu), back],
                        });
                        out.push(StaplePath {
                            weight: w,
                            steps: vec![fwd, Step::back(mu), Step::back(mu), back, Step::fwd(mu)],
                        });
                        out.push(StaplePath {
                            weight: w,
                            steps: vec![fwd, fwd, Step::back(mu), back, back],
                        });
                    }
                }
            }
            out
        });

        let twisted = std::array::from_fn(|mu| {
            let mut out: Vec<TwistedTerm> = Vec::new();
            if kind != ActionKind::TwistedRectangle {
                return out;
            }
            for nu in (0..N_DIMS).filter(|&nu| nu != mu) {
                let w = loop_weight[mu][nu];
                // long along mu: the link is one of the four mu links
                for to_origin in [
                    vec![],
                    vec![Step::back(mu)],
                    vec![Step::back(nu)],
                    vec![Step::back(mu), Step::back(nu)],
                ] {
                    out.push(TwistedTerm {
                        weight: w,
                        to_origin,
                        long: mu,
                        short: nu,
                        steps: paths::twisted_rectangle(mu, nu),
                    });
                }
                // long along nu: the link sits at the origin, the doubled
                // rung, or the top
                for to_origin in [vec![], vec![Step::back(nu)], vec![Step::back(nu), Step::back(nu)]] {
                    out.push(TwistedTerm {
                        weight: w,
                        to_origin,
                        long: nu,
                        short: mu,
                        steps: paths::twisted_rectangle(nu, mu),
                    });
                }
            }
            out
        });

        Self {
            kind,
            beta,
            u0,
            plaquette_weight,
            loop_weight,
            staples,
            twisted,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn u0(&self) -> f64 {
        self.u0
    }

    /// Whether [`staple`](Self::staple) captures the full link dependence.
    pub fn supports_staples(&self) -> bool {
        self.kind != ActionKind::TwistedRectangle
    }

    /// Largest distance, in sites along one axis, between an updated link's
    /// site and any site whose links its update reads.
    pub fn reach(&self) -> usize {
        match self.kind {
            ActionKind::Wilson => 1,
            ActionKind::Rectangle | ActionKind::TwistedRectangle => 2,
        }
    }

    /// Staple of `link`. For the twisted-rectangle action this is the
    /// plaquette part only.
    pub fn staple<L: LinkSource + ?Sized>(&self, geometry: &LatticeGeometry, links: &L, link: usize) -> CMatrix3 {
        let (site, mu) = (link / N_DIMS, link % N_DIMS);
        let start = geometry.neighbor_site(site, mu, true);
        let mut a = CMatrix3::zeros();
        for path in &self.staples[mu] {
            a += links.path_product(geometry, start, &path.steps) * Complex::new(path.weight, 0.0);
        }
        a
    }

    /// Sum of the action of every loop containing `link`.
    pub fn local_action<L: LinkSource + ?Sized>(&self, geometry: &LatticeGeometry, links: &L, link: usize) -> f64 {
        let u = links.link(link);
        let mut total = re_trace(&(u * self.staple(geometry, links, link)));

        let terms = &self.twisted[link % N_DIMS];
        if !terms.is_empty() {
            let site = link / N_DIMS;
            // small extents make some origins coincide; count each loop once
            let mut seen: Vec<(usize, usize, usize)> = Vec::with_capacity(terms.len());
            for term in terms {
                let origin = term
                    .to_origin
                    .iter()
                    .fold(site, |s, step| geometry.neighbor_site(s, step.dim, step.forward));
                let key = (origin, term.long, term.short);
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                total += term.weight * re_trace(&links.path_product(geometry, origin, &term.steps));
            }
        }
        -self.beta / 3.0 * total
    }

    /// Action of the whole configuration.
    pub fn total_action<L: LinkSource + ?Sized>(&self, geometry: &LatticeGeometry, links: &L) -> f64 {
        let mut total = 0.0;
        for site in 0..geometry.n_sites {
            for mu in 0..N_DIMS {
                for nu in 0..N_DIMS {
                    if nu == mu {
                        continue;
                    }
                    if mu < nu {
                        total += self.plaquette_weight[mu][nu]
                            * re_trace(&links.path_product(geometry, site, &paths::plaquette(mu, nu)));
                    }
                    let steps = match self.kind {
                        ActionKind::Wilson => continue,
                        ActionKind::Rectangle => paths::rectangle(mu, nu),
                        ActionKind::TwistedRectangle => paths::twisted_rectangle(mu, nu),
                    };
                    total += self.loop_weight[mu][nu] * re_trace(&links.path_product(geometry, site, &steps));
                }
            }
        }
        -self.beta / 3.0 * total
    }
}
