use crate::action::Action;
use crate::config::{resolve_update_method, UpdateMethod};
use crate::field::{LinkSource, LinkView};
use crate::geometry::LatticeGeometry;
use crate::random::{heatbath_su2_coefficients, random_su2_haar, RandomSu3Pool};
use crate::su3::{embed, re_trace, su2_from_coefficients, su2_projection, CMatrix3, SUBGROUPS};
use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;

/// Below this subgroup strength the heatbath draws a Haar-random rotation.
const MIN_SUBGROUP_NORM: f64 = 1e-12;

/// Everything a single-link update reads besides the links themselves.
#[derive(Clone, Copy)]
pub struct UpdateContext<'a> {
    geometry: &'a LatticeGeometry,
    action: &'a Action,
    pool: &'a RandomSu3Pool,
    method: UpdateMethod,
}

impl<'a> UpdateContext<'a> {
    /// A staple-based `requested` method is replaced when `action` has no
    /// linear staple.
    pub fn new(geometry: &'a LatticeGeometry, action: &'a Action, pool: &'a RandomSu3Pool, requested: UpdateMethod) -> Self {
        Self {
            geometry,
            action,
            pool,
            method: resolve_update_method(action.kind(), requested),
        }
    }

    pub fn method(&self) -> UpdateMethod {
        self.method
    }

    /// Update one link in place. Returns whether a proposal was accepted
    /// (heatbath always accepts).
    #[inline]
    pub fn update_link(&self, links: &mut LinkView<'_>, link: usize, rng: &mut Xoshiro256StarStar) -> bool {
        match self.method {
            UpdateMethod::Heatbath => {
                self.heatbath(links, link, rng);
                true
            }
            UpdateMethod::Metropolis => self.metropolis(links, link, rng),
            UpdateMethod::MetropolisNoStaples => self.metropolis_no_staples(links, link, rng),
        }
    }

    /// Cabibbo-Marinari heatbath over the three SU(2) subgroups.
    fn heatbath(&self, links: &mut LinkView<'_>, link: usize, rng: &mut Xoshiro256StarStar) {
        let a = self.action.staple(self.geometry, &*links, link);
        let mut u = links.link(link);
        let beta = self.action.beta();
        for (i, j) in SUBGROUPS {
            let v = su2_projection(&(u * a), i, j);
            let k = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2] + v[3] * v[3]).sqrt();
            let r = if k > MIN_SUBGROUP_NORM {
                let v_hat = su2_from_coefficients(v.map(|c| c / k));
                let x = su2_from_coefficients(heatbath_su2_coefficients(rng, 2.0 * beta * k / 3.0));
                x * v_hat.adjoint()
            } else {
                random_su2_haar(rng)
            };
            u = embed(&r, i, j) * u;
        }
        links.set(link, u);
    }

    /// Metropolis with the action difference taken from the staple:
    /// `dS = -(beta/3) Re Tr((U' - U) A)`.
    fn metropolis(&self, links: &mut LinkView<'_>, link: usize, rng: &mut Xoshiro256StarStar) -> bool {
        let a = self.action.staple(self.geometry, &*links, link);
        let u = links.link(link);
        let proposal = self.pool.draw(rng) * u;
        let delta = -self.action.beta() / 3.0 * re_trace(&((proposal - u) * a));
        if accept(delta, rng) {
            links.set(link, proposal);
            true
        } else {
            false
        }
    }

    /// Metropolis with the action difference from two local-action evaluations.
    fn metropolis_no_staples(&self, links: &mut LinkView<'_>, link: usize, rng: &mut Xoshiro256StarStar) -> bool {
        let before = self.action.local_action(self.geometry, &*links, link);
        let u = links.link(link);
        links.set(link, self.pool.draw(rng) * u);
        let delta = self.action.local_action(self.geometry, &*links, link) - before;
        if accept(delta, rng) {
            true
        } else {
            links.set(link, u);
            false
        }
    }
}

#[inline]
fn accept(delta: f64, rng: &mut Xoshiro256StarStar) -> bool {
    -delta >= rng.gen::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionKind;
    use crate::field::GaugeField;
    use crate::su3::unitarity_deviation;
    use rand::SeedableRng;

    #[test]
    fn updates_preserve_su3() {
        let geom = LatticeGeometry::new(4, 4);
        let pool = RandomSu3Pool::generate(3);
        let mut rng = Xoshiro256StarStar::seed_from_u64(5);
        for (kind, method) in [
            (ActionKind::Wilson, UpdateMethod::Heatbath),
            (ActionKind::Rectangle, UpdateMethod::Heatbath),
            (ActionKind::Wilson, UpdateMethod::Metropolis),
            (ActionKind::TwistedRectangle, UpdateMethod::MetropolisNoStaples),
        ] {
            let action = Action::new(kind, 5.5, 1.0, 1.0);
            let ctx = UpdateContext::new(&geom, &action, &pool, method);
            let mut field = GaugeField::hot(geom.n_links, &mut rng);
            let mut view = LinkView::new(field.links_mut());
            for link in (0..geom.n_links).step_by(7) {
                ctx.update_link(&mut view, link, &mut rng);
                assert!(unitarity_deviation(&view.link(link)) < 1e-10, "{kind:?}/{method:?}");
            }
        }
    }

    #[test]
    fn rejected_proposals_leave_link_unchanged() {
        let geom = LatticeGeometry::new(4, 4);
        let pool = RandomSu3Pool::generate(3);
        // a huge beta on a cold field rejects nearly every move
        let action = Action::new(ActionKind::Wilson, 1e6, 1.0, 1.0);
        let mut rng = Xoshiro256StarStar::seed_from_u64(1);
        for method in [UpdateMethod::Metropolis, UpdateMethod::MetropolisNoStaples] {
            let ctx = UpdateContext::new(&geom, &action, &pool, method);
            let mut field = GaugeField::cold(geom.n_links);
            let mut view = LinkView::new(field.links_mut());
            for link in 0..32 {
                if !ctx.update_link(&mut view, link, &mut rng) {
                    assert_eq!(view.link(link), CMatrix3::identity());
                }
            }
        }
    }

    #[test]
    fn heatbath_on_cold_field_stays_near_identity_at_large_beta() {
        let geom = LatticeGeometry::new(4, 4);
        let pool = RandomSu3Pool::generate(3);
        let action = Action::new(ActionKind::Wilson, 1e4, 1.0, 1.0);
        let ctx = UpdateContext::new(&geom, &action, &pool, UpdateMethod::Heatbath);
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let mut field = GaugeField::cold(geom.n_links);
        let mut view = LinkView::new(field.links_mut());
        ctx.update_link(&mut view, 10, &mut rng);
        let u = view.link(10);
        assert!(re_trace(&u) > 2.99);
        assert!((u - CMatrix3::identity()).norm() > 0.0);
    }

    #[test]
    fn twisted_action_never_pairs_with_staple_updates() {
        let geom = LatticeGeometry::new(4, 4);
        let pool = RandomSu3Pool::generate(3);
        let twisted = Action::new(ActionKind::TwistedRectangle, 5.0, 1.0, 1.0);
        for method in [UpdateMethod::Heatbath, UpdateMethod::Metropolis] {
            let ctx = UpdateContext::new(&geom, &twisted, &pool, method);
            assert_eq!(ctx.method(), UpdateMethod::MetropolisNoStaples);
        }
        let wilson = Action::new(ActionKind::Wilson, 5.0, 1.0, 1.0);
        assert_eq!(
            UpdateContext::new(&geom, &wilson, &pool, UpdateMethod::Heatbath).method(),
            UpdateMethod::Heatbath
        );
    }
}
