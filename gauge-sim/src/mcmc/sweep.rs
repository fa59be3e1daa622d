use super::update::UpdateContext;
use crate::field::LinkView;
use crate::geometry::{BlockColor, BlockColoring};
use crate::parallel::par_over_blocks;
use crate::su3::CMatrix3;
use rand_xoshiro::Xoshiro256StarStar;
use std::sync::atomic::{AtomicU64, Ordering};

/// Proposal counts of one or more sweeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub proposals: u64,
    pub accepted: u64,
}

impl SweepStats {
    pub fn merge(&mut self, other: SweepStats) {
        self.proposals += other.proposals;
        self.accepted += other.accepted;
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.proposals == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposals as f64
        }
    }
}

/// Block-decomposed sweep: even colour, then odd, one wave at a time.
///
/// Every block applies `n_updates` passes over its links in
/// `chunk_sequence` order using its own RNG (`rngs[block_id]`). Waves are
/// separated by the implicit barrier at the end of each parallel dispatch.
#[cfg_attr(feature = "profile", inline(never))]
pub fn block_sweep(
    ctx: &UpdateContext<'_>,
    coloring: &BlockColoring,
    links: &mut [CMatrix3],
    rngs: &mut [Xoshiro256StarStar],
    n_updates: usize,
    sequential: bool,
) -> SweepStats {
    let accepted = AtomicU64::new(0);
    let sequence = coloring.chunk_sequence();

    for color in [BlockColor::Even, BlockColor::Odd] {
        for wave in coloring.waves(color) {
            par_over_blocks(links, rngs, wave, sequential, |view, rng, block_id| {
                let base = coloring.block_base(block_id);
                let mut n_acc = 0u64;
                for _ in 0..n_updates {
                    for &offset in sequence {
                        n_acc += ctx.update_link(view, base + offset, rng) as u64;
                    }
                }
                accepted.fetch_add(n_acc, Ordering::Relaxed);
            });
        }
    }

    SweepStats {
        proposals: (links.len() * n_updates) as u64,
        accepted: accepted.into_inner(),
    }
}

/// One ordered pass over every link, ignoring the block colouring.
#[cfg_attr(feature = "profile", inline(never))]
pub fn serial_sweep(ctx: &UpdateContext<'_>, links: &mut [CMatrix3], rng: &mut Xoshiro256StarStar) -> SweepStats {
    let n_links = links.len();
    let mut view = LinkView::new(links);
    let mut accepted = 0u64;
    for link in 0..n_links {
        accepted += ctx.update_link(&mut view, link, rng) as u64;
    }
    SweepStats {
        proposals: n_links as u64,
        accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::config::{ActionKind, UpdateMethod};
    use crate::field::{GaugeField, LinkSource};
    use crate::geometry::LatticeGeometry;
    use crate::random::RandomSu3Pool;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Link source that remembers every index it was asked for.
    struct Recording<'a> {
        links: &'a [CMatrix3],
        read: RefCell<HashSet<usize>>,
    }

    impl LinkSource for Recording<'_> {
        fn link(&self, index: usize) -> CMatrix3 {
            self.read.borrow_mut().insert(index);
            self.links[index]
        }
    }

    fn block_footprint(
        geom: &LatticeGeometry,
        action: &Action,
        coloring: &BlockColoring,
        field: &GaugeField,
        block_id: usize,
    ) -> (HashSet<usize>, HashSet<usize>) {
        let rec = Recording {
            links: field.links(),
            read: RefCell::new(HashSet::new()),
        };
        let base = coloring.block_base(block_id);
        let mut written = HashSet::new();
        for &off in coloring.chunk_sequence() {
            let link = base + off;
            written.insert(link);
            action.staple(geom, &rec, link);
            action.local_action(geom, &rec, link);
        }
        (rec.read.into_inner(), written)
    }

    #[test]
    fn blocks_in_a_wave_are_independent() {
        for (kind, s, t, chunk) in [
            (ActionKind::Wilson, 4, 4, 1),
            (ActionKind::Rectangle, 4, 8, 2),
            (ActionKind::TwistedRectangle, 4, 8, 2),
        ] {
            let geom = LatticeGeometry::new(s, t);
            let action = Action::new(kind, 5.5, 1.0, 1.0);
            let coloring = BlockColoring::new(&geom, chunk).unwrap();
            coloring.validate_parallel(action.reach()).unwrap();
            let field = GaugeField::cold(geom.n_links);

            for color in [BlockColor::Even, BlockColor::Odd] {
                for wave in coloring.waves(color) {
                    let prints: Vec<_> = wave
                        .iter()
                        .map(|&id| block_footprint(&geom, &action, &coloring, &field, id))
                        .collect();
                    for (a, (_, written_a)) in prints.iter().enumerate() {
                        for (b, (read_b, written_b)) in prints.iter().enumerate() {
                            if a == b {
                                continue;
                            }
                            assert!(
                                written_a.is_disjoint(read_b) && written_a.is_disjoint(written_b),
                                "{kind:?}: blocks {} and {} of one wave overlap",
                                wave[a],
                                wave[b]
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn parallel_and_sequential_block_sweeps_agree_exactly() {
        let geom = LatticeGeometry::new(4, 8);
        let coloring = BlockColoring::new(&geom, 2).unwrap();
        let action = Action::new(ActionKind::Wilson, 5.7, 1.0, 1.0);
        let pool = RandomSu3Pool::generate(0);
        let ctx = UpdateContext::new(&geom, &action, &pool, UpdateMethod::Metropolis);
        let seed_rngs = || -> Vec<Xoshiro256StarStar> {
            (0..coloring.n_blocks() as u64)
                .map(Xoshiro256StarStar::seed_from_u64)
                .collect()
        };

        let mut a = GaugeField::cold(geom.n_links);
        let mut b = a.clone();
        let (mut rngs_a, mut rngs_b) = (seed_rngs(), seed_rngs());
        let mut stats_a = SweepStats::default();
        let mut stats_b = SweepStats::default();
        for _ in 0..2 {
            stats_a.merge(block_sweep(&ctx, &coloring, a.links_mut(), &mut rngs_a, 2, true));
            stats_b.merge(block_sweep(&ctx, &coloring, b.links_mut(), &mut rngs_b, 2, false));
        }
        assert_eq!(a.links(), b.links());
        assert_eq!(stats_a, stats_b);
        assert_eq!(stats_a.proposals, 4 * geom.n_links as u64);
        assert!(stats_a.accepted > 0);
    }

    #[test]
    fn serial_sweep_counts_every_link() {
        let geom = LatticeGeometry::new(4, 4);
        let action = Action::new(ActionKind::Wilson, 5.5, 1.0, 1.0);
        let pool = RandomSu3Pool::generate(0);
        let ctx = UpdateContext::new(&geom, &action, &pool, UpdateMethod::Heatbath);
        let mut field = GaugeField::cold(geom.n_links);
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let stats = serial_sweep(&ctx, field.links_mut(), &mut rng);
        assert_eq!(stats.proposals, geom.n_links as u64);
        assert_eq!(stats.accepted, stats.proposals);
        assert_eq!(stats.acceptance_rate(), 1.0);
    }
}
