use crate::field::LinkView;
use crate::su3::CMatrix3;
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

/// Dispatch a per-block closure over `block_ids`, optionally in parallel.
///
/// Each block gets a [`LinkView`] over the whole link array and its own RNG.
/// The closure receives `(links, rng, block_id)`.
///
/// When `sequential` is true, blocks are processed on the current thread
/// (no rayon overhead, best for small lattices or when replicas are already
/// run in parallel at an outer level).
///
/// SAFETY: relies on the blocks in `block_ids` being one wave of a
/// [`BlockColoring`](crate::geometry::BlockColoring) validated for the
/// action's reach, so no task reads or writes a link another task writes,
/// and on `block_ids` holding no duplicates, so each RNG has one user.
pub fn par_over_blocks(
    links: &mut [CMatrix3],
    rngs: &mut [Xoshiro256StarStar],
    block_ids: &[usize],
    sequential: bool,
    body: impl Fn(&mut LinkView<'_>, &mut Xoshiro256StarStar, usize) + Send + Sync,
) {
    let n_links = links.len();
    let n_rngs = rngs.len();
    let lp = links.as_mut_ptr() as usize;
    let rp = rngs.as_mut_ptr() as usize;

    let work = |&block_id: &usize| {
        assert!(block_id < n_rngs, "block {block_id} has no RNG");
        unsafe {
            let mut view = LinkView::from_raw(lp as *mut CMatrix3, n_links);
            let rng = &mut *(rp as *mut Xoshiro256StarStar).add(block_id);
            body(&mut view, rng, block_id);
        }
    };

    if sequential {
        block_ids.iter().for_each(work);
    } else {
        block_ids.par_iter().for_each(work);
    }
}
