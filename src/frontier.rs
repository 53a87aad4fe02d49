use smallvec::SmallVec;

use crate::LV;

/// A causal antichain: a sorted set of LVs, none of which is an ancestor of another. The empty
/// frontier denotes the initial (pre-genesis) state.
pub type Frontier = SmallVec<LV, 2>;

pub fn is_root(f: &[LV]) -> bool { f.is_empty() }

pub fn frontier_is_sorted(f: &[LV]) -> bool {
    f.windows(2).all(|w| w[0] < w[1])
}

/// Insert `v` into a sorted frontier, keeping it sorted. `v` must not already be present.
pub fn add_to_frontier(f: &mut Frontier, v: LV) {
    let idx = f.partition_point(|&x| x < v);
    debug_assert!(f.get(idx).copied() != Some(v));
    f.insert(idx, v);
}

/// `advanceFrontier(frontier, vLast, parents) -> newFrontier` (spec 4.2): remove every member of
/// `parents` from `frontier`, then insert `vLast`. Heads that weren't named as a parent of the new
/// entry are left untouched.
pub fn advance_frontier_by(frontier: &Frontier, parents: &[LV], v_last: LV) -> Frontier {
    let mut next: Frontier = frontier.iter().copied().filter(|v| !parents.contains(v)).collect();
    add_to_frontier(&mut next, v_last);
    next
}

pub fn sort_frontier(f: &mut Frontier) {
    f.sort_unstable();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn advance_replaces_parents_with_new_head() {
        let frontier: Frontier = [3usize, 7].into_iter().collect();
        let next = advance_frontier_by(&frontier, &[3], 8);
        assert_eq!(next.as_slice(), &[7, 8]);
    }

    #[test]
    fn advance_merging_two_heads_drops_both() {
        let frontier: Frontier = [3usize, 7].into_iter().collect();
        let next = advance_frontier_by(&frontier, &[3, 7], 8);
        assert_eq!(next.as_slice(), &[8]);
    }

    #[test]
    fn frontier_stays_sorted() {
        let mut f: Frontier = SmallVec::new();
        for v in [5usize, 1, 3, 0, 4] {
            add_to_frontier(&mut f, v);
            assert!(frontier_is_sorted(&f));
        }
    }
}
