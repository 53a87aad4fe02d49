//! **BranchMerge**: extends an already-computed snapshot with newly received operations without
//! re-replaying from genesis, via a placeholder-prefix technique. ~12% of the core (spec 4.5).

use crate::causalgraph::DiffFlag;
use crate::error::Result;
use crate::frontier::Frontier;
use crate::lvrange::LVRange;
use crate::op::OpLog;
use crate::replay::ReplayContext;
use crate::LV;

/// A materialized document snapshot pinned at a causal version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Branch {
    pub snapshot: String,
    pub version: Frontier,
}

impl Branch {
    /// `createEmptyBranch() -> Branch<T>` (spec 6).
    pub fn new_empty() -> Self {
        Self { snapshot: String::new(), version: Frontier::new() }
    }
}

/// `createEmptyBranch() -> Branch<T>` (spec 6).
pub fn create_empty_branch() -> Branch {
    Branch::new_empty()
}

/// `mergeChangesIntoBranch(branch, log, mergeVersion?)` (spec 4.5). Defaults `merge_version` to
/// the oplog's current heads when `None`.
pub fn merge_changes_into_branch(branch: &mut Branch, oplog: &OpLog, merge_version: Option<&[LV]>) -> Result<()> {
    let merge_version: Frontier = match merge_version {
        Some(v) => v.iter().copied().collect(),
        None => oplog.cg.heads().iter().copied().collect(),
    };

    let mut conflict_ops: Vec<LVRange> = Vec::new();
    let mut new_ops: Vec<LVRange> = Vec::new();
    let common_ancestor = oplog.cg.find_conflicting(&branch.version, &merge_version, |range, flag| {
        match flag {
            DiffFlag::OnlyA => conflict_ops.push(range),
            DiffFlag::OnlyB => new_ops.push(range),
            DiffFlag::Shared => {}
        }
    });
    // findConflicting's visitor runs in descending LV order; the walk below needs ascending.
    conflict_ops.reverse();
    new_ops.reverse();

    // The placeholder block stands in for the document as it existed at `commonAncestor` only -
    // anything between `commonAncestor` and `branch.version` is reconstructed for real by the
    // `conflictOps` pass below, so sizing the prefix any larger would double-count that span's
    // characters once the `newOps` pass starts computing real snapshot positions.
    let prefix_len = common_ancestor.iter().copied().max().map_or(0, |m| m + 1);
    let mut ctx = ReplayContext::with_placeholder(prefix_len, common_ancestor);

    for range in &conflict_ops {
        ctx.run(oplog, range.start, range.end, None)?;
    }

    let mut snapshot: Vec<char> = branch.snapshot.chars().collect();
    for range in &new_ops {
        ctx.run(oplog, range.start, range.end, Some(&mut snapshot))?;
    }
    branch.snapshot = snapshot.into_iter().collect();

    let mut union: Vec<LV> = branch.version.iter().copied().chain(merge_version.iter().copied()).collect();
    union.sort_unstable();
    union.dedup();
    branch.version = oplog.cg.find_dominators(&union);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::replay::checkout;

    #[test]
    fn incremental_merge_skips_replaying_the_known_prefix() {
        let mut log = OpLog::new();
        let agent = log.get_or_create_agent_id("a");
        log.local_insert(agent, 0, "abc");

        let branch_full = checkout(&log).unwrap();
        let mut branch = branch_full.clone();

        log.local_insert(agent, 1, "X");
        merge_changes_into_branch(&mut branch, &log, None).unwrap();

        assert_eq!(branch.snapshot, "aXbc");
        assert_eq!(branch.version.as_slice(), log.local_frontier());
    }

    #[test]
    fn branch_merge_equivalence_matches_full_checkout() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        let b = log.get_or_create_agent_id("b");
        log.local_insert(a, 0, "hello");

        let mut branch = checkout(&log).unwrap();

        log.local_insert(b, 5, " world");
        log.local_delete(a, 0, 1);

        merge_changes_into_branch(&mut branch, &log, None).unwrap();

        let full = checkout(&log).unwrap();
        assert_eq!(branch.snapshot, full.snapshot);
        assert_eq!(branch.version, full.version);
    }

    #[test]
    fn merging_an_unchanged_oplog_is_a_no_op() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        log.local_insert(a, 0, "hi");

        let mut branch = checkout(&log).unwrap();
        let before = branch.clone();
        merge_changes_into_branch(&mut branch, &log, None).unwrap();
        assert_eq!(branch, before);
    }
}
