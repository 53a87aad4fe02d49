//! **ReplayEngine**: walks the causal graph, retreating/advancing/applying operations against an
//! auxiliary CRDT list to produce a document snapshot, and hosts the Fugue/Sync9 integration rule.
//! ~38% of the core (spec 4.4).

use std::collections::HashMap;

use crate::branch::Branch;
use crate::causalgraph::CausalGraph;
use crate::error::{GraphError, Result};
use crate::frontier::Frontier;
use crate::lvrange::UNDERWATER_START;
use crate::op::{OpLog, OpView};
use crate::LV;

const NOT_YET_INSERTED: i32 = -1;
const INSERTED: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndState { Inserted, Deleted }

/// One CRDT item. `origin_left`/`right_parent` are the Fugue integration anchors (spec 4.4.1,
/// committing to the `rightParent` formulation per spec 9's open question). `cur_state` uses the
/// spec 9 counter-bias encoding: `-1` NotYetInserted, `0` Inserted, `>=1` Deleted (with
/// multiplicity, i.e. DoubleDeleted+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Item {
    pub(crate) lv: LV,
    origin_left: Option<LV>,
    right_parent: Option<LV>,
    cur_state: i32,
    end_state: EndState,
}

/// A replay context: the CRDT item list plus the bookkeeping needed to retreat/advance it as the
/// walk moves non-linearly through the causal graph.
///
/// Item lookups are a linear scan by `lv` rather than an LV-indexed map (spec 9's "naive O(n) scan
/// ... acceptable for correctness" performance note) - this sidesteps having to keep an index map
/// in sync across list splices.
#[derive(Debug, Clone)]
pub(crate) struct ReplayContext {
    pub(crate) items: Vec<Item>,
    del_targets: HashMap<LV, LV>,
    pub(crate) cur_version: Frontier,
}

impl ReplayContext {
    pub(crate) fn new() -> Self {
        ReplayContext { items: Vec::new(), del_targets: HashMap::new(), cur_version: Frontier::new() }
    }

    /// A placeholder-prefixed context for BranchMerge (spec 4.5): `prefix_len` fabricated items,
    /// all `Inserted`, chained left-to-right, with LVs drawn from the reserved underwater range.
    pub(crate) fn with_placeholder(prefix_len: usize, cur_version: Frontier) -> Self {
        let mut items = Vec::with_capacity(prefix_len);
        for i in 0..prefix_len {
            let lv = UNDERWATER_START + i;
            let origin_left = if i == 0 { None } else { Some(UNDERWATER_START + i - 1) };
            items.push(Item { lv, origin_left, right_parent: None, cur_state: INSERTED, end_state: EndState::Inserted });
        }
        ReplayContext { items, del_targets: HashMap::new(), cur_version }
    }

    fn index_of(&self, lv: LV) -> Result<usize> {
        self.items.iter().position(|it| it.lv == lv).ok_or(GraphError::CorruptState)
    }

    fn retreat(&mut self, oplog: &OpLog, lv: LV) -> Result<()> {
        match oplog.op_view(lv) {
            OpView::Delete { .. } => {
                let target = *self.del_targets.get(&lv).ok_or(GraphError::CorruptState)?;
                let idx = self.index_of(target)?;
                if self.items[idx].cur_state < 1 {
                    return Err(GraphError::CorruptState);
                }
                self.items[idx].cur_state -= 1;
            }
            OpView::Insert { .. } => {
                let idx = self.index_of(lv)?;
                if self.items[idx].cur_state != INSERTED {
                    return Err(GraphError::CorruptState);
                }
                self.items[idx].cur_state = NOT_YET_INSERTED;
            }
        }
        Ok(())
    }

    fn advance(&mut self, oplog: &OpLog, lv: LV) -> Result<()> {
        match oplog.op_view(lv) {
            OpView::Delete { .. } => {
                let target = *self.del_targets.get(&lv).ok_or(GraphError::CorruptState)?;
                let idx = self.index_of(target)?;
                if self.items[idx].cur_state < INSERTED {
                    return Err(GraphError::CorruptState);
                }
                self.items[idx].cur_state += 1;
            }
            OpView::Insert { .. } => {
                let idx = self.index_of(lv)?;
                if self.items[idx].cur_state != NOT_YET_INSERTED {
                    return Err(GraphError::CorruptState);
                }
                self.items[idx].cur_state = INSERTED;
            }
        }
        Ok(())
    }

    /// Locate the `pos`-th item with `curState == Inserted`, returning its index and the
    /// snapshot-relative `endPos` accumulated before it (spec 4.4 Apply/Delete).
    fn locate_nth_inserted(&self, pos: usize) -> Result<(usize, usize)> {
        let mut seen = 0usize;
        let mut end_pos = 0usize;
        for (idx, item) in self.items.iter().enumerate() {
            if item.cur_state == INSERTED {
                if seen == pos {
                    return Ok((idx, end_pos));
                }
                seen += 1;
            }
            if item.end_state == EndState::Inserted {
                end_pos += 1;
            }
        }
        Err(GraphError::CorruptState)
    }

    /// Locate the insertion site for `pos` (spec 4.4 Apply/Insert): the cursor index just past the
    /// `pos`-th `Inserted` item, its `endPos`, `originLeft`, and `rightParent`.
    fn locate_insert_site(&self, pos: usize) -> Result<(usize, usize, Option<LV>, Option<LV>)> {
        let mut seen = 0usize;
        let mut end_pos = 0usize;
        let mut idx = 0usize;
        while seen < pos {
            if idx >= self.items.len() {
                return Err(GraphError::CorruptState);
            }
            let item = &self.items[idx];
            if item.cur_state == INSERTED {
                seen += 1;
            }
            if item.end_state == EndState::Inserted {
                end_pos += 1;
            }
            idx += 1;
        }

        let origin_left = if idx == 0 { None } else { Some(self.items[idx - 1].lv) };

        let mut scan = idx;
        while scan < self.items.len() && self.items[scan].cur_state == NOT_YET_INSERTED {
            scan += 1;
        }
        let right_parent = if scan < self.items.len() {
            let right_item = &self.items[scan];
            if right_item.origin_left == origin_left { Some(right_item.lv) } else { None }
        } else {
            None
        };

        Ok((idx, end_pos, origin_left, right_parent))
    }

    fn apply(&mut self, oplog: &OpLog, lv: LV, mut snapshot: Option<&mut Vec<char>>) -> Result<()> {
        match oplog.op_view(lv) {
            OpView::Delete { pos } => {
                let (idx, end_pos) = self.locate_nth_inserted(pos)?;
                let target_lv = self.items[idx].lv;
                if self.items[idx].end_state == EndState::Inserted {
                    if let Some(snap) = snapshot.as_deref_mut() {
                        if end_pos >= snap.len() {
                            return Err(GraphError::CorruptState);
                        }
                        snap.remove(end_pos);
                    }
                    self.items[idx].end_state = EndState::Deleted;
                }
                self.items[idx].cur_state += 1;
                self.del_targets.insert(lv, target_lv);
            }
            OpView::Insert { pos, content } => {
                let (idx, end_pos, origin_left, right_parent) = self.locate_insert_site(pos)?;
                let (final_idx, final_end_pos) =
                    integrate(&self.items, &oplog.cg, lv, origin_left, right_parent, idx, end_pos)?;

                self.items.insert(final_idx, Item {
                    lv,
                    origin_left,
                    right_parent,
                    cur_state: INSERTED,
                    end_state: EndState::Inserted,
                });

                if let Some(snap) = snapshot.as_deref_mut() {
                    if final_end_pos > snap.len() {
                        return Err(GraphError::CorruptState);
                    }
                    snap.insert(final_end_pos, content);
                }
            }
        }
        Ok(())
    }

    /// The §4.4 walk over `[v_start, v_end)`, threading `cur_version` and (optionally) mutating
    /// `snapshot`. A `None` snapshot re-populates CRDT items without materializing any document
    /// (spec 4.5's "re-populate ... without mutating the document").
    pub(crate) fn run(&mut self, oplog: &OpLog, v_start: LV, v_end: LV, mut snapshot: Option<&mut Vec<char>>) -> Result<()> {
        for e in oplog.cg.iter_versions_between(v_start, v_end) {
            let (a_only, b_only) = oplog.cg.diff(&self.cur_version, &e.parents);

            for r in &a_only {
                for lv in r.start..r.end {
                    self.retreat(oplog, lv)?;
                }
            }
            for r in &b_only {
                for lv in r.start..r.end {
                    self.advance(oplog, lv)?;
                }
            }
            for lv in e.range.start..e.range.end {
                self.apply(oplog, lv, snapshot.as_deref_mut())?;
            }

            self.cur_version = std::iter::once(e.range.last()).collect();
        }
        Ok(())
    }
}

fn find_idx(items: &[Item], lv: LV) -> usize {
    items.iter().position(|it| it.lv == lv).expect("origin reference must name an existing item")
}

/// The Fugue/Sync9 integration rule (spec 4.4.1): given the new item's `(originLeft, rightParent)`
/// and a cursor positioned just after `originLeft`, scan forward through the concurrent
/// (`NotYetInserted`) region to find the final committed insertion site.
fn integrate(
    items: &[Item],
    cg: &CausalGraph,
    new_lv: LV,
    origin_left: Option<LV>,
    right_parent: Option<LV>,
    mut idx: usize,
    mut end_pos: usize,
) -> Result<(usize, usize)> {
    if idx >= items.len() || items[idx].cur_state != NOT_YET_INSERTED {
        return Ok((idx, end_pos));
    }

    let left_idx: isize = match origin_left {
        Some(lv) => find_idx(items, lv) as isize,
        None => -1,
    };
    let right_idx: isize = match right_parent {
        Some(lv) => find_idx(items, lv) as isize,
        None => items.len() as isize,
    };

    let mut scanning = false;
    let mut committed_idx = idx;
    let mut committed_end_pos = end_pos;

    while idx < items.len() {
        let other = &items[idx];
        if other.cur_state != NOT_YET_INSERTED {
            break;
        }

        let o_left_idx: isize = match other.origin_left {
            Some(lv) => find_idx(items, lv) as isize,
            None => -1,
        };
        let o_right_idx: isize = match other.right_parent {
            Some(lv) => find_idx(items, lv) as isize,
            None => items.len() as isize,
        };

        if o_left_idx < left_idx {
            break;
        } else if o_left_idx == left_idx {
            if o_right_idx < right_idx {
                scanning = true;
            } else if o_right_idx == right_idx {
                let new_av = cg.ids.lv_to_agent_version(new_lv)?;
                let other_av = cg.ids.lv_to_agent_version(other.lv)?;
                if cg.ids.tie_break(new_av, other_av) == std::cmp::Ordering::Less {
                    break;
                }
                scanning = false;
            } else {
                scanning = false;
            }
        }

        end_pos += if other.end_state == EndState::Inserted { 1 } else { 0 };
        idx += 1;
        if !scanning {
            committed_idx = idx;
            committed_end_pos = end_pos;
        }
    }

    Ok((committed_idx, committed_end_pos))
}

/// `checkout(log) -> Branch<T>` (spec 6): a fresh snapshot and heads, replaying from genesis.
pub fn checkout(oplog: &OpLog) -> Result<Branch> {
    let mut snapshot: Vec<char> = Vec::new();
    let mut ctx = ReplayContext::new();
    ctx.run(oplog, 0, oplog.cg.next_lv(), Some(&mut snapshot))?;
    // `ctx.cur_version` only tracks the last-processed CG entry's tail LV, not the graph's real
    // (possibly multi-element) heads - a merge of concurrent branches leaves other heads unvisited
    // by the walk's final iteration. Mirrors `merge_changes_into_branch`'s use of the graph's own
    // dominator set rather than replay-cursor bookkeeping.
    Ok(Branch { snapshot: snapshot.into_iter().collect(), version: oplog.cg.heads().iter().copied().collect() })
}

/// `checkoutSimple(log) -> sequence<T>` (spec 6): convenience over [`checkout`].
pub fn checkout_simple(oplog: &OpLog) -> Result<String> {
    Ok(checkout(oplog)?.snapshot)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::op::Operation;

    #[test]
    fn linear_inserts_checkout_in_order() {
        let mut log = OpLog::new();
        let u1 = log.get_or_create_agent_id("u1");
        log.local_insert(u1, 0, "h");
        log.local_insert(u1, 1, "i");

        let branch = checkout(&log).unwrap();
        assert_eq!(branch.snapshot, "hi");
        assert_eq!(branch.version.as_slice(), &[1]);
    }

    #[test]
    fn concurrent_insert_at_start_ties_break_by_agent() {
        let mut a = OpLog::new();
        let u1 = a.get_or_create_agent_id("u1");
        a.get_or_create_agent_id("u2");
        a.local_insert(u1, 0, "A");

        let mut b = OpLog::new();
        b.get_or_create_agent_id("u1");
        let u2 = b.get_or_create_agent_id("u2");
        b.local_insert(u2, 0, "B");

        a.merge_oplog_into(&b).unwrap();
        assert_eq!(checkout_simple(&a).unwrap(), "AB");

        b.merge_oplog_into(&a).unwrap();
        assert_eq!(checkout_simple(&b).unwrap(), "AB");
    }

    #[test]
    fn interleave_safe_concurrent_runs_converge() {
        let mut a = OpLog::new();
        let agent_a = a.get_or_create_agent_id("a");
        a.get_or_create_agent_id("b");
        a.local_insert(agent_a, 0, "hello");

        let mut b = OpLog::new();
        b.get_or_create_agent_id("a");
        let agent_b = b.get_or_create_agent_id("b");
        b.local_insert(agent_b, 0, "world");

        a.merge_oplog_into(&b).unwrap();
        b.merge_oplog_into(&a).unwrap();

        let snap_a = checkout_simple(&a).unwrap();
        let snap_b = checkout_simple(&b).unwrap();
        assert_eq!(snap_a, snap_b);
        assert_eq!(snap_a.chars().filter(|&c| "hello".contains(c)).count(), 5);
    }

    #[test]
    fn checkout_version_matches_real_heads_after_a_merge() {
        let mut a = OpLog::new();
        let u1 = a.get_or_create_agent_id("u1");
        a.get_or_create_agent_id("u2");
        a.local_insert(u1, 0, "A");

        let mut b = OpLog::new();
        b.get_or_create_agent_id("u1");
        let u2 = b.get_or_create_agent_id("u2");
        b.local_insert(u2, 0, "B");

        a.merge_oplog_into(&b).unwrap();
        assert_eq!(a.local_frontier(), &[0, 1]);

        let branch = checkout(&a).unwrap();
        assert_eq!(branch.version.as_slice(), a.local_frontier());
    }

    #[test]
    fn concurrent_delete_of_same_character_is_idempotent() {
        let mut a = OpLog::new();
        let u1 = a.get_or_create_agent_id("u1");
        a.get_or_create_agent_id("u2");
        a.local_insert(u1, 0, "X");
        let del_parents: Vec<LV> = a.local_frontier().to_vec();
        a.local_delete(u1, 0, 1);

        let mut b = OpLog::new();
        b.get_or_create_agent_id("u1");
        let u2 = b.get_or_create_agent_id("u2");
        b.push_remote_op(u1, 0, &[], Operation::Insert { pos: 0, content: "X".into() }).unwrap();
        b.push_remote_op(u2, 0, &del_parents, Operation::Delete { pos: 0, len: 1 }).unwrap();

        a.merge_oplog_into(&b).unwrap();
        assert_eq!(checkout_simple(&a).unwrap(), "");
    }

    #[test]
    fn delete_then_concurrent_insert_at_same_position() {
        let mut base = OpLog::new();
        let u1 = base.get_or_create_agent_id("u1");
        base.get_or_create_agent_id("u2");
        base.local_insert(u1, 0, "X");
        let v0: Vec<LV> = base.local_frontier().to_vec();

        let mut a = base.clone();
        a.local_delete(u1, 0, 1);

        let mut b = base.clone();
        let u2 = b.get_agent_id("u2").unwrap();
        b.local_insert(u2, 0, "Y");

        a.merge_oplog_into(&b).unwrap();
        assert_eq!(checkout_simple(&a).unwrap(), "Y");
        let _ = v0;
    }
}
