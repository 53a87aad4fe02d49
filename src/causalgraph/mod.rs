//! **CausalGraph**: a run-length encoded, indexed join-semilattice of `(agent, seq)` identifiers
//! with per-entry parent frontiers. ~28% of the core (spec 4.2).

mod tools;

pub use tools::DiffFlag;

use rle::{HasLength, MergableSpan, RleKeyed, RleVec, Searchable, SplitableSpanHelpers};

use crate::frontier::{add_to_frontier, advance_frontier_by, sort_frontier};
use crate::id_space::{AgentId, IdSpace};
use crate::lvrange::LVRange;
use crate::{Frontier, LV};

/// Internal, RLE-merged representation of one run of entries sharing an agent and a contiguous
/// `(LV, seq)` mapping. Distinct from the external [`CGEntry`] returned by queries: this one is
/// never clipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CGEntryInternal {
    pub range: LVRange,
    pub agent: AgentId,
    pub seq_start: usize,
    pub parents: Frontier,
}

impl HasLength for CGEntryInternal {
    fn len(&self) -> usize { self.range.len() }
}
impl RleKeyed for CGEntryInternal {
    fn rle_key(&self) -> usize { self.range.start }
}
impl Searchable for CGEntryInternal {
    type Item = LV;
    fn get_offset(&self, loc: LV) -> Option<usize> { self.range.get_offset(loc) }
    fn at_offset(&self, offset: usize) -> LV { self.range.at_offset(offset) }
}

/// A (possibly clipped) view of a run of entries, as yielded by [`CausalGraph::iter_versions_between`]
/// and consumed by the replay engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CGEntry {
    pub range: LVRange,
    pub agent: AgentId,
    pub seq_start: usize,
    pub parents: Frontier,
}

/// `{ agent, seq, len, parents: Id[] }` - the wire-format record for one CG entry (spec 4.2 /
/// spec 6 "wire format"). Parent Ids are resolved through [`IdSpace`] so they're portable between
/// peers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WireEntry {
    pub agent: String,
    pub seq: usize,
    pub len: usize,
    pub parents: Vec<(String, usize)>,
}

/// `agent -> [seqStart, seqEnd) ranges known to this graph`, RLE-merged and ascending per agent
/// (spec 6 "Version summary").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionSummary(pub Vec<(String, Vec<(usize, usize)>)>);

#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    pub(crate) ids: IdSpace,
    pub(crate) entries: RleVec<CGEntryInternal>,
    pub(crate) heads: Frontier,
}

impl CausalGraph {
    pub fn new() -> Self { Self::default() }

    pub fn next_lv(&self) -> LV { self.ids.next_lv() }

    pub fn heads(&self) -> &[LV] { &self.heads }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.ids.get_or_create_agent_id(name)
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> { self.ids.get_agent_id(name) }

    pub fn agent_name(&self, agent: AgentId) -> &str { self.ids.agent_name(agent) }

    pub fn next_seq_for_agent(&self, agent: AgentId) -> usize { self.ids.next_seq_for_agent(agent) }

    pub(crate) fn entry_containing(&self, lv: LV) -> Option<&CGEntryInternal> {
        self.entries.find(lv)
    }

    /// `add(agent, seqStart, seqEnd, parents) -> lengthInserted` (spec 4.2). Returns the (possibly
    /// empty, if fully redundant) LV range actually appended.
    pub fn add(&mut self, agent: AgentId, seq_start: usize, seq_end: usize, parents: &[LV]) -> LVRange {
        if seq_start >= seq_end {
            let lv = self.next_lv();
            return LVRange::new(lv, lv);
        }

        let known_end = self.ids.next_seq_for_agent(agent);
        if seq_end <= known_end {
            // Fully duplicate - nothing new to record (soft "DuplicateIngest").
            let lv = self.next_lv();
            return LVRange::new(lv, lv);
        }

        let (seq_start, parents): (usize, Frontier) = if seq_start < known_end {
            // A prefix of this span is already known; trim it and re-anchor the parent to the
            // last already-known op for this agent.
            let last_known_lv = self.ids.try_id_to_lv(agent, known_end - 1)
                .expect("known_end implies this seq was assigned");
            (known_end, std::iter::once(last_known_lv).collect())
        } else {
            (seq_start, parents.iter().copied().collect())
        };

        let lv_start = self.next_lv();
        let len = seq_end - seq_start;
        let lv_end = lv_start + len;

        let merged = if let Some(last) = self.entries.0.last_mut() {
            let contiguous_solo_parent = parents.len() == 1 && parents[0] == last.range.last();
            let contiguous_agent_run = last.agent == agent && last.seq_start + last.range.len() == seq_start;
            if contiguous_solo_parent && contiguous_agent_run {
                last.range.end = lv_end;
                true
            } else {
                false
            }
        } else {
            false
        };

        if !merged {
            self.entries.0.push(CGEntryInternal { range: LVRange::new(lv_start, lv_end), agent, seq_start, parents: parents.clone() });
        }

        self.ids.assign(agent, seq_start, lv_start, len);

        self.heads = advance_frontier_by(&self.heads, &parents, lv_end - 1);

        LVRange::new(lv_start, lv_end)
    }

    /// Convenience used by local edits: assigns the agent's next `len` seqs, parented on the
    /// graph's current heads (or an explicit parent set).
    pub(crate) fn assign_local_op(&mut self, parents: &[LV], agent: AgentId, len: usize) -> LVRange {
        let seq_start = self.ids.next_seq_for_agent(agent);
        self.add(agent, seq_start, seq_start + len, parents)
    }

    /// `advanceFrontier(frontier, vLast, parents) -> newFrontier` (spec 4.2).
    pub fn advance_frontier(&self, frontier: &Frontier, v_last: LV, parents: &[LV]) -> Frontier {
        advance_frontier_by(frontier, parents, v_last)
    }

    /// `iterVersionsBetween(vStart, vEnd) -> stream<CGEntry>` (spec 4.2): entries covering
    /// `[v_start, v_end)` in ascending LV order, clipped at both ends. A synthesized entry clipped
    /// from the interior of a run has its parents reset to `[firstClippedLV - 1]`.
    pub fn iter_versions_between(&self, v_start: LV, v_end: LV) -> impl Iterator<Item = CGEntry> + '_ {
        self.entries.0.iter().filter_map(move |e| {
            let lo = e.range.start.max(v_start);
            let hi = e.range.end.min(v_end);
            if lo >= hi {
                return None;
            }
            let parents = if lo == e.range.start {
                e.parents.clone()
            } else {
                std::iter::once(lo - 1).collect()
            };
            Some(CGEntry {
                range: LVRange::new(lo, hi),
                agent: e.agent,
                seq_start: e.seq_start + (lo - e.range.start),
                parents,
            })
        })
    }

    /// `diff(a, b) -> { aOnly, bOnly }` (spec 4.2).
    pub fn diff(&self, a: &[LV], b: &[LV]) -> (Vec<LVRange>, Vec<LVRange>) {
        tools::diff(self, a, b)
    }

    /// `findDominators(versions) -> LV[]` (spec 4.2).
    pub fn find_dominators(&self, versions: &[LV]) -> Frontier {
        tools::find_dominators(self, versions)
    }

    /// `findConflicting(a, b, visit) -> commonAncestor` (spec 4.2).
    pub fn find_conflicting<F: FnMut(LVRange, DiffFlag)>(&self, a: &[LV], b: &[LV], visit: F) -> Frontier {
        tools::find_conflicting(self, a, b, visit)
    }

    /// `serializeDiff(ranges) -> Entry[]` (spec 4.2 / 6).
    pub fn serialize_diff(&self, ranges: &[LVRange]) -> Vec<WireEntry> {
        let mut out = Vec::new();
        for &range in ranges {
            for entry in self.iter_versions_between(range.start, range.end) {
                let agent_name = self.ids.agent_name(entry.agent).to_string();
                let parents = entry.parents.iter().map(|&p| {
                    let id = self.ids.lv_to_id(p).expect("diff parent must already be known locally");
                    (id.0.to_string(), id.1)
                }).collect();
                out.push(WireEntry { agent: agent_name, seq: entry.seq_start, len: entry.range.len(), parents });
            }
        }
        out
    }

    /// `mergePartialVersions(entries) -> LVRange` (spec 4.2): resolves each entry's parents via
    /// IdSpace (parents must already be present - otherwise `MissingParents`), calls `add`, and
    /// returns the (possibly empty) aggregate LV range actually inserted.
    pub fn merge_partial_versions(&mut self, entries: &[WireEntry]) -> crate::error::Result<LVRange> {
        let mut first: Option<LV> = None;
        let mut last_end = self.next_lv();

        for e in entries {
            let agent = self.ids.get_or_create_agent_id(&e.agent);
            let mut parents: Frontier = Frontier::new();
            for (p_agent, p_seq) in &e.parents {
                let p_agent_id = self.ids.get_agent_id(p_agent).ok_or(crate::error::GraphError::MissingParents)?;
                let p_lv = self.ids.try_id_to_lv(p_agent_id, *p_seq).ok_or(crate::error::GraphError::MissingParents)?;
                add_to_frontier(&mut parents, p_lv);
            }
            sort_frontier(&mut parents);

            let inserted = self.add(agent, e.seq, e.seq + e.len, &parents);
            if inserted.len() > 0 {
                if first.is_none() {
                    first = Some(inserted.start);
                }
                last_end = inserted.end;
            }
        }

        Ok(match first {
            Some(start) => LVRange::new(start, last_end),
            None => LVRange::new(self.next_lv(), self.next_lv()),
        })
    }

    /// `VersionSummary` for this graph (spec 6).
    pub fn summarize_version(&self) -> VersionSummary {
        VersionSummary(self.ids.summary())
    }

    /// `intersectWithSummary` (spec 6): maps a remote's version summary through this graph's
    /// IdSpace, returning the dominator frontier of everything both sides already share.
    pub fn intersect_with_summary(&self, summary: &VersionSummary) -> Frontier {
        let mut lvs: Vec<LV> = Vec::new();
        for (agent_name, ranges) in &summary.0 {
            if let Some(agent) = self.ids.get_agent_id(agent_name) {
                let local_known_end = self.ids.next_seq_for_agent(agent);
                for &(_start, end) in ranges {
                    let capped_end = end.min(local_known_end);
                    if capped_end > 0 {
                        if let Ok(lv) = self.ids.id_to_lv(agent, capped_end - 1) {
                            lvs.push(lv);
                        }
                    }
                }
            }
        }
        if lvs.is_empty() {
            Frontier::new()
        } else {
            self.find_dominators(&lvs)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_rle_merges_sequential_local_ops() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.add(a, 0, 1, &[]);
        cg.add(a, 1, 2, &[0]);
        assert_eq!(cg.entries.len_entries(), 1, "sequential same-agent ops should RLE-merge");
        assert_eq!(cg.heads(), &[1]);
    }

    #[test]
    fn add_does_not_merge_across_agents() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        cg.add(a, 0, 1, &[]);
        cg.add(b, 0, 1, &[]);
        assert_eq!(cg.entries.len_entries(), 2);
        assert_eq!(cg.heads(), &[0, 1]);
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.add(a, 0, 2, &[]);
        let inserted = cg.add(a, 0, 2, &[]);
        assert_eq!(inserted.len(), 0);
        assert_eq!(cg.next_lv(), 2);
    }

    #[test]
    fn partial_duplicate_add_only_appends_the_new_suffix() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.add(a, 0, 2, &[]);
        let inserted = cg.add(a, 0, 4, &[]);
        assert_eq!(inserted, LVRange::new(2, 4));
    }

    #[test]
    fn diff_splits_concurrent_history() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        cg.add(a, 0, 1, &[]); // lv 0
        cg.add(b, 0, 1, &[]); // lv 1

        let (a_only, b_only) = cg.diff(&[0], &[1]);
        assert_eq!(a_only, vec![LVRange::new(0, 1)]);
        assert_eq!(b_only, vec![LVRange::new(1, 2)]);
    }

    #[test]
    fn diff_against_self_is_empty() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.add(a, 0, 3, &[]);
        let (a_only, b_only) = cg.diff(&[2], &[2]);
        assert!(a_only.is_empty());
        assert!(b_only.is_empty());
    }

    #[test]
    fn find_dominators_drops_ancestors() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        cg.add(a, 0, 1, &[]); // lv 0
        cg.add(a, 1, 2, &[0]); // lv 1, descendant of 0

        let dominators = cg.find_dominators(&[0, 1]);
        assert_eq!(dominators.as_slice(), &[1]);
    }

    #[test]
    fn find_dominators_keeps_concurrent_versions() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        cg.add(a, 0, 1, &[]); // lv 0
        cg.add(b, 0, 1, &[]); // lv 1

        let dominators = cg.find_dominators(&[0, 1]);
        assert_eq!(dominators.as_slice(), &[0, 1]);
    }

    #[test]
    fn find_conflicting_locates_common_ancestor_and_sides() {
        let mut cg = CausalGraph::new();
        let a = cg.get_or_create_agent_id("a");
        let b = cg.get_or_create_agent_id("b");
        cg.add(a, 0, 1, &[]); // lv 0: common ancestor
        cg.add(a, 1, 2, &[0]); // lv 1: a-only
        cg.add(b, 0, 1, &[0]); // lv 2: b-only

        let mut a_ranges = Vec::new();
        let mut b_ranges = Vec::new();
        let common = cg.find_conflicting(&[1], &[2], |range, flag| {
            match flag {
                DiffFlag::OnlyA => a_ranges.push(range),
                DiffFlag::OnlyB => b_ranges.push(range),
                DiffFlag::Shared => {}
            }
        });

        assert_eq!(common.as_slice(), &[0]);
        assert_eq!(a_ranges, vec![LVRange::new(1, 2)]);
        assert_eq!(b_ranges, vec![LVRange::new(2, 3)]);
    }

    #[test]
    fn serialize_then_merge_partial_versions_round_trips() {
        let mut src = CausalGraph::new();
        let a = src.get_or_create_agent_id("a");
        src.add(a, 0, 3, &[]);

        let wire = src.serialize_diff(&[LVRange::new(0, 3)]);

        let mut dest = CausalGraph::new();
        let inserted = dest.merge_partial_versions(&wire).unwrap();
        assert_eq!(inserted, LVRange::new(0, 3));
        assert_eq!(dest.heads(), &[2]);

        // Idempotence of sync: re-merging the same diff is a no-op.
        let inserted_again = dest.merge_partial_versions(&wire).unwrap();
        assert_eq!(inserted_again.len(), 0);
    }
}
