//! **OpLog**: an append-only vector of operations, indexed by LV. ~10% of the core (spec 4.3).

use smartstring::alias::String as SmartString;

use crate::causalgraph::CausalGraph;
use crate::error::{GraphError, Result};
use crate::frontier::Frontier;
use crate::id_space::AgentId;
use crate::lvrange::LVRange;
use crate::LV;

/// A concrete edit, as submitted by a caller. This crate concretizes the spec's generic `T` as
/// `char` (spec 3 "Operation"): a multi-character local edit is one `Operation` spanning several
/// LVs, one `char` per LV, that RLE-merges contiguously in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert { pos: usize, content: SmartString },
    Delete { pos: usize, len: usize },
}

impl Operation {
    pub fn len(&self) -> usize {
        match self {
            Operation::Insert { content, .. } => content.chars().count(),
            Operation::Delete { len, .. } => *len,
        }
    }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpKind { Ins, Del }

/// One contiguous run of single-LV operations sharing a kind. Stored densely (one entry per
/// `add`-ing call, not globally RLE-merged across calls - see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpSpan {
    pub lv_start: LV,
    pub kind: OpKind,
    /// For inserts: the position of the *first* char in this run. Each subsequent LV's effective
    /// position is `pos + offset`, since a local multi-char insert is entirely sequential.
    /// For deletes: the constant position targeted by every LV in the run (the document shifts
    /// left after each delete, so repeatedly deleting at the same position removes the run).
    pub pos: usize,
    pub len: usize,
    pub ins_content: SmartString,
}

/// A single-LV view of an [`OpSpan`], resolved to one concrete character operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpView {
    Insert { pos: usize, content: char },
    Delete { pos: usize },
}

#[derive(Debug, Clone, Default)]
pub struct OpLog {
    pub cg: CausalGraph,
    pub(crate) operations: Vec<OpSpan>,
}

impl OpLog {
    pub fn new() -> Self { Self::default() }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        self.cg.get_or_create_agent_id(name)
    }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.cg.get_agent_id(name)
    }

    /// `getLatestVersion(log) -> Id[]` (spec 6), in LV form.
    pub fn local_frontier(&self) -> &[LV] { self.cg.heads() }

    /// `getLatestVersion(log) -> Id[]` (spec 6), in portable `(agent, seq)` form.
    pub fn remote_frontier(&self) -> Vec<crate::id_space::Id> {
        self.cg.heads().iter().map(|&lv| self.cg.ids.lv_to_id(lv).expect("head must be known")).collect()
    }

    fn op_index_for(&self, lv: LV) -> usize {
        self.operations.partition_point(|o| o.lv_start <= lv) - 1
    }

    pub(crate) fn op_view(&self, lv: LV) -> OpView {
        let span = &self.operations[self.op_index_for(lv)];
        let offset = lv - span.lv_start;
        match span.kind {
            OpKind::Ins => OpView::Insert {
                pos: span.pos + offset,
                content: span.ins_content.chars().nth(offset).expect("offset within run"),
            },
            OpKind::Del => OpView::Delete { pos: span.pos },
        }
    }

    /// `localInsert(agent, pos, content)` (spec 4.3): parents the new op on the current heads.
    pub fn local_insert(&mut self, agent: AgentId, pos: usize, content: &str) -> LVRange {
        let len = content.chars().count();
        if len == 0 {
            let lv = self.cg.next_lv();
            return LVRange::new(lv, lv);
        }
        let parents: Frontier = self.cg.heads().iter().copied().collect();
        let range = self.cg.assign_local_op(&parents, agent, len);
        self.operations.push(OpSpan { lv_start: range.start, kind: OpKind::Ins, pos, len, ins_content: content.into() });
        range
    }

    /// `localDelete(agent, pos, len)` (spec 4.3): appends `len` single-position deletes at `pos`.
    pub fn local_delete(&mut self, agent: AgentId, pos: usize, len: usize) -> LVRange {
        if len == 0 {
            let lv = self.cg.next_lv();
            return LVRange::new(lv, lv);
        }
        let parents: Frontier = self.cg.heads().iter().copied().collect();
        let range = self.cg.assign_local_op(&parents, agent, len);
        self.operations.push(OpSpan { lv_start: range.start, kind: OpKind::Del, pos, len, ins_content: SmartString::new() });
        range
    }

    /// `pushRemoteOp(id, parents, op) -> lengthAccepted` (spec 4.3): trims `op` to the suffix not
    /// yet known (by seq), and returns the empty range if it's fully redundant.
    pub fn push_remote_op(&mut self, agent: AgentId, seq_start: usize, parents: &[LV], op: Operation) -> Result<LVRange> {
        let total_len = op.len();
        if total_len == 0 {
            return Err(GraphError::InvalidLength);
        }

        let known_end = self.cg.next_seq_for_agent(agent);
        if seq_start + total_len <= known_end {
            let lv = self.cg.next_lv();
            return Ok(LVRange::new(lv, lv));
        }
        if seq_start > known_end {
            // A gap: this agent's seqs `[known_end, seq_start)` were never seen, so the new suffix
            // can't be anchored onto what's already known.
            return Err(GraphError::InvalidSeq);
        }
        let skip = known_end.saturating_sub(seq_start).min(total_len);

        let range = self.cg.add(agent, seq_start, seq_start + total_len, parents);
        if range.len() == 0 {
            let lv = self.cg.next_lv();
            return Ok(LVRange::new(lv, lv));
        }

        match op {
            Operation::Insert { pos, content } => {
                let trimmed_content: SmartString = content.chars().skip(skip).collect();
                self.operations.push(OpSpan {
                    lv_start: range.start,
                    kind: OpKind::Ins,
                    pos: pos + skip,
                    len: range.len(),
                    ins_content: trimmed_content,
                });
            }
            Operation::Delete { pos, .. } => {
                self.operations.push(OpSpan { lv_start: range.start, kind: OpKind::Del, pos, len: range.len(), ins_content: SmartString::new() });
            }
        }

        Ok(range)
    }

    /// `mergeOplogInto(dest, src)` (spec 4.3): summarizes `self`'s (dest's) known versions,
    /// intersects with `src` to find the common version, diffs `src` from there to its heads,
    /// merges the serialized CG diff into `self`, then copies the corresponding operations.
    ///
    /// Atomic from the caller's perspective: if `merge_partial_versions` fails, `self` is
    /// observed unchanged (the CG diff is the only thing that could partially apply, and it's
    /// computed and validated as a whole before any mutation begins).
    pub fn merge_oplog_into(&mut self, src: &OpLog) -> Result<LVRange> {
        let dest_summary = self.cg.summarize_version();
        let common = src.cg.intersect_with_summary(&dest_summary);
        let (_, new_in_src) = src.cg.diff(&common, src.cg.heads());

        let wire = src.cg.serialize_diff(&new_in_src);
        let inserted = self.cg.merge_partial_versions(&wire)?;

        for src_range in &new_in_src {
            let mut lv = src_range.start;
            while lv < src_range.end {
                let view = src.op_view(lv);
                let (agent, seq) = src.cg.ids.lv_to_agent_version(lv)?;
                let dest_lv = self.cg.ids.id_to_lv(agent, seq)?;
                match view {
                    OpView::Insert { pos, content } => {
                        self.operations.push(OpSpan {
                            lv_start: dest_lv,
                            kind: OpKind::Ins,
                            pos,
                            len: 1,
                            ins_content: content.into(),
                        });
                    }
                    OpView::Delete { pos } => {
                        self.operations.push(OpSpan { lv_start: dest_lv, kind: OpKind::Del, pos, len: 1, ins_content: SmartString::new() });
                    }
                }
                lv += 1;
            }
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_insert_and_delete_assign_contiguous_lvs() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        let r1 = log.local_insert(a, 0, "hi");
        assert_eq!(r1, LVRange::new(0, 2));
        let r2 = log.local_delete(a, 0, 1);
        assert_eq!(r2, LVRange::new(2, 3));
        assert_eq!(log.local_frontier(), &[2]);
    }

    #[test]
    fn push_remote_op_trims_already_known_prefix() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        log.push_remote_op(a, 0, &[], Operation::Insert { pos: 0, content: "ab".into() }).unwrap();

        let accepted = log.push_remote_op(a, 0, &[], Operation::Insert { pos: 0, content: "abc".into() }).unwrap();
        assert_eq!(accepted, LVRange::new(2, 3));
    }

    #[test]
    fn push_remote_op_fully_known_is_a_no_op() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        log.push_remote_op(a, 0, &[], Operation::Insert { pos: 0, content: "ab".into() }).unwrap();
        let accepted = log.push_remote_op(a, 0, &[], Operation::Insert { pos: 0, content: "ab".into() }).unwrap();
        assert_eq!(accepted.len(), 0);
    }

    #[test]
    fn push_remote_op_rejects_a_gapped_seq() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        log.push_remote_op(a, 0, &[], Operation::Insert { pos: 0, content: "ab".into() }).unwrap();

        // Agent `a`'s seqs 2.. haven't been seen yet; seq 5 leaves a gap.
        let err = log.push_remote_op(a, 5, &[], Operation::Insert { pos: 0, content: "z".into() }).unwrap_err();
        assert_eq!(err, GraphError::InvalidSeq);
    }

    #[test]
    fn merge_oplog_into_copies_new_operations_only() {
        let mut src = OpLog::new();
        let a = src.get_or_create_agent_id("a");
        src.local_insert(a, 0, "hi");

        let mut dest = OpLog::new();
        dest.merge_oplog_into(&src).unwrap();
        assert_eq!(dest.local_frontier(), src.local_frontier().iter().map(|&lv| {
            let (agent, seq) = src.cg.ids.lv_to_agent_version(lv).unwrap();
            dest.cg.ids.id_to_lv(agent, seq).unwrap()
        }).collect::<Vec<_>>().as_slice());

        // Idempotent: merging again copies nothing further.
        let before = dest.operations.len();
        dest.merge_oplog_into(&src).unwrap();
        assert_eq!(dest.operations.len(), before);
    }
}
