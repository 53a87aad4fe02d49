//! **IdSpace**: bidirectional mapping between external `(agent, seq)` identifiers and compact
//! local integer versions (LVs). ~12% of the core (spec 4.1).

use rle::{HasLength, MergableSpan, RleKeyed, RleVec, SplitableSpanHelpers};
use smartstring::alias::String as SmartString;

use crate::error::{GraphError, Result};
use crate::LV;

pub type AgentId = u32;

/// `(agent, seq)` - an external identifier. Globally unique per peer; `seq` is monotonic per
/// agent.
pub type AgentVersion = (AgentId, usize);

/// Owned external identifier, for use across process boundaries (the agent is a plain string
/// rather than an interned id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Id(pub SmartString, pub usize);

/// One contiguous RLE-merged run of an agent's `(seq, LV)` correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeqToLvRun {
    seq_start: usize,
    lv_first: LV,
    len: usize,
}

impl HasLength for SeqToLvRun {
    fn len(&self) -> usize { self.len }
}
impl RleKeyed for SeqToLvRun {
    fn rle_key(&self) -> usize { self.seq_start }
}
impl MergableSpan for SeqToLvRun {
    fn can_append(&self, other: &Self) -> bool {
        self.seq_start + self.len == other.seq_start && self.lv_first + self.len == other.lv_first
    }
    fn append(&mut self, other: Self) { self.len += other.len; }
}
impl SplitableSpanHelpers for SeqToLvRun {
    fn truncate_h(&mut self, at: usize) -> Self {
        let rest = SeqToLvRun {
            seq_start: self.seq_start + at,
            lv_first: self.lv_first + at,
            len: self.len - at,
        };
        self.len = at;
        rest
    }
}

#[derive(Debug, Clone, Default)]
struct ClientData {
    name: SmartString,
    /// Sorted by seq; RLE-merged when contiguous in both seq and LV (invariant I3).
    item_times: RleVec<SeqToLvRun>,
}

impl ClientData {
    fn next_seq(&self) -> usize { self.item_times.end() }

    fn try_seq_to_lv(&self, seq: usize) -> Option<LV> {
        let (run, offset) = self.item_times.find_with_offset(seq)?;
        Some(run.lv_first + offset)
    }
}

/// One contiguous RLE-merged run of `LV -> (agent, seq)` - the inverse index of [`ClientData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LvToAgentRun {
    lv_start: LV,
    agent: AgentId,
    seq_start: usize,
    len: usize,
}

impl HasLength for LvToAgentRun {
    fn len(&self) -> usize { self.len }
}
impl RleKeyed for LvToAgentRun {
    fn rle_key(&self) -> usize { self.lv_start }
}
impl MergableSpan for LvToAgentRun {
    fn can_append(&self, other: &Self) -> bool {
        self.agent == other.agent
            && self.lv_start + self.len == other.lv_start
            && self.seq_start + self.len == other.seq_start
    }
    fn append(&mut self, other: Self) { self.len += other.len; }
}
impl SplitableSpanHelpers for LvToAgentRun {
    fn truncate_h(&mut self, at: usize) -> Self {
        let rest = LvToAgentRun {
            lv_start: self.lv_start + at,
            agent: self.agent,
            seq_start: self.seq_start + at,
            len: self.len - at,
        };
        self.len = at;
        rest
    }
}

/// Bidirectional `(agent, seq) <-> LV` mapping, with RLE storage on both sides.
#[derive(Debug, Clone, Default)]
pub struct IdSpace {
    client_data: Vec<ClientData>,
    lv_to_agent: RleVec<LvToAgentRun>,
}

impl IdSpace {
    pub fn new() -> Self { Self::default() }

    pub fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.client_data.iter().position(|c| c.name == name).map(|i| i as AgentId)
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        if let Some(id) = self.get_agent_id(name) {
            return id;
        }
        self.client_data.push(ClientData { name: name.into(), item_times: RleVec::new() });
        (self.client_data.len() - 1) as AgentId
    }

    pub fn agent_name(&self, agent: AgentId) -> &str {
        &self.client_data[agent as usize].name
    }

    pub fn next_seq_for_agent(&self, agent: AgentId) -> usize {
        self.client_data.get(agent as usize).map_or(0, ClientData::next_seq)
    }

    pub fn next_lv(&self) -> LV { self.lv_to_agent.end() }

    pub(crate) fn num_agents(&self) -> usize { self.client_data.len() }

    /// Record that `[lv_start, lv_start+len)` was assigned to `agent` starting at `seq_start`.
    /// Called exactly once, in LV order, when a [`crate::causal_graph::CausalGraph`] entry is
    /// created.
    pub(crate) fn assign(&mut self, agent: AgentId, seq_start: usize, lv_start: LV, len: usize) {
        let client = &mut self.client_data[agent as usize];
        client.item_times.push(SeqToLvRun { seq_start, lv_first: lv_start, len });
        self.lv_to_agent.push(LvToAgentRun { lv_start, agent, seq_start, len });
    }

    /// `lvToId(lv) -> Id` (spec 4.1).
    pub fn lv_to_id(&self, lv: LV) -> Result<Id> {
        let (run, offset) = self.lv_to_agent.find_with_offset(lv).ok_or(GraphError::UnknownVersion)?;
        let name = self.client_data[run.agent as usize].name.clone();
        Ok(Id(name, run.seq_start + offset))
    }

    pub(crate) fn lv_to_agent_version(&self, lv: LV) -> Result<AgentVersion> {
        let (run, offset) = self.lv_to_agent.find_with_offset(lv).ok_or(GraphError::UnknownVersion)?;
        Ok((run.agent, run.seq_start + offset))
    }

    /// `idToLv(agent, seq) -> LV` (spec 4.1); fails with `UnknownVersion` if unmapped.
    pub fn id_to_lv(&self, agent: AgentId, seq: usize) -> Result<LV> {
        self.try_id_to_lv(agent, seq).ok_or(GraphError::UnknownVersion)
    }

    /// `tryIdToLv`: the non-failing counterpart of [`Self::id_to_lv`].
    pub fn try_id_to_lv(&self, agent: AgentId, seq: usize) -> Option<LV> {
        self.client_data.get(agent as usize)?.try_seq_to_lv(seq)
    }

    /// `agent -> [(seqStart, seqEnd)]` ranges known for every agent (spec 6 "Version summary"),
    /// RLE-merged and ascending per agent.
    pub(crate) fn summary(&self) -> Vec<(String, Vec<(usize, usize)>)> {
        self.client_data.iter().map(|client| {
            let ranges = client.item_times.0.iter().map(|run| (run.seq_start, run.seq_start + run.len)).collect();
            (client.name.to_string(), ranges)
        }).collect()
    }

    /// Lexicographic `(agent name, seq)` tie-break used by the Fugue integrate rule (spec 4.4.1).
    pub(crate) fn tie_break(&self, a: AgentVersion, b: AgentVersion) -> std::cmp::Ordering {
        if a == b {
            return std::cmp::Ordering::Equal;
        }
        let name_a = &self.client_data[a.0 as usize].name;
        let name_b = &self.client_data[b.0 as usize].name;
        name_a.cmp(name_b).then(a.1.cmp(&b.1))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_id_and_lv() {
        let mut ids = IdSpace::new();
        let a = ids.get_or_create_agent_id("seph");
        let b = ids.get_or_create_agent_id("mike");

        ids.assign(a, 0, 0, 2);
        ids.assign(b, 0, 2, 4);

        assert_eq!(ids.id_to_lv(a, 0).unwrap(), 0);
        assert_eq!(ids.id_to_lv(a, 1).unwrap(), 1);
        assert_eq!(ids.id_to_lv(b, 0).unwrap(), 2);
        assert_eq!(ids.id_to_lv(b, 3).unwrap(), 5);

        for lv in 0..ids.next_lv() {
            let (agent, seq) = ids.lv_to_agent_version(lv).unwrap();
            assert_eq!(ids.id_to_lv(agent, seq).unwrap(), lv);
        }
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut ids = IdSpace::new();
        let a = ids.get_or_create_agent_id("seph");
        ids.assign(a, 0, 0, 1);
        assert_eq!(ids.id_to_lv(a, 5), Err(GraphError::UnknownVersion));
        assert_eq!(ids.try_id_to_lv(a, 5), None);
    }

    #[test]
    fn tie_break_is_lexicographic_by_agent_then_seq() {
        let mut ids = IdSpace::new();
        let a = ids.get_or_create_agent_id("a");
        let b = ids.get_or_create_agent_id("b");
        assert_eq!(ids.tie_break((a, 0), (b, 0)), std::cmp::Ordering::Less);
        assert_eq!(ids.tie_break((a, 5), (a, 1)), std::cmp::Ordering::Greater);
    }
}
