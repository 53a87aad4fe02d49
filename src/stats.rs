//! Plain-data usage summaries a host application can print or log itself (spec 10 "Ambient
//! engineering" - this crate carries no logging dependency, so observability is a pull API
//! rather than a push one). Grounded on the teacher's `ListOpLogStats`/`RleVec::get_stats`.

use humansize::{format_size, DECIMAL};
use rle::RleStats;

use crate::causalgraph::CausalGraph;
use crate::op::{OpKind, OpLog};

/// Byte-footprint and shape summary of a [`CausalGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CausalGraphStats {
    pub entries: RleStats,
    pub num_agents: usize,
    pub num_merges: usize,
    pub num_lvs: usize,
}

impl CausalGraph {
    pub fn stats(&self) -> CausalGraphStats {
        let num_merges = self.entries.0.iter().filter(|e| e.parents.len() >= 2).count();
        CausalGraphStats {
            entries: self.entries.get_stats(),
            num_agents: self.ids.num_agents(),
            num_merges,
            num_lvs: self.next_lv(),
        }
    }
}

impl CausalGraphStats {
    pub fn print(&self) {
        println!("-------- CausalGraph --------");
        println!(
            "entries: {} ({} byte entries, allocated {})",
            self.entries.len,
            self.entries.entry_byte_size,
            format_size(self.entries.capacity * self.entries.entry_byte_size, DECIMAL),
        );
        println!("agents: {}", self.num_agents);
        println!("merge points: {}", self.num_merges);
        println!("local versions: {}", self.num_lvs);
    }
}

/// Byte-footprint and content-shape summary of an [`OpLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpLogStats {
    pub graph: CausalGraphStats,
    pub num_inserts: usize,
    pub num_deletes: usize,
    pub total_keystrokes: usize,
    pub ops_byte_size: usize,
}

impl OpLog {
    pub fn stats(&self) -> OpLogStats {
        let mut num_inserts = 0;
        let mut num_deletes = 0;
        for op in &self.operations {
            match op.kind {
                OpKind::Ins => num_inserts += op.len,
                OpKind::Del => num_deletes += op.len,
            }
        }

        OpLogStats {
            graph: self.cg.stats(),
            num_inserts,
            num_deletes,
            total_keystrokes: num_inserts + num_deletes,
            ops_byte_size: self.operations.capacity() * std::mem::size_of::<crate::op::OpSpan>(),
        }
    }
}

impl OpLogStats {
    pub fn print(&self) {
        self.graph.print();
        println!("-------- OpLog --------");
        println!("inserts: {}, deletes: {}, total keystrokes: {}", self.num_inserts, self.num_deletes, self.total_keystrokes);
        println!("operations allocated: {}", format_size(self.ops_byte_size, DECIMAL));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn oplog_stats_counts_inserts_and_deletes() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        log.local_insert(a, 0, "hello");
        log.local_delete(a, 0, 2);

        let stats = log.stats();
        assert_eq!(stats.num_inserts, 5);
        assert_eq!(stats.num_deletes, 2);
        assert_eq!(stats.total_keystrokes, 7);
        assert_eq!(stats.graph.num_agents, 1);
    }

    #[test]
    fn causalgraph_stats_counts_merge_points() {
        let mut log = OpLog::new();
        let a = log.get_or_create_agent_id("a");
        let b = log.get_or_create_agent_id("b");
        log.local_insert(a, 0, "hi");
        log.push_remote_op(b, 0, &[], crate::op::Operation::Insert { pos: 0, content: "x".into() }).unwrap();
        // A local op parented on both heads creates a genuine merge entry.
        log.cg.assign_local_op(&[0, 2], a, 1);

        let stats = log.cg.stats();
        assert_eq!(stats.num_merges, 1);
        assert_eq!(stats.num_agents, 2);
    }
}
