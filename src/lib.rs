//! A replayable event-graph sequence CRDT core.
//!
//! Fugue/Sync9-style: a list CRDT built from an immutable, replayable log of causally-ordered
//! operations rather than a single mutable tree of live items. Any two replicas that have seen
//! the same set of operations converge to the same document, regardless of delivery order.
//!
//! The crate is layered into five pieces, each in its own module:
//!
//! - [`id_space`] - `IdSpace`: external `(agent, seq)` ids <-> compact local versions (LVs).
//! - [`causalgraph`] - `CausalGraph`: the RLE time-DAG of parent/child relationships between LVs.
//! - [`op`] - `OpLog`: the append-only log of `Insert`/`Delete` operations, indexed by LV.
//! - [`replay`] - `ReplayEngine`: replays an `OpLog` into a concrete document at any version.
//! - [`branch`] - `Branch` and incremental branch merging.

pub mod branch;
pub mod causalgraph;
pub mod error;
pub mod frontier;
pub mod id_space;
pub mod lvrange;
pub mod op;
pub mod replay;
pub mod stats;

pub use branch::Branch;
pub use causalgraph::{CausalGraph, CGEntry, DiffFlag, VersionSummary, WireEntry};
pub use error::{GraphError, Result};
pub use frontier::Frontier;
pub use id_space::{AgentId, AgentVersion, Id, IdSpace};
pub use lvrange::LVRange;
pub use op::{Operation, OpLog};
pub use stats::{CausalGraphStats, OpLogStats};

/// A Local Version: a dense, zero-based index into the causal graph. Every operation this crate
/// has ever recorded occupies exactly one LV, assigned in the order operations are first seen
/// (spec 3 "LV").
pub type LV = usize;
