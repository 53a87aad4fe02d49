use std::fmt;

/// Errors raised by the causal graph, oplog and replay engine.
///
/// `DuplicateIngest` is deliberately not a variant here - a fully redundant remote op is reported
/// structurally, as a `0`-length return from the ingesting call, not as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// An LV or Id was referenced but is not present in the graph.
    UnknownVersion,
    /// A remote op names parents that are absent from the local graph.
    MissingParents,
    /// A zero- or negative-length operation was requested.
    InvalidLength,
    /// A replay invariant was violated (e.g. retreating an item that isn't `Inserted`).
    CorruptState,
    /// A local assignment named a seq lower than the agent's next valid seq.
    InvalidSeq,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GraphError::UnknownVersion => "referenced version is not known to this graph",
            GraphError::MissingParents => "remote op references parents absent from this graph",
            GraphError::InvalidLength => "operation has zero or negative length",
            GraphError::CorruptState => "replay invariant violated",
            GraphError::InvalidSeq => "seq is lower than the agent's next valid seq",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for GraphError {}

pub type Result<T> = std::result::Result<T, GraphError>;
