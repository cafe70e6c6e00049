//! Error taxonomy for the graph engine
//!
//! Only conditions that must stop a caller become errors. Data-quality
//! problems (out-of-range confidence, empty mention text) are corrected in
//! place and logged; capacity pressure is handled by eviction and logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The store has been closed; no further mutation is accepted.
    #[error("graph store is closed")]
    StoreClosed,

    /// A mutation would break a store invariant (duplicate identifier with a
    /// mismatched type, self-edge, edge to a missing node). The offending
    /// mutation is rejected rather than corrupting the store.
    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },

    /// A snapshot failed validation at decode time. The load is aborted;
    /// no partial graph is ever returned.
    #[error("snapshot corrupt: {detail}")]
    SnapshotCorrupt { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("snapshot encode error: {0}")]
    Encode(String),

    #[error("snapshot decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("graphml write error: {0}")]
    Xml(String),
}

impl GraphError {
    pub fn invariant(detail: impl Into<String>) -> Self {
        GraphError::InvariantViolation {
            detail: detail.into(),
        }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        GraphError::SnapshotCorrupt {
            detail: detail.into(),
        }
    }
}
