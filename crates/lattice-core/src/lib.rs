//! Lattice Core — Entity resolution and incremental knowledge-graph
//! construction: mention normalization, the bounded graph store, co-occurrence
//! aggregation, and the snapshot codec.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod snapshot;
pub mod stats;
pub mod store;


pub use aggregator::{pairwise_weight, RelationshipAggregator};
pub use config::GraphConfig;
pub use error::GraphError;
pub use index::EntityIndex;
pub use model::{
    clip_context, edge_key, EdgeKey, Entity, EntityId, Mention, RelationKind, Relationship,
    MAX_CONTEXT_CHARS,
};
pub use normalize::{normalize, MentionKey};
pub use resolver::EntityResolver;
pub use snapshot::SnapshotFile;
pub use stats::{GraphStats, TopEntity};
pub use store::{GraphStore, StoreState, UpsertOutcome};
