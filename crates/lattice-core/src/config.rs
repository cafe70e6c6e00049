//! Engine configuration

use serde::{Deserialize, Serialize};

/// Knobs recognized by the graph engine. Confidence clamp bounds are fixed
/// at [0, 1] and deliberately not configurable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Node-count ceiling; inserting past it evicts the lowest-ranked node.
    /// Never below 1: the insert path always has room for the new node after
    /// one eviction.
    pub max_nodes: usize,
    /// How many context snippets each entity/edge keeps (oldest evicted).
    pub context_cap: usize,
    /// Mentions below this confidence are filtered out at ingest.
    pub min_confidence: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            max_nodes: 1000,
            context_cap: 5,
            min_confidence: 0.3,
        }
    }
}

impl GraphConfig {
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes.max(1);
        self
    }

    pub fn with_context_cap(mut self, context_cap: usize) -> Self {
        self.context_cap = context_cap;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}
