//! Co-occurrence relationship aggregation
//!
//! Derives weighted edges between entities resolved from the same sentence.
//! The sentence is a hard scope boundary: callers group mentions by sentence
//! id and call `observe` once per sentence, never across sentences.

use crate::error::GraphError;
use crate::model::{EntityId, RelationKind};
use crate::store::GraphStore;

#[derive(Debug, Default)]
pub struct RelationshipAggregator {
    /// Total pairwise observations recorded.
    pub pairs_observed: u64,
}

impl RelationshipAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record co-occurrence for every unordered pair of distinct entities
    /// resolved from one sentence. The pairwise weight is the geometric mean
    /// of the two mention confidences; repeated observations of a pair update
    /// one edge whose weight is the running mean of all observations.
    /// Returns the number of pairs recorded.
    pub fn observe(
        &mut self,
        store: &mut GraphStore,
        resolved: &[(EntityId, f32)],
        context: &str,
    ) -> Result<u64, GraphError> {
        // Duplicate resolutions of the same entity within a sentence collapse
        // to one endpoint, keeping the highest confidence. Self-pairs are
        // skipped by construction.
        let mut unique: Vec<(EntityId, f32)> = Vec::with_capacity(resolved.len());
        for &(id, confidence) in resolved {
            match unique.iter_mut().find(|(seen, _)| *seen == id) {
                Some((_, best)) => {
                    if confidence > *best {
                        *best = confidence;
                    }
                }
                None => unique.push((id, confidence)),
            }
        }

        let mut recorded = 0;
        for i in 0..unique.len() {
            for j in (i + 1)..unique.len() {
                let (a, ca) = unique[i];
                let (b, cb) = unique[j];
                let weight = pairwise_weight(ca, cb);
                match store.upsert_relationship(a, b, RelationKind::Related, weight, context) {
                    Ok(_) => recorded += 1,
                    // A rejected mutation is a programming-defect signal, not
                    // a reason to halt the batch.
                    Err(GraphError::InvariantViolation { detail }) => {
                        tracing::error!(%detail, "co-occurrence edge rejected");
                    }
                    Err(other) => return Err(other),
                }
            }
        }
        self.pairs_observed += recorded;
        Ok(recorded)
    }
}

/// Geometric mean of two confidences, clamped into [0, 1].
pub fn pairwise_weight(a: f32, b: f32) -> f32 {
    (a.clamp(0.0, 1.0) * b.clamp(0.0, 1.0)).sqrt()
}
