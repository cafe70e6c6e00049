//! Entity resolution: merging noisy mentions into canonical nodes

use crate::error::GraphError;
use crate::model::{EntityId, Mention};
use crate::normalize::MentionKey;
use crate::store::{GraphStore, UpsertOutcome};

/// Resolves raw mentions into canonical entity nodes and keeps data-quality
/// counters. No failure in normal mention processing is fatal: a bad mention
/// degrades to "rejected", never halts the batch.
///
/// Cross-extractor type conflicts are intentionally not reconciled here:
/// the same text with different labels resolves to distinct entities. Any
/// reconciliation policy is applied by the caller before `resolve`.
#[derive(Debug, Default)]
pub struct EntityResolver {
    /// Mentions successfully resolved to an entity.
    pub resolved: u64,
    /// Mentions whose text normalized to nothing and were dropped.
    pub rejected: u64,
    /// Mentions whose confidence had to be clamped into [0, 1].
    pub clamped: u64,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one mention into the entity it belongs to, creating or merging
    /// the node. Returns `Ok(None)` for a rejected (empty-after-normalization)
    /// mention.
    pub fn resolve(
        &mut self,
        store: &mut GraphStore,
        mention: &Mention,
    ) -> Result<Option<UpsertOutcome>, GraphError> {
        let Some(key) = MentionKey::new(&mention.text, &mention.label) else {
            self.rejected += 1;
            tracing::debug!(
                doc = %mention.doc_id,
                extractor = %mention.extractor,
                "mention text normalized to nothing, rejected"
            );
            return Ok(None);
        };

        let confidence = self.clamp_confidence(mention);

        let outcome = store.upsert_entity(
            &key,
            &mention.text,
            confidence,
            &mention.doc_id,
            &mention.context,
        )?;
        self.resolved += 1;
        Ok(Some(outcome))
    }

    /// Clamp an out-of-range confidence into [0, 1], counting and logging it
    /// as a data-quality warning.
    pub fn clamp_confidence(&mut self, mention: &Mention) -> f32 {
        if (0.0..=1.0).contains(&mention.confidence) {
            return mention.confidence;
        }
        self.clamped += 1;
        let clamped = mention.confidence.clamp(0.0, 1.0);
        tracing::warn!(
            text = %mention.text,
            extractor = %mention.extractor,
            confidence = mention.confidence,
            clamped,
            "out-of-range confidence clamped"
        );
        clamped
    }

    /// The deterministic identifier a mention would resolve to, without
    /// mutating anything. `None` when the text normalizes to nothing.
    pub fn identify(text: &str, label: &str) -> Option<EntityId> {
        MentionKey::new(text, label).map(|key| key.id())
    }
}
