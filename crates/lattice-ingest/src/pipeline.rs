//! Document ingestion service
//!
//! The single mutation entry point into the graph. Extraction runs outside
//! the store lock and may run concurrently across documents; resolve/observe
//! calls are serialized through one write lock per document, so concurrent
//! readers always observe a consistent graph.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use lattice_core::{
    normalize, snapshot, Entity, EntityId, EntityIndex, EntityResolver, GraphConfig, GraphStats,
    GraphStore, Mention, Relationship, RelationshipAggregator,
};
use tokio::sync::RwLock;

use crate::extractor::MentionExtractor;
use crate::priority::TypePriorityTable;

/// The engine state guarded by the writer lock: the store plus the stateful
/// resolver/aggregator counters that belong to it.
pub struct EngineState {
    pub store: GraphStore,
    pub resolver: EntityResolver,
    pub aggregator: RelationshipAggregator,
}

/// What ingesting one document did.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub doc_id: String,
    /// True when the document id was already ingested and the whole batch
    /// was skipped (re-ingestion never inflates counts).
    pub skipped: bool,
    /// Mentions dropped by the minimum-confidence filter.
    pub filtered: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub pairs_observed: u64,
}

/// Running totals across all documents.
#[derive(Debug, Clone, Default)]
pub struct IngestTotals {
    pub resolved: u64,
    pub rejected: u64,
    pub clamped: u64,
    pub pairs_observed: u64,
}

#[derive(Clone)]
pub struct IngestService {
    state: Arc<RwLock<EngineState>>,
    index: Arc<EntityIndex>,
    priority: Arc<TypePriorityTable>,
}

impl IngestService {
    pub fn new(config: GraphConfig) -> Self {
        Self::from_store(GraphStore::with_config(config))
    }

    pub fn from_store(store: GraphStore) -> Self {
        let index = EntityIndex::new();
        index.rebuild(&store);
        IngestService {
            state: Arc::new(RwLock::new(EngineState {
                store,
                resolver: EntityResolver::new(),
                aggregator: RelationshipAggregator::new(),
            })),
            index: Arc::new(index),
            priority: Arc::new(TypePriorityTable::default()),
        }
    }

    /// Restore a service from a binary snapshot.
    pub fn from_snapshot(path: &Path) -> anyhow::Result<Self> {
        let store = snapshot::load(path)
            .with_context(|| format!("loading snapshot {}", path.display()))?;
        Ok(Self::from_store(store))
    }

    pub fn with_priority_table(mut self, table: TypePriorityTable) -> Self {
        self.priority = Arc::new(table);
        self
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    /// Ingest one document's mention set: filter, reconcile types, resolve
    /// every mention, and record co-occurrence per sentence. Takes the write
    /// lock once for the whole document.
    pub async fn ingest_mentions(
        &self,
        doc_id: &str,
        mentions: Vec<Mention>,
    ) -> anyhow::Result<IngestReport> {
        let mut report = IngestReport {
            doc_id: doc_id.to_string(),
            ..Default::default()
        };

        let mut state = self.state.write().await;
        let EngineState {
            store,
            resolver,
            aggregator,
        } = &mut *state;

        if !store.begin_document(doc_id)? {
            tracing::info!(doc = doc_id, "document already ingested, skipping");
            report.skipped = true;
            return Ok(report);
        }

        let min_confidence = store.config().min_confidence;
        let before = mentions.len();
        let mut kept: Vec<Mention> = mentions
            .into_iter()
            .filter(|m| m.confidence >= min_confidence)
            .collect();
        report.filtered = (before - kept.len()) as u64;

        self.priority.reconcile(&mut kept);

        let mut by_sentence: BTreeMap<u32, Vec<Mention>> = BTreeMap::new();
        for m in kept {
            by_sentence.entry(m.sentence).or_default().push(m);
        }

        let resolved_before = resolver.resolved;
        let rejected_before = resolver.rejected;
        let pairs_before = aggregator.pairs_observed;

        for group in by_sentence.values() {
            let context = group
                .iter()
                .find(|m| !m.context.is_empty())
                .map(|m| m.context.clone())
                .unwrap_or_default();

            let mut resolved: Vec<(EntityId, f32)> = Vec::with_capacity(group.len());
            for m in group {
                let Some(outcome) = resolver.resolve(store, m)? else {
                    continue;
                };
                if let Some(evicted) = &outcome.evicted {
                    if let Some(text) = normalize(&evicted.text) {
                        self.index.remove(&text, &evicted.label, evicted.id);
                    }
                }
                if outcome.created {
                    if let Some(text) = normalize(&m.text) {
                        self.index.insert(&text, &m.label, outcome.id);
                    }
                }
                resolved.push((outcome.id, m.confidence.clamp(0.0, 1.0)));
            }

            // An eviction later in the sentence can remove an entity resolved
            // earlier in it; those ids must not reach the aggregator.
            resolved.retain(|(id, _)| store.entity(*id).is_some());
            aggregator.observe(store, &resolved, &context)?;
        }

        report.resolved = resolver.resolved - resolved_before;
        report.rejected = resolver.rejected - rejected_before;
        report.pairs_observed = aggregator.pairs_observed - pairs_before;
        tracing::info!(
            doc = doc_id,
            resolved = report.resolved,
            rejected = report.rejected,
            filtered = report.filtered,
            pairs = report.pairs_observed,
            "document ingested"
        );
        Ok(report)
    }

    /// Run the extractor ensemble over one document, then ingest the combined
    /// mention stream. A failing extractor is logged and skipped; the rest of
    /// the ensemble still contributes.
    pub async fn ingest_document(
        &self,
        extractors: &[Arc<dyn MentionExtractor>],
        doc_id: &str,
        text: &str,
    ) -> anyhow::Result<IngestReport> {
        let mut mentions = Vec::new();
        for extractor in extractors {
            match extractor.extract(doc_id, text).await {
                Ok(found) => mentions.extend(found),
                Err(e) => {
                    tracing::warn!(
                        doc = doc_id,
                        extractor = extractor.name(),
                        error = %e,
                        "extractor failed, continuing with the rest of the ensemble"
                    );
                }
            }
        }
        self.ingest_mentions(doc_id, mentions).await
    }

    // ── Reads (read lock; never block the writer across I/O) ──

    pub async fn stats(&self) -> GraphStats {
        let state = self.state.read().await;
        GraphStats::collect(&state.store)
    }

    pub async fn totals(&self) -> IngestTotals {
        let state = self.state.read().await;
        IngestTotals {
            resolved: state.resolver.resolved,
            rejected: state.resolver.rejected,
            clamped: state.resolver.clamped,
            pairs_observed: state.aggregator.pairs_observed,
        }
    }

    pub async fn entity(&self, id: EntityId) -> Option<Entity> {
        let state = self.state.read().await;
        state.store.entity(id).cloned()
    }

    /// Entities whose canonical text normalizes like `text`, optionally
    /// restricted to one type label.
    pub async fn find_entities(&self, text: &str, label: Option<&str>) -> Vec<Entity> {
        let ids = self.index.lookup_text(text);
        let state = self.state.read().await;
        ids.into_iter()
            .filter_map(|id| state.store.entity(id))
            .filter(|e| label.is_none_or(|l| e.label == l))
            .cloned()
            .collect()
    }

    pub async fn relationships_of(&self, id: EntityId) -> Vec<Relationship> {
        let state = self.state.read().await;
        state
            .store
            .relationships_of(id)
            .into_iter()
            .cloned()
            .collect()
    }

    // ── Persistence (the only blocking boundary) ──

    pub async fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state.read().await;
        snapshot::save(&state.store, path)
            .with_context(|| format!("saving snapshot {}", path.display()))
    }

    pub async fn export_graphml(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state.read().await;
        snapshot::export_graphml(&state.store, path)
            .with_context(|| format!("exporting graphml {}", path.display()))
    }

    pub async fn export_json(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state.read().await;
        snapshot::export_json(&state.store, path)
            .with_context(|| format!("exporting json {}", path.display()))
    }

    pub async fn export_stats(&self, path: &Path) -> anyhow::Result<()> {
        let state = self.state.read().await;
        snapshot::export_stats(&state.store, path)
            .with_context(|| format!("exporting stats {}", path.display()))
    }

    /// Shut the store down, optionally flushing a final snapshot first.
    pub async fn close(&self, final_snapshot: Option<&Path>) -> anyhow::Result<()> {
        let mut state = self.state.write().await;
        if let Some(path) = final_snapshot {
            snapshot::save(&state.store, path)
                .with_context(|| format!("saving final snapshot {}", path.display()))?;
        }
        state.store.close();
        Ok(())
    }
}
