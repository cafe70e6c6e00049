//! Graph store wrapping petgraph::StableDiGraph with identifier and
//! edge-triple indexes
//!
//! All node/edge state changes go through the mutation primitives here,
//! which is what makes the identifier and edge-uniqueness invariants
//! enforceable in one place. The resolver and aggregator never touch the
//! maps directly.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use petgraph::Direction;

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::model::{clip_context, edge_key, EdgeKey, Entity, EntityId, RelationKind, Relationship};
use crate::normalize::MentionKey;

/// Store lifecycle. `Open → Closed` happens once, at shutdown; a closed
/// store keeps serving reads but rejects every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Open,
    Closed,
}

/// What an entity upsert did, so callers can keep secondary indexes in sync.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub id: EntityId,
    /// True when a new node was created (false: merged into an existing one).
    pub created: bool,
    /// The node evicted to make room, if the ceiling was hit.
    pub evicted: Option<Entity>,
}

/// The in-memory knowledge graph: a directed graph of entities and weighted
/// relationships, bounded by the configured node ceiling.
pub struct GraphStore {
    inner: StableDiGraph<Entity, Relationship>,
    /// Entity id -> node index.
    ids: HashMap<EntityId, NodeIndex>,
    /// Canonicalized (source, target, kind) -> edge index.
    edges: HashMap<EdgeKey, EdgeIndex>,
    /// Insertion order of live nodes, for deterministic enumeration/export.
    node_order: Vec<EntityId>,
    /// Insertion order of live edges.
    edge_order: Vec<EdgeKey>,
    /// Document ids already ingested; authoritative for re-ingestion.
    doc_ids: BTreeSet<String>,
    docs_processed: u64,
    config: GraphConfig,
    state: StoreState,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("entities", &self.ids.len())
            .field("relationships", &self.edges.len())
            .field("docs_processed", &self.docs_processed)
            .field("state", &self.state)
            .finish()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(mut config: GraphConfig) -> Self {
        // Configs can arrive from a deserialized snapshot, so the ceiling
        // floor is enforced here too.
        config.max_nodes = config.max_nodes.max(1);
        GraphStore {
            inner: StableDiGraph::new(),
            ids: HashMap::new(),
            edges: HashMap::new(),
            node_order: Vec::new(),
            edge_order: Vec::new(),
            doc_ids: BTreeSet::new(),
            docs_processed: 0,
            config,
            state: StoreState::Open,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == StoreState::Open
    }

    /// Transition `Open → Closed`. Idempotent; reads stay available.
    pub fn close(&mut self) {
        if self.state == StoreState::Open {
            tracing::info!(
                entities = self.ids.len(),
                relationships = self.edges.len(),
                "closing graph store"
            );
            self.state = StoreState::Closed;
        }
    }

    fn check_open(&self) -> Result<(), GraphError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(GraphError::StoreClosed)
        }
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.ids.get(&id).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn relationship(&self, key: &EdgeKey) -> Option<&Relationship> {
        self.edges.get(key).and_then(|&idx| self.inner.edge_weight(idx))
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.node_order.iter().filter_map(move |id| self.entity(*id))
    }

    /// All relationships in insertion order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.edge_order.iter().filter_map(move |key| self.relationship(key))
    }

    /// All relationships incident to an entity, in either direction.
    pub fn relationships_of(&self, id: EntityId) -> Vec<&Relationship> {
        let Some(&idx) = self.ids.get(&id) else {
            return Vec::new();
        };
        let mut incident = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge in self.inner.edges_directed(idx, direction) {
                incident.push(edge.weight());
            }
        }
        incident
    }

    pub fn entity_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of weakly connected components (edge direction ignored).
    /// Stable graphs keep index holes after removals, so this runs the
    /// union-find over the index bound and counts roots of live nodes only.
    pub fn connected_components(&self) -> usize {
        let g = &self.inner;
        let mut sets = UnionFind::new(g.node_bound());
        for edge in g.edge_references() {
            sets.union(g.to_index(edge.source()), g.to_index(edge.target()));
        }
        let mut roots: Vec<usize> = g
            .node_indices()
            .map(|idx| sets.find(g.to_index(idx)))
            .collect();
        roots.sort_unstable();
        roots.dedup();
        roots.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn docs_processed(&self) -> u64 {
        self.docs_processed
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &String> {
        self.doc_ids.iter()
    }

    pub fn contains_doc(&self, doc_id: &str) -> bool {
        self.doc_ids.contains(doc_id)
    }

    // ── Mutations ────────────────────────────────────────────

    /// Record a document before its mentions are processed. Returns `false`
    /// when the document was already ingested; the caller must then skip the
    /// whole mention batch so repeated ingestion never inflates counts.
    pub fn begin_document(&mut self, doc_id: &str) -> Result<bool, GraphError> {
        self.check_open()?;
        if self.doc_ids.contains(doc_id) {
            return Ok(false);
        }
        self.doc_ids.insert(doc_id.to_string());
        self.docs_processed += 1;
        Ok(true)
    }

    /// Create or merge the entity addressed by `key`.
    ///
    /// Merge policy: mention count += 1; document id added to the source set;
    /// confidence = max(existing, new) so a strong detection is never diluted
    /// by later weak ones; context appended with the oldest dropped at the
    /// configured cap. Creating past the node ceiling evicts the single
    /// lowest-ranked node first.
    pub fn upsert_entity(
        &mut self,
        key: &MentionKey,
        display_text: &str,
        confidence: f32,
        doc_id: &str,
        context: &str,
    ) -> Result<UpsertOutcome, GraphError> {
        self.check_open()?;
        let id = key.id();

        if let Some(&idx) = self.ids.get(&id) {
            let cap = self.config.context_cap;
            let node = self
                .inner
                .node_weight_mut(idx)
                .ok_or_else(|| GraphError::invariant(format!("dangling node index for {id:?}")))?;
            if node.label != key.label {
                return Err(GraphError::invariant(format!(
                    "identifier collision: {id:?} holds label {} but mention has label {}",
                    node.label, key.label
                )));
            }
            node.mention_count += 1;
            node.sources.insert(doc_id.to_string());
            if confidence > node.confidence {
                node.confidence = confidence;
            }
            push_context(&mut node.contexts, context, cap);
            return Ok(UpsertOutcome {
                id,
                created: false,
                evicted: None,
            });
        }

        let mut evicted = None;
        if self.ids.len() >= self.config.max_nodes {
            evicted = self.evict_lowest();
        }

        let mut contexts = VecDeque::new();
        push_context(&mut contexts, context, self.config.context_cap);
        let entity = Entity {
            id,
            text: display_text.trim().to_string(),
            label: key.label.clone(),
            confidence,
            mention_count: 1,
            sources: BTreeSet::from([doc_id.to_string()]),
            contexts,
            metadata: HashMap::new(),
        };
        let idx = self.inner.add_node(entity);
        self.ids.insert(id, idx);
        self.node_order.push(id);
        Ok(UpsertOutcome {
            id,
            created: true,
            evicted,
        })
    }

    /// Create or merge the relationship for the canonicalized
    /// (source, target, kind) triple. Repeated observations update one edge:
    /// count += 1 and the weight becomes the running mean of all observed
    /// pairwise weights.
    pub fn upsert_relationship(
        &mut self,
        a: EntityId,
        b: EntityId,
        kind: RelationKind,
        weight: f32,
        context: &str,
    ) -> Result<EdgeKey, GraphError> {
        self.check_open()?;
        if a == b {
            return Err(GraphError::invariant(format!("self-edge on {a:?}")));
        }
        let key = edge_key(a, b, kind);
        let (source, target, kind) = key.clone();
        let source_idx = *self
            .ids
            .get(&source)
            .ok_or_else(|| GraphError::invariant(format!("edge references missing {source:?}")))?;
        let target_idx = *self
            .ids
            .get(&target)
            .ok_or_else(|| GraphError::invariant(format!("edge references missing {target:?}")))?;
        let weight = weight.clamp(0.0, 1.0);

        if let Some(&edge_idx) = self.edges.get(&key) {
            let cap = self.config.context_cap;
            let rel = self
                .inner
                .edge_weight_mut(edge_idx)
                .ok_or_else(|| GraphError::invariant(format!("dangling edge index for {key:?}")))?;
            rel.count += 1;
            rel.weight += (weight - rel.weight) / rel.count as f32;
            push_context(&mut rel.contexts, context, cap);
            return Ok(key);
        }

        let mut contexts = VecDeque::new();
        push_context(&mut contexts, context, self.config.context_cap);
        let rel = Relationship {
            source,
            target,
            kind,
            weight,
            count: 1,
            contexts,
        };
        let edge_idx = self.inner.add_edge(source_idx, target_idx, rel);
        self.edges.insert(key.clone(), edge_idx);
        self.edge_order.push(key.clone());
        Ok(key)
    }

    /// Evict the single lowest-ranked node — rank is ascending
    /// (mention count, then confidence) — together with every incident edge.
    /// Returns the evicted entity.
    pub fn evict_lowest(&mut self) -> Option<Entity> {
        let victim = self
            .entities()
            .min_by(|a, b| {
                a.mention_count
                    .cmp(&b.mention_count)
                    .then(a.confidence.total_cmp(&b.confidence))
            })
            .map(|e| e.id)?;
        let idx = self.ids.remove(&victim)?;
        self.node_order.retain(|id| *id != victim);
        self.edge_order
            .retain(|(s, t, _)| *s != victim && *t != victim);
        self.edges.retain(|(s, t, _), _| *s != victim && *t != victim);
        let entity = self.inner.remove_node(idx);
        if let Some(entity) = &entity {
            tracing::info!(
                text = %entity.text,
                label = %entity.label,
                mentions = entity.mention_count,
                "node ceiling reached, evicted lowest-ranked entity"
            );
        }
        entity
    }

    // ── Snapshot restore (bypasses merge policy, validates invariants) ──

    /// Insert a fully-formed entity during snapshot restore. The id must
    /// recompute from the stored (text, label) pair.
    pub(crate) fn restore_entity(&mut self, entity: Entity) -> Result<(), GraphError> {
        let key = MentionKey::new(&entity.text, &entity.label).ok_or_else(|| {
            GraphError::corrupt(format!("entity {:?} has empty canonical text", entity.id))
        })?;
        if key.id() != entity.id {
            return Err(GraphError::corrupt(format!(
                "entity id {:?} does not recompute from text {:?} and label {:?}",
                entity.id, entity.text, entity.label
            )));
        }
        if self.ids.contains_key(&entity.id) {
            return Err(GraphError::corrupt(format!(
                "duplicate entity id {:?}",
                entity.id
            )));
        }
        if self.ids.len() >= self.config.max_nodes {
            return Err(GraphError::corrupt(format!(
                "snapshot exceeds its own node ceiling of {}",
                self.config.max_nodes
            )));
        }
        let id = entity.id;
        let idx = self.inner.add_node(entity);
        self.ids.insert(id, idx);
        self.node_order.push(id);
        Ok(())
    }

    /// Insert a fully-formed relationship during snapshot restore.
    pub(crate) fn restore_relationship(&mut self, rel: Relationship) -> Result<(), GraphError> {
        let key = rel.key();
        if rel.source == rel.target {
            return Err(GraphError::corrupt(format!("self-edge on {:?}", rel.source)));
        }
        if !rel.kind.is_directional() && rel.source > rel.target {
            return Err(GraphError::corrupt(format!(
                "edge {key:?} is not direction-canonicalized"
            )));
        }
        if self.edges.contains_key(&key) {
            return Err(GraphError::corrupt(format!("duplicate edge {key:?}")));
        }
        let source_idx = *self.ids.get(&rel.source).ok_or_else(|| {
            GraphError::corrupt(format!("edge references unknown entity {:?}", rel.source))
        })?;
        let target_idx = *self.ids.get(&rel.target).ok_or_else(|| {
            GraphError::corrupt(format!("edge references unknown entity {:?}", rel.target))
        })?;
        let edge_idx = self.inner.add_edge(source_idx, target_idx, rel);
        self.edges.insert(key.clone(), edge_idx);
        self.edge_order.push(key);
        Ok(())
    }

    pub(crate) fn restore_documents(&mut self, doc_ids: Vec<String>, docs_processed: u64) {
        self.doc_ids = doc_ids.into_iter().collect();
        self.docs_processed = docs_processed;
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn push_context(contexts: &mut VecDeque<String>, context: &str, cap: usize) {
    if context.is_empty() || cap == 0 {
        return;
    }
    contexts.push_back(clip_context(context));
    while contexts.len() > cap {
        contexts.pop_front();
    }
}
