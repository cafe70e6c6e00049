//! Core data structures for the knowledge graph

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// Maximum characters kept per context snippet (clipped on a char boundary).
pub const MAX_CONTEXT_CHARS: usize = 240;

/// Unique, stable identifier for an entity node.
///
/// Derived from the normalized mention text and the type label, so the same
/// surface form with the same type always maps to the same node, from any
/// document, at any time. Stored snapshots re-derive the id at load time as
/// a corruption check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Compute the identifier for a normalized (text, label) pair.
    pub fn compute(normalized_text: &str, label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update(&[0]);
        hasher.update(label.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        EntityId(u64::from_le_bytes(bytes))
    }
}

/// One extractor's raw detection of an entity span in one sentence of one
/// document. Transient input: mentions are owned by the caller and never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mention {
    /// Source document identifier.
    pub doc_id: String,
    /// Raw text span as the extractor produced it.
    pub text: String,
    /// Extractor-assigned type label (e.g. PERSON, ORG).
    pub label: String,
    /// Extractor confidence, nominally in [0, 1]. Out-of-range values are
    /// clamped by the resolver and logged as a data-quality warning.
    pub confidence: f32,
    /// Which extractor produced this mention.
    pub extractor: String,
    /// Sentence index within the document; co-occurrence is scoped to it.
    pub sentence: u32,
    /// Surrounding text, usually the enclosing sentence.
    pub context: String,
}

/// A canonical, deduplicated entity node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    /// Canonical display text: the first-seen raw span, trimmed.
    pub text: String,
    pub label: String,
    /// Aggregated confidence: max across all merged mentions.
    pub confidence: f32,
    pub mention_count: u64,
    /// Document ids this entity was seen in.
    pub sources: BTreeSet<String>,
    /// Most recent context snippets, oldest evicted at the configured cap.
    pub contexts: VecDeque<String>,
    /// Typed extension point for future fields.
    pub metadata: HashMap<String, String>,
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    /// Generic co-occurrence relation (the default). Undirected: endpoint
    /// order is canonicalized with the smaller id first.
    Related,
    /// Caller-supplied relation that is inherently directional; endpoint
    /// order is preserved.
    Directed(String),
}

impl RelationKind {
    pub fn is_directional(&self) -> bool {
        matches!(self, RelationKind::Directed(_))
    }

    pub fn label(&self) -> &str {
        match self {
            RelationKind::Related => "related",
            RelationKind::Directed(label) => label,
        }
    }
}

/// Lookup key for an edge: at most one relationship exists per key.
pub type EdgeKey = (EntityId, EntityId, RelationKind);

/// Canonicalize an endpoint pair into an edge key. Non-directional kinds put
/// the lexicographically smaller id first so repeated observations of the
/// same unordered pair always address the same edge.
pub fn edge_key(a: EntityId, b: EntityId, kind: RelationKind) -> EdgeKey {
    if kind.is_directional() || a <= b {
        (a, b, kind)
    } else {
        (b, a, kind)
    }
}

/// A weighted relationship edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: RelationKind,
    /// Running mean of all observed pairwise weights, in [0, 1].
    pub weight: f32,
    /// How many times this pair has been observed.
    pub count: u64,
    /// Most recent context snippets, same cap/eviction as entities.
    pub contexts: VecDeque<String>,
}

impl Relationship {
    pub fn key(&self) -> EdgeKey {
        (self.source, self.target, self.kind.clone())
    }
}

/// Clip a context snippet to [`MAX_CONTEXT_CHARS`] on a char boundary.
pub fn clip_context(context: &str) -> String {
    if context.chars().count() <= MAX_CONTEXT_CHARS {
        context.to_string()
    } else {
        context.chars().take(MAX_CONTEXT_CHARS).collect()
    }
}
