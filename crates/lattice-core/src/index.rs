//! Secondary entity index for text and label lookup. Thread-safe so query
//! paths never contend with the store writer.

use dashmap::DashMap;

use crate::model::EntityId;
use crate::normalize::normalize;
use crate::store::GraphStore;

/// Maps normalized surface text to entity ids (one per type label) and type
/// labels to their entities. Maintained by the ingest layer alongside store
/// writes; can be rebuilt from a store at any time.
pub struct EntityIndex {
    by_text: DashMap<String, Vec<EntityId>>,
    by_label: DashMap<String, Vec<EntityId>>,
}

impl EntityIndex {
    pub fn new() -> Self {
        EntityIndex {
            by_text: DashMap::new(),
            by_label: DashMap::new(),
        }
    }

    /// Register an entity under its normalized text and label.
    pub fn insert(&self, normalized_text: &str, label: &str, id: EntityId) {
        let mut ids = self.by_text.entry(normalized_text.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        drop(ids);
        let mut ids = self.by_label.entry(label.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// Drop an entity (after eviction).
    pub fn remove(&self, normalized_text: &str, label: &str, id: EntityId) {
        if let Some(mut ids) = self.by_text.get_mut(normalized_text) {
            ids.retain(|other| *other != id);
        }
        if let Some(mut ids) = self.by_label.get_mut(label) {
            ids.retain(|other| *other != id);
        }
    }

    /// All entities whose canonical text normalizes to the same form as
    /// `text`, across every type label.
    pub fn lookup_text(&self, text: &str) -> Vec<EntityId> {
        let Some(normalized) = normalize(text) else {
            return Vec::new();
        };
        self.by_text
            .get(&normalized)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn lookup_label(&self, label: &str) -> Vec<EntityId> {
        self.by_label
            .get(label)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Rebuild the whole index from a store (e.g. after snapshot load).
    pub fn rebuild(&self, store: &GraphStore) {
        self.by_text.clear();
        self.by_label.clear();
        for entity in store.entities() {
            if let Some(normalized) = normalize(&entity.text) {
                self.insert(&normalized, &entity.label, entity.id);
            }
        }
    }
}

impl Default for EntityIndex {
    fn default() -> Self {
        Self::new()
    }
}
