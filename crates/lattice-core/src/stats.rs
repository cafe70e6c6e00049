//! Graph statistics for reporting and export

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::EntityId;
use crate::store::GraphStore;

/// Summary statistics over a graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub entities: usize,
    pub relationships: usize,
    pub docs_processed: u64,
    /// Directed density: edges / (n * (n - 1)).
    pub density: f64,
    pub avg_degree: f64,
    /// Weakly connected components (edge direction ignored).
    pub connected_components: usize,
    /// Entity counts per type label.
    pub label_counts: BTreeMap<String, u64>,
    /// Highest-degree entities, descending.
    pub top_entities: Vec<TopEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopEntity {
    pub text: String,
    pub label: String,
    pub degree: u64,
}

impl GraphStats {
    pub fn collect(store: &GraphStore) -> Self {
        Self::collect_top(store, 10)
    }

    pub fn collect_top(store: &GraphStore, top_n: usize) -> Self {
        let n = store.entity_count();
        let e = store.edge_count();

        let mut degrees: HashMap<EntityId, u64> = HashMap::new();
        for rel in store.relationships() {
            *degrees.entry(rel.source).or_default() += 1;
            *degrees.entry(rel.target).or_default() += 1;
        }

        let mut label_counts: BTreeMap<String, u64> = BTreeMap::new();
        for entity in store.entities() {
            *label_counts.entry(entity.label.clone()).or_default() += 1;
        }

        let mut ranked: Vec<TopEntity> = store
            .entities()
            .map(|entity| TopEntity {
                text: entity.text.clone(),
                label: entity.label.clone(),
                degree: degrees.get(&entity.id).copied().unwrap_or(0),
            })
            .collect();
        ranked.sort_by(|a, b| b.degree.cmp(&a.degree).then(a.text.cmp(&b.text)));
        ranked.truncate(top_n);

        GraphStats {
            entities: n,
            relationships: e,
            docs_processed: store.docs_processed(),
            density: if n > 1 {
                e as f64 / (n as f64 * (n as f64 - 1.0))
            } else {
                0.0
            },
            avg_degree: if n > 0 {
                2.0 * e as f64 / n as f64
            } else {
                0.0
            },
            connected_components: store.connected_components(),
            label_counts,
            top_entities: ranked,
        }
    }
}
