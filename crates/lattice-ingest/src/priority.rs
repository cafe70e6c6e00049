//! Cross-extractor type reconciliation
//!
//! When independent extractors tag the same surface text with different type
//! labels, entity identity would split (ids are keyed by text + type). The
//! priority table is the explicit, caller-supplied policy for collapsing such
//! conflicts: an ordered list of (label, preferred extractor) rules, applied
//! to a document's mention set before resolution. No rule matches — the
//! mentions stay distinct entities. The resolver itself never consults this.

use std::collections::HashMap;

use lattice_core::{normalize, Mention};
use serde::{Deserialize, Serialize};

/// "Prefer `label` when it comes from `extractor`."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRule {
    pub label: String,
    pub extractor: String,
}

/// Ordered reconciliation rules; earlier rules win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypePriorityTable {
    rules: Vec<PriorityRule>,
}

impl TypePriorityTable {
    pub fn new(rules: Vec<PriorityRule>) -> Self {
        TypePriorityTable { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Relabel conflicting mentions in place. For each normalized surface
    /// text carrying more than one label, the first rule matched by any of
    /// the competing mentions decides the label for all of them.
    pub fn reconcile(&self, mentions: &mut [Mention]) {
        if self.rules.is_empty() {
            return;
        }

        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, mention) in mentions.iter().enumerate() {
            if let Some(text) = normalize(&mention.text) {
                groups.entry(text).or_default().push(i);
            }
        }

        for (text, indices) in groups {
            let conflicted = indices
                .iter()
                .any(|&i| mentions[i].label != mentions[indices[0]].label);
            if !conflicted {
                continue;
            }
            let winner = self.rules.iter().find(|rule| {
                indices.iter().any(|&i| {
                    mentions[i].label == rule.label && mentions[i].extractor == rule.extractor
                })
            });
            if let Some(rule) = winner {
                tracing::debug!(
                    text = %text,
                    label = %rule.label,
                    extractor = %rule.extractor,
                    "type conflict reconciled by priority rule"
                );
                for &i in &indices {
                    mentions[i].label = rule.label.clone();
                }
            }
        }
    }
}
