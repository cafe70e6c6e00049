//! Dictionary-based extractor
//!
//! Deterministic word-boundary matching against a configured phrase list.
//! Lets the whole pipeline run and be tested without any model dependency;
//! real NER extractors implement the same trait.

use std::path::Path;

use lattice_core::{clip_context, Mention};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractor::{split_sentences, MentionExtractor};

/// One dictionary entry: a phrase to match and the label/confidence its
/// mentions carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub phrase: String,
    pub label: String,
    pub confidence: f32,
}

pub struct GazetteerExtractor {
    name: String,
    entries: Vec<(GazetteerEntry, Regex)>,
}

impl GazetteerExtractor {
    pub fn new(name: impl Into<String>, entries: Vec<GazetteerEntry>) -> anyhow::Result<Self> {
        let compiled = entries
            .into_iter()
            .map(|entry| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(&entry.phrase));
                let re = Regex::new(&pattern)?;
                Ok((entry, re))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(GazetteerExtractor {
            name: name.into(),
            entries: compiled,
        })
    }

    /// Load entries from a JSON file (an array of [`GazetteerEntry`]).
    pub fn from_json_file(name: impl Into<String>, path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let entries: Vec<GazetteerEntry> = serde_json::from_str(&json)?;
        Self::new(name, entries)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait::async_trait]
impl MentionExtractor for GazetteerExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, doc_id: &str, text: &str) -> anyhow::Result<Vec<Mention>> {
        let mut mentions = Vec::new();
        for sentence in split_sentences(text) {
            for (entry, re) in &self.entries {
                for found in re.find_iter(&sentence.text) {
                    mentions.push(Mention {
                        doc_id: doc_id.to_string(),
                        text: found.as_str().to_string(),
                        label: entry.label.clone(),
                        confidence: entry.confidence,
                        extractor: self.name.clone(),
                        sentence: sentence.id,
                        context: clip_context(&sentence.text),
                    });
                }
            }
        }
        tracing::debug!(
            doc = doc_id,
            mentions = mentions.len(),
            "gazetteer extraction finished"
        );
        Ok(mentions)
    }
}
