//! Extractor contract and sentence splitting

use std::sync::OnceLock;

use lattice_core::Mention;
use regex::Regex;

/// The contract the extractor ensemble implements. Extraction may be
/// model-backed and slow; it runs outside the store's write lock and may run
/// concurrently across documents.
#[async_trait::async_trait]
pub trait MentionExtractor: Send + Sync {
    /// Identifier recorded in every mention this extractor produces.
    fn name(&self) -> &str;

    /// Produce the raw mentions for one document. Mentions must carry the
    /// sentence ids from [`split_sentences`] so co-occurrence grouping agrees
    /// across the ensemble.
    async fn extract(&self, doc_id: &str, text: &str) -> anyhow::Result<Vec<Mention>>;
}

/// One sentence of a document, with the id mentions are grouped by.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence {
    pub id: u32,
    pub text: String,
}

fn boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+\s+").expect("sentence boundary regex"))
}

/// Split text into sentences on terminal punctuation followed by whitespace.
/// All extractors share this so sentence ids line up across the ensemble.
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    boundary_re()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(id, s)| Sentence {
            id: id as u32,
            text: s.to_string(),
        })
        .collect()
}
