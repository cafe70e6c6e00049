//! Mention normalization
//!
//! Canonicalizes a raw extracted span into the comparable key that entity
//! identity is derived from. Pure and total: malformed input never fails,
//! it just normalizes to nothing and the mention is dropped upstream.

use crate::model::EntityId;

/// Normalize a raw span: collapse whitespace runs, trim surrounding
/// whitespace and punctuation, lowercase. Returns `None` when nothing
/// survives normalization.
pub fn normalize(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || is_trim_punct(c));
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn is_trim_punct(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '\u{2018}' | '\u{2019}' | '\u{201c}' | '\u{201d}')
}

/// The normalization key entities are addressed by: normalized text plus the
/// type label. Equal text with different labels is a different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MentionKey {
    pub text: String,
    pub label: String,
}

impl MentionKey {
    /// Build the key for a raw span and type label, or `None` if the span
    /// normalizes to nothing.
    pub fn new(text: &str, label: &str) -> Option<Self> {
        normalize(text).map(|text| MentionKey {
            text,
            label: label.to_string(),
        })
    }

    /// The deterministic entity identifier for this key.
    pub fn id(&self) -> EntityId {
        EntityId::compute(&self.text, &self.label)
    }
}
