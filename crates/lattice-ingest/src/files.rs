//! Extraction-file interchange format
//!
//! JSON files produced by an offline extractor run, one per document, named
//! `<doc>_entities.json`. The graph can be (re)built from a directory of
//! these without re-running any extractor.

use std::path::{Path, PathBuf};

use lattice_core::{clip_context, Mention};
use serde::{Deserialize, Serialize};

pub const EXTRACTION_SUFFIX: &str = "_entities.json";

/// One extracted span as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub text: String,
    pub label: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub extractor: String,
    #[serde(default)]
    pub sentence: u32,
    #[serde(default)]
    pub context: String,
}

fn default_confidence() -> f32 {
    1.0
}

/// One document's extraction results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionFile {
    pub doc_id: String,
    pub entities: Vec<ExtractedEntity>,
}

impl ExtractionFile {
    pub fn into_mentions(self) -> Vec<Mention> {
        let doc_id = self.doc_id;
        self.entities
            .into_iter()
            .map(|e| Mention {
                doc_id: doc_id.clone(),
                text: e.text,
                label: e.label,
                confidence: e.confidence,
                extractor: e.extractor,
                sentence: e.sentence,
                context: clip_context(&e.context),
            })
            .collect()
    }
}

pub fn read_extraction_file(path: &Path) -> anyhow::Result<ExtractionFile> {
    let json = std::fs::read_to_string(path)?;
    let file: ExtractionFile = serde_json::from_str(&json)?;
    Ok(file)
}

pub fn write_extraction_file(dir: &Path, file: &ExtractionFile) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let safe_id: String = file
        .doc_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(100)
        .collect();
    let path = dir.join(format!("{safe_id}{EXTRACTION_SUFFIX}"));
    let json = serde_json::to_string_pretty(file)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// All extraction files in a directory, sorted for deterministic ingest
/// order.
pub fn find_extraction_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(EXTRACTION_SUFFIX))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
