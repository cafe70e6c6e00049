//! Lattice Ingest — the document ingestion layer: extractor contract,
//! dictionary extractor, extraction-file interchange, type-priority
//! reconciliation, and the single-writer ingest service.

pub mod extractor;
pub mod files;
pub mod gazetteer;
pub mod pipeline;
pub mod priority;

#[cfg(test)]
mod tests;

pub use extractor::{split_sentences, MentionExtractor, Sentence};
pub use files::{
    find_extraction_files, read_extraction_file, write_extraction_file, ExtractedEntity,
    ExtractionFile, EXTRACTION_SUFFIX,
};
pub use gazetteer::{GazetteerEntry, GazetteerExtractor};
pub use pipeline::{EngineState, IngestReport, IngestService, IngestTotals};
pub use priority::{PriorityRule, TypePriorityTable};
