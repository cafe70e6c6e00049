//! Unit tests for the ingestion layer

use std::sync::Arc;

use lattice_core::{EntityResolver, GraphConfig, Mention};

use crate::extractor::{split_sentences, MentionExtractor};
use crate::gazetteer::{GazetteerEntry, GazetteerExtractor};
use crate::pipeline::IngestService;
use crate::priority::{PriorityRule, TypePriorityTable};

fn mention(text: &str, label: &str, confidence: f32, extractor: &str, sentence: u32) -> Mention {
    Mention {
        doc_id: "doc1".to_string(),
        text: text.to_string(),
        label: label.to_string(),
        confidence,
        extractor: extractor.to_string(),
        sentence,
        context: format!("sentence {sentence}"),
    }
}

fn entry(phrase: &str, label: &str, confidence: f32) -> GazetteerEntry {
    GazetteerEntry {
        phrase: phrase.to_string(),
        label: label.to_string(),
        confidence,
    }
}

#[test]
fn sentences_split_on_terminal_punctuation() {
    let sentences = split_sentences("Turing worked at Bletchley Park. He broke Enigma! Right?");
    let texts: Vec<_> = sentences.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(
        texts,
        ["Turing worked at Bletchley Park", "He broke Enigma", "Right?"]
    );
    assert_eq!(sentences[1].id, 1);
}

#[tokio::test]
async fn gazetteer_matches_word_boundaries_per_sentence() {
    let extractor = GazetteerExtractor::new(
        "gazetteer",
        vec![
            entry("Turing", "PERSON", 0.9),
            entry("Enigma", "PRODUCT", 0.8),
        ],
    )
    .unwrap();

    let text = "Alan Turing studied the Enigma machine. Turingery was named after turing.";
    let mentions = extractor.extract("doc1", text).await.unwrap();

    // "Turingery" must not match; lowercase "turing" must.
    assert_eq!(mentions.len(), 3);
    assert_eq!(mentions[0].text, "Turing");
    assert_eq!(mentions[0].sentence, 0);
    assert_eq!(mentions[1].text, "Enigma");
    assert_eq!(mentions[2].text, "turing");
    assert_eq!(mentions[2].sentence, 1);
    assert!(mentions[0].context.contains("Enigma machine"));
}

#[test]
fn priority_table_relabels_conflicts_by_rule_order() {
    let table = TypePriorityTable::new(vec![
        PriorityRule {
            label: "ORGANIZATION".to_string(),
            extractor: "ner".to_string(),
        },
        PriorityRule {
            label: "PRODUCT".to_string(),
            extractor: "zeroshot".to_string(),
        },
    ]);

    let mut mentions = vec![
        mention("Apple", "PRODUCT", 0.8, "zeroshot", 0),
        mention("Apple", "ORGANIZATION", 0.9, "ner", 0),
        mention("Banana", "FRUIT", 0.9, "zeroshot", 0),
    ];
    table.reconcile(&mut mentions);

    // The first rule matched wins for every competing mention.
    assert_eq!(mentions[0].label, "ORGANIZATION");
    assert_eq!(mentions[1].label, "ORGANIZATION");
    // Unconflicted text is untouched.
    assert_eq!(mentions[2].label, "FRUIT");
}

#[test]
fn priority_table_without_matching_rule_keeps_entities_distinct() {
    let table = TypePriorityTable::new(vec![PriorityRule {
        label: "LOCATION".to_string(),
        extractor: "ner".to_string(),
    }]);

    let mut mentions = vec![
        mention("Apple", "PRODUCT", 0.8, "zeroshot", 0),
        mention("Apple", "ORGANIZATION", 0.9, "ner", 0),
    ];
    table.reconcile(&mut mentions);
    assert_eq!(mentions[0].label, "PRODUCT");
    assert_eq!(mentions[1].label, "ORGANIZATION");
}

#[tokio::test]
async fn cooccurrence_stays_within_sentence_boundaries() {
    let service = IngestService::new(GraphConfig::default());
    let mentions = vec![
        mention("Turing", "PERSON", 0.9, "ner", 0),
        mention("Enigma", "PRODUCT", 0.8, "ner", 0),
        mention("Turing", "PERSON", 0.9, "ner", 1),
        mention("Bletchley Park", "LOCATION", 0.8, "ner", 1),
    ];
    let report = service.ingest_mentions("doc1", mentions).await.unwrap();
    assert_eq!(report.resolved, 4);
    assert_eq!(report.pairs_observed, 2);

    let turing = EntityResolver::identify("Turing", "PERSON").unwrap();
    let enigma = EntityResolver::identify("Enigma", "PRODUCT").unwrap();
    let park = EntityResolver::identify("Bletchley Park", "LOCATION").unwrap();

    assert_eq!(service.relationships_of(turing).await.len(), 2);
    // Enigma and Bletchley Park never co-occur in one sentence: no edge.
    let enigma_rels = service.relationships_of(enigma).await;
    assert_eq!(enigma_rels.len(), 1);
    assert!(enigma_rels
        .iter()
        .all(|r| r.source != park && r.target != park));
}

#[tokio::test]
async fn reingesting_a_document_is_a_noop() {
    let service = IngestService::new(GraphConfig::default());
    let batch = vec![
        mention("Turing", "PERSON", 0.9, "ner", 0),
        mention("Enigma", "PRODUCT", 0.8, "ner", 0),
    ];

    let first = service.ingest_mentions("doc1", batch.clone()).await.unwrap();
    assert!(!first.skipped);

    let second = service.ingest_mentions("doc1", batch).await.unwrap();
    assert!(second.skipped);
    assert_eq!(second.resolved, 0);

    let turing = EntityResolver::identify("Turing", "PERSON").unwrap();
    let entity = service.entity(turing).await.unwrap();
    assert_eq!(entity.mention_count, 1);
    let stats = service.stats().await;
    assert_eq!(stats.docs_processed, 1);
}

#[tokio::test]
async fn low_confidence_mentions_are_filtered_at_ingest() {
    let service = IngestService::new(GraphConfig::default().with_min_confidence(0.5));
    let report = service
        .ingest_mentions(
            "doc1",
            vec![
                mention("Turing", "PERSON", 0.9, "ner", 0),
                mention("Noise", "PERSON", 0.1, "ner", 0),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.filtered, 1);
    assert_eq!(report.resolved, 1);
    assert_eq!(service.stats().await.entities, 1);
}

struct BrokenExtractor;

#[async_trait::async_trait]
impl MentionExtractor for BrokenExtractor {
    fn name(&self) -> &str {
        "broken"
    }

    async fn extract(&self, _doc_id: &str, _text: &str) -> anyhow::Result<Vec<Mention>> {
        anyhow::bail!("model unavailable")
    }
}

#[tokio::test]
async fn failing_extractor_does_not_halt_the_ensemble() {
    let service = IngestService::new(GraphConfig::default());
    let gazetteer = GazetteerExtractor::new(
        "gazetteer",
        vec![
            entry("Turing", "PERSON", 0.9),
            entry("Bletchley Park", "LOCATION", 0.8),
        ],
    )
    .unwrap();
    let extractors: Vec<Arc<dyn MentionExtractor>> =
        vec![Arc::new(BrokenExtractor), Arc::new(gazetteer)];

    let report = service
        .ingest_document(&extractors, "doc1", "Turing worked at Bletchley Park.")
        .await
        .unwrap();
    assert_eq!(report.resolved, 2);
    assert_eq!(report.pairs_observed, 1);
}

#[tokio::test]
async fn snapshot_restores_a_queryable_service() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.snapshot");

    let service = IngestService::new(GraphConfig::default());
    service
        .ingest_mentions(
            "doc1",
            vec![
                mention("Turing", "PERSON", 0.9, "ner", 0),
                mention("Enigma", "PRODUCT", 0.8, "ner", 0),
            ],
        )
        .await
        .unwrap();
    service.save_snapshot(&path).await.unwrap();

    let restored = IngestService::from_snapshot(&path).unwrap();
    let found = restored.find_entities("turing", Some("PERSON")).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text, "Turing");
    // The restored store keeps the re-ingestion guard.
    let report = restored
        .ingest_mentions("doc1", vec![mention("Turing", "PERSON", 0.9, "ner", 0)])
        .await
        .unwrap();
    assert!(report.skipped);
}
