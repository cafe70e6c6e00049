//! Integration tests for Lattice
//!
//! These tests verify that the ingestion layer and the graph engine work
//! together correctly, end to end.

use std::sync::Arc;

use lattice_core::{snapshot, EntityResolver, GraphConfig, GraphError};
use lattice_ingest::{
    find_extraction_files, read_extraction_file, write_extraction_file, ExtractedEntity,
    ExtractionFile, GazetteerEntry, GazetteerExtractor, IngestService, MentionExtractor,
    PriorityRule, TypePriorityTable,
};

fn extracted(text: &str, label: &str, confidence: f32, sentence: u32) -> ExtractedEntity {
    ExtractedEntity {
        text: text.to_string(),
        label: label.to_string(),
        confidence,
        extractor: "ner".to_string(),
        sentence,
        context: format!("sentence {sentence} mentioning {text}"),
    }
}

/// Extraction files on disk all the way to a restored snapshot.
#[tokio::test]
async fn extraction_files_to_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let entities_dir = dir.path().join("entities");

    write_extraction_file(
        &entities_dir,
        &ExtractionFile {
            doc_id: "Alan Turing".to_string(),
            entities: vec![
                extracted("Alan Turing", "PERSON", 0.6, 0),
                extracted("Bletchley Park", "LOCATION", 0.8, 0),
            ],
        },
    )
    .unwrap();
    write_extraction_file(
        &entities_dir,
        &ExtractionFile {
            doc_id: "Enigma machine".to_string(),
            entities: vec![
                extracted("alan turing", "PERSON", 0.9, 0),
                extracted("Enigma", "PRODUCT", 0.9, 0),
            ],
        },
    )
    .unwrap();

    let files = find_extraction_files(&entities_dir).unwrap();
    assert_eq!(files.len(), 2);

    let service = IngestService::new(GraphConfig::default());
    for path in &files {
        let extraction = read_extraction_file(path).unwrap();
        let doc_id = extraction.doc_id.clone();
        let report = service
            .ingest_mentions(&doc_id, extraction.into_mentions())
            .await
            .unwrap();
        assert!(!report.skipped);
    }

    // The two spellings of Turing merged into one node spanning both docs.
    let turing = service
        .find_entities("Alan Turing", Some("PERSON"))
        .await
        .pop()
        .expect("Turing resolved");
    assert_eq!(turing.mention_count, 2);
    assert_eq!(turing.sources.len(), 2);
    assert_eq!(turing.confidence, 0.9);

    let snapshot_path = dir.path().join("graphs/knowledge_graph.snapshot");
    service.save_snapshot(&snapshot_path).await.unwrap();

    let restored = IngestService::from_snapshot(&snapshot_path).unwrap();
    let stats = restored.stats().await;
    assert_eq!(stats.entities, 3);
    assert_eq!(stats.relationships, 2);
    assert_eq!(stats.docs_processed, 2);
}

/// Articles through the gazetteer ensemble, documents ingested concurrently.
#[tokio::test]
async fn concurrent_gazetteer_ingestion() {
    let gazetteer = GazetteerExtractor::new(
        "gazetteer",
        vec![
            GazetteerEntry {
                phrase: "Alan Turing".to_string(),
                label: "PERSON".to_string(),
                confidence: 0.9,
            },
            GazetteerEntry {
                phrase: "Bletchley Park".to_string(),
                label: "LOCATION".to_string(),
                confidence: 0.8,
            },
            GazetteerEntry {
                phrase: "Enigma".to_string(),
                label: "PRODUCT".to_string(),
                confidence: 0.8,
            },
        ],
    )
    .unwrap();
    let extractors: Arc<Vec<Arc<dyn MentionExtractor>>> = Arc::new(vec![Arc::new(gazetteer)]);

    let service = IngestService::new(GraphConfig::default());
    let documents = [
        ("doc-a", "Alan Turing worked at Bletchley Park. The Enigma fell."),
        ("doc-b", "Alan Turing attacked the Enigma cipher at Bletchley Park."),
        ("doc-c", "Nothing relevant here."),
    ];

    let mut tasks = tokio::task::JoinSet::new();
    for (doc_id, text) in documents {
        let service = service.clone();
        let extractors = Arc::clone(&extractors);
        tasks.spawn(async move {
            service
                .ingest_document(&extractors, doc_id, text)
                .await
                .unwrap()
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let stats = service.stats().await;
    assert_eq!(stats.docs_processed, 3);
    assert_eq!(stats.entities, 3);

    // Turing/Park co-occur in two sentences across the corpus.
    let turing = EntityResolver::identify("Alan Turing", "PERSON").unwrap();
    let park = EntityResolver::identify("Bletchley Park", "LOCATION").unwrap();
    let rels = service.relationships_of(turing).await;
    let to_park = rels
        .iter()
        .find(|r| r.source == park || r.target == park)
        .expect("Turing-Park edge");
    assert_eq!(to_park.count, 2);
}

/// The caller-supplied priority table collapses cross-extractor conflicts
/// before resolution.
#[tokio::test]
async fn priority_table_unifies_cross_extractor_labels() {
    let table = TypePriorityTable::new(vec![PriorityRule {
        label: "ORGANIZATION".to_string(),
        extractor: "ner".to_string(),
    }]);
    let service = IngestService::new(GraphConfig::default()).with_priority_table(table);

    let mentions = vec![
        lattice_core::Mention {
            doc_id: "doc1".to_string(),
            text: "Apple".to_string(),
            label: "ORGANIZATION".to_string(),
            confidence: 0.9,
            extractor: "ner".to_string(),
            sentence: 0,
            context: String::new(),
        },
        lattice_core::Mention {
            doc_id: "doc1".to_string(),
            text: "apple".to_string(),
            label: "PRODUCT".to_string(),
            confidence: 0.7,
            extractor: "zeroshot".to_string(),
            sentence: 0,
            context: String::new(),
        },
    ];
    service.ingest_mentions("doc1", mentions).await.unwrap();

    let stats = service.stats().await;
    assert_eq!(stats.entities, 1);
    let apple = service
        .find_entities("apple", None)
        .await
        .pop()
        .expect("Apple resolved");
    assert_eq!(apple.label, "ORGANIZATION");
    assert_eq!(apple.mention_count, 2);
}

/// A tampered dump is rejected whole, never loaded partially.
#[tokio::test]
async fn tampered_json_dump_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");

    let service = IngestService::new(GraphConfig::default());
    service
        .ingest_mentions(
            "doc1",
            vec![lattice_core::Mention {
                doc_id: "doc1".to_string(),
                text: "Alan Turing".to_string(),
                label: "PERSON".to_string(),
                confidence: 0.9,
                extractor: "ner".to_string(),
                sentence: 0,
                context: String::new(),
            }],
        )
        .await
        .unwrap();
    service.export_json(&path).await.unwrap();

    let json = std::fs::read_to_string(&path).unwrap();
    let tampered = json.replace("Alan Turing", "Alonzo Church");
    std::fs::write(&path, tampered).unwrap();

    let err = snapshot::import_json(&path).unwrap_err();
    assert!(matches!(err, GraphError::SnapshotCorrupt { .. }));
}

/// The node ceiling holds across a whole corpus, not just one call.
#[tokio::test]
async fn capacity_bound_holds_across_documents() {
    let service = IngestService::new(GraphConfig::default().with_max_nodes(4));
    for doc in 0..5 {
        let mentions = (0..3)
            .map(|i| lattice_core::Mention {
                doc_id: format!("doc{doc}"),
                text: format!("Entity {doc}-{i}"),
                label: "THING".to_string(),
                confidence: 0.5,
                extractor: "ner".to_string(),
                sentence: i,
                context: String::new(),
            })
            .collect();
        service
            .ingest_mentions(&format!("doc{doc}"), mentions)
            .await
            .unwrap();
    }
    assert!(service.stats().await.entities <= 4);
}
