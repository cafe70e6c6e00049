//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use lattice_core::GraphConfig;
use lattice_ingest::{
    find_extraction_files, read_extraction_file, GazetteerExtractor, IngestService,
    MentionExtractor,
};

/// Build a graph from a directory of `*_entities.json` extraction files.
pub async fn build(
    input_dir: PathBuf,
    output: PathBuf,
    graphml: Option<PathBuf>,
    json: Option<PathBuf>,
    max_nodes: usize,
    min_confidence: f32,
) -> anyhow::Result<()> {
    let files = find_extraction_files(&input_dir)
        .with_context(|| format!("reading {}", input_dir.display()))?;
    if files.is_empty() {
        anyhow::bail!(
            "no extraction files found in {} (run an extractor first)",
            input_dir.display()
        );
    }
    tracing::info!(files = files.len(), "building graph from extractions");

    let config = GraphConfig::default()
        .with_max_nodes(max_nodes)
        .with_min_confidence(min_confidence);
    let service = IngestService::new(config);

    for path in &files {
        let extraction = read_extraction_file(path)
            .with_context(|| format!("reading extraction file {}", path.display()))?;
        let doc_id = extraction.doc_id.clone();
        service
            .ingest_mentions(&doc_id, extraction.into_mentions())
            .await
            .with_context(|| format!("ingesting {doc_id}"))?;
    }

    finish(&service, &output, graphml, json).await
}

/// An article file as produced by the document-fetching layer.
#[derive(serde::Deserialize)]
struct ArticleFile {
    title: String,
    content: String,
}

/// Run the gazetteer extractor over a directory of article files and build a
/// graph. Extraction runs concurrently per document; only the merge into the
/// store is serialized.
pub async fn ingest(
    input_dir: PathBuf,
    gazetteer: PathBuf,
    output: PathBuf,
    max_nodes: usize,
    min_confidence: f32,
) -> anyhow::Result<()> {
    let extractor = GazetteerExtractor::from_json_file("gazetteer", &gazetteer)
        .with_context(|| format!("loading gazetteer {}", gazetteer.display()))?;
    tracing::info!(entries = extractor.entry_count(), "gazetteer loaded");
    let extractors: Arc<Vec<Arc<dyn MentionExtractor>>> = Arc::new(vec![Arc::new(extractor)]);

    let mut documents = Vec::new();
    for entry in std::fs::read_dir(&input_dir)
        .with_context(|| format!("reading {}", input_dir.display()))?
    {
        let path = entry?.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("txt") => {
                let doc_id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                let text = std::fs::read_to_string(&path)?;
                documents.push((doc_id, text));
            }
            Some("json") => {
                let json = std::fs::read_to_string(&path)?;
                let article: ArticleFile = serde_json::from_str(&json)
                    .with_context(|| format!("parsing article {}", path.display()))?;
                documents.push((article.title, article.content));
            }
            _ => {}
        }
    }
    if documents.is_empty() {
        anyhow::bail!("no article files found in {}", input_dir.display());
    }
    documents.sort_by(|a, b| a.0.cmp(&b.0));
    tracing::info!(documents = documents.len(), "ingesting articles");

    let config = GraphConfig::default()
        .with_max_nodes(max_nodes)
        .with_min_confidence(min_confidence);
    let service = IngestService::new(config);

    let mut tasks = tokio::task::JoinSet::new();
    for (doc_id, text) in documents {
        let service = service.clone();
        let extractors = Arc::clone(&extractors);
        tasks.spawn(async move {
            service
                .ingest_document(&extractors, &doc_id, &text)
                .await
                .with_context(|| format!("ingesting {doc_id}"))
        });
    }
    while let Some(result) = tasks.join_next().await {
        result??;
    }

    finish(&service, &output, None, None).await
}

async fn finish(
    service: &IngestService,
    output: &PathBuf,
    graphml: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    service.save_snapshot(output).await?;
    let stats_path = output.with_extension("stats.json");
    service.export_stats(&stats_path).await?;
    if let Some(path) = graphml {
        service.export_graphml(&path).await?;
    }
    if let Some(path) = json {
        service.export_json(&path).await?;
    }

    let stats = service.stats().await;
    let totals = service.totals().await;
    tracing::info!(
        entities = stats.entities,
        relationships = stats.relationships,
        docs = stats.docs_processed,
        rejected = totals.rejected,
        clamped = totals.clamped,
        "graph built"
    );
    println!(
        "Graph built: {} entities, {} relationships from {} documents",
        stats.entities, stats.relationships, stats.docs_processed
    );
    println!("Snapshot: {}", output.display());
    Ok(())
}

pub async fn stats(snapshot: PathBuf) -> anyhow::Result<()> {
    let service = IngestService::from_snapshot(&snapshot)?;
    let stats = service.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn query(text: String, label: Option<String>, snapshot: PathBuf) -> anyhow::Result<()> {
    let service = IngestService::from_snapshot(&snapshot)?;
    let entities = service.find_entities(&text, label.as_deref()).await;
    if entities.is_empty() {
        println!("No entity found for {text:?}");
        return Ok(());
    }

    for entity in entities {
        println!(
            "{} [{}]  confidence {:.2}, {} mentions, {} sources",
            entity.text,
            entity.label,
            entity.confidence,
            entity.mention_count,
            entity.sources.len()
        );
        for rel in service.relationships_of(entity.id).await {
            let other_id = if rel.source == entity.id {
                rel.target
            } else {
                rel.source
            };
            let other = service
                .entity(other_id)
                .await
                .map(|e| format!("{} [{}]", e.text, e.label))
                .unwrap_or_else(|| format!("{other_id:?}"));
            println!(
                "  -- {} --> {}  (weight {:.2}, seen {}x)",
                rel.kind.label(),
                other,
                rel.weight,
                rel.count
            );
        }
    }
    Ok(())
}

/// Remove the generated graph artifacts under a data directory.
pub fn clear(data_dir: PathBuf) -> anyhow::Result<()> {
    let removed = lattice_core::snapshot::clear_artifacts(&data_dir)
        .with_context(|| format!("clearing {}", data_dir.display()))?;
    println!(
        "Removed {removed} graph artifact(s) from {}",
        data_dir.display()
    );
    Ok(())
}

pub async fn export(
    snapshot: PathBuf,
    graphml: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    if graphml.is_none() && json.is_none() {
        anyhow::bail!("nothing to export: pass --graphml and/or --json");
    }
    let service = IngestService::from_snapshot(&snapshot)?;
    if let Some(path) = graphml {
        service.export_graphml(&path).await?;
        println!("GraphML: {}", path.display());
    }
    if let Some(path) = json {
        service.export_json(&path).await?;
        println!("JSON dump: {}", path.display());
    }
    Ok(())
}
