//! Snapshot codec: durable save/restore of the graph store
//!
//! Three formats:
//! - binary (bincode, versioned): exact restore, the fast path;
//! - GraphML (quick-xml): interchange with graph tooling. GraphML attributes
//!   are primitives only, so set/list fields are flattened to joined strings —
//!   lossy for structure, lossless for content;
//! - JSON: human-debuggable dump of the same record, also loadable.
//!
//! Saves are atomic from an external observer's perspective: the payload is
//! written to a temporary sibling file and published with one rename, so a
//! crash mid-write never leaves a half-written snapshot visible to a load.
//! Every load re-derives each entity id from its stored (text, label) pair
//! and rejects the whole snapshot on any mismatch.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::model::{Entity, Relationship};
use crate::stats::GraphStats;
use crate::store::GraphStore;

const MAGIC: [u8; 4] = *b"LTCE";
const VERSION: u32 = 1;

/// Separator for flattened source-document sets in GraphML.
pub const SOURCES_SEPARATOR: &str = ";";
/// Separator for flattened context lists in GraphML.
pub const CONTEXTS_SEPARATOR: &str = " | ";

/// The on-disk snapshot record.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub magic: [u8; 4],
    pub version: u32,
    pub saved_at: String,
    pub docs_processed: u64,
    pub doc_ids: Vec<String>,
    pub config: GraphConfig,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl SnapshotFile {
    /// Capture the full store state (insertion order preserved).
    pub fn capture(store: &GraphStore) -> Self {
        SnapshotFile {
            magic: MAGIC,
            version: VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            docs_processed: store.docs_processed(),
            doc_ids: store.doc_ids().cloned().collect(),
            config: store.config().clone(),
            entities: store.entities().cloned().collect(),
            relationships: store.relationships().cloned().collect(),
        }
    }

    fn check_header(&self) -> Result<(), GraphError> {
        if self.magic != MAGIC {
            return Err(GraphError::corrupt("bad magic bytes"));
        }
        if self.version != VERSION {
            return Err(GraphError::corrupt(format!(
                "unsupported snapshot version {} (expected {VERSION})",
                self.version
            )));
        }
        Ok(())
    }

    /// Rebuild an `Open` store, validating every invariant. Fails with a
    /// structured error rather than returning a partial graph.
    pub fn restore(self) -> Result<GraphStore, GraphError> {
        self.check_header()?;
        let mut store = GraphStore::with_config(self.config);
        for entity in self.entities {
            store.restore_entity(entity)?;
        }
        for rel in self.relationships {
            store.restore_relationship(rel)?;
        }
        store.restore_documents(self.doc_ids, self.docs_processed);
        Ok(store)
    }
}

/// Write the binary snapshot atomically (temp file + rename).
pub fn save(store: &GraphStore, path: &Path) -> Result<(), GraphError> {
    let snapshot = SnapshotFile::capture(store);
    let bytes = bincode::serialize(&snapshot).map_err(|e| GraphError::Encode(e.to_string()))?;
    write_atomic(path, &bytes)?;
    tracing::info!(
        path = %path.display(),
        entities = snapshot.entities.len(),
        relationships = snapshot.relationships.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Load a binary snapshot into a fresh `Open` store.
pub fn load(path: &Path) -> Result<GraphStore, GraphError> {
    let bytes = fs::read(path)?;
    let snapshot: SnapshotFile =
        bincode::deserialize(&bytes).map_err(|e| GraphError::Decode(e.to_string()))?;
    let store = snapshot.restore()?;
    tracing::info!(
        path = %path.display(),
        entities = store.entity_count(),
        relationships = store.edge_count(),
        "snapshot loaded"
    );
    Ok(store)
}

/// Write the human-debuggable JSON dump (atomic, same record as the binary).
pub fn export_json(store: &GraphStore, path: &Path) -> Result<(), GraphError> {
    let snapshot = SnapshotFile::capture(store);
    let json = serde_json::to_string_pretty(&snapshot)?;
    write_atomic(path, json.as_bytes())?;
    tracing::debug!(path = %path.display(), "json dump written");
    Ok(())
}

/// Load a JSON dump, with the same validation as the binary path.
pub fn import_json(path: &Path) -> Result<GraphStore, GraphError> {
    let json = fs::read_to_string(path)?;
    let snapshot: SnapshotFile = serde_json::from_str(&json)?;
    snapshot.restore()
}

/// Write graph statistics as pretty JSON next to an export.
pub fn export_stats(store: &GraphStore, path: &Path) -> Result<(), GraphError> {
    let stats = GraphStats::collect(store);
    let json = serde_json::to_string_pretty(&stats)?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

/// Export the graph as GraphML. Set/list attributes are flattened to joined
/// strings (`sources` with [`SOURCES_SEPARATOR`], `contexts` with
/// [`CONTEXTS_SEPARATOR`]); non-scalar metadata is dropped.
pub fn export_graphml(store: &GraphStore, path: &Path) -> Result<(), GraphError> {
    use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
    use quick_xml::Writer;

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("graphml");
    root.push_attribute(("xmlns", "http://graphml.graphdrawing.org/xmlns"));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    // Attribute keys. GraphML supports primitives only, hence the flattening.
    let keys: &[(&str, &str, &str, &str)] = &[
        ("g0", "graph", "docs_processed", "long"),
        ("d0", "node", "text", "string"),
        ("d1", "node", "label", "string"),
        ("d2", "node", "confidence", "double"),
        ("d3", "node", "mention_count", "long"),
        ("d4", "node", "sources", "string"),
        ("d5", "node", "contexts", "string"),
        ("e0", "edge", "kind", "string"),
        ("e1", "edge", "weight", "double"),
        ("e2", "edge", "count", "long"),
        ("e3", "edge", "contexts", "string"),
    ];
    for (id, domain, name, ty) in keys {
        let mut key = BytesStart::new("key");
        key.push_attribute(("id", *id));
        key.push_attribute(("for", *domain));
        key.push_attribute(("attr.name", *name));
        key.push_attribute(("attr.type", *ty));
        writer.write_event(Event::Empty(key)).map_err(xml_err)?;
    }

    let mut graph = BytesStart::new("graph");
    graph.push_attribute(("id", "lattice"));
    graph.push_attribute(("edgedefault", "directed"));
    writer.write_event(Event::Start(graph)).map_err(xml_err)?;

    write_data(&mut writer, "g0", &store.docs_processed().to_string())?;

    for entity in store.entities() {
        let mut node = BytesStart::new("node");
        node.push_attribute(("id", node_xml_id(entity.id.0).as_str()));
        writer.write_event(Event::Start(node)).map_err(xml_err)?;
        write_data(&mut writer, "d0", &entity.text)?;
        write_data(&mut writer, "d1", &entity.label)?;
        write_data(&mut writer, "d2", &format!("{}", entity.confidence))?;
        write_data(&mut writer, "d3", &entity.mention_count.to_string())?;
        write_data(
            &mut writer,
            "d4",
            &entity
                .sources
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(SOURCES_SEPARATOR),
        )?;
        write_data(
            &mut writer,
            "d5",
            &entity
                .contexts
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(CONTEXTS_SEPARATOR),
        )?;
        writer
            .write_event(Event::End(BytesEnd::new("node")))
            .map_err(xml_err)?;
    }

    for rel in store.relationships() {
        let mut edge = BytesStart::new("edge");
        edge.push_attribute(("source", node_xml_id(rel.source.0).as_str()));
        edge.push_attribute(("target", node_xml_id(rel.target.0).as_str()));
        writer.write_event(Event::Start(edge)).map_err(xml_err)?;
        write_data(&mut writer, "e0", rel.kind.label())?;
        write_data(&mut writer, "e1", &format!("{}", rel.weight))?;
        write_data(&mut writer, "e2", &rel.count.to_string())?;
        write_data(
            &mut writer,
            "e3",
            &rel.contexts
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(CONTEXTS_SEPARATOR),
        )?;
        writer
            .write_event(Event::End(BytesEnd::new("edge")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("graph")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("graphml")))
        .map_err(xml_err)?;

    write_atomic(path, &writer.into_inner())?;
    tracing::info!(path = %path.display(), "graphml export written");
    Ok(())
}

fn write_data<W: std::io::Write>(
    writer: &mut quick_xml::Writer<W>,
    key: &str,
    value: &str,
) -> Result<(), GraphError> {
    use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
    let mut data = BytesStart::new("data");
    data.push_attribute(("key", key));
    writer.write_event(Event::Start(data)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("data")))
        .map_err(xml_err)?;
    Ok(())
}

/// Suffixes of files this module generates in a data directory.
const ARTIFACT_SUFFIXES: &[&str] = &[".snapshot", ".graphml", ".stats.json"];

/// Remove generated graph artifacts (snapshots, stats, exports, and any
/// `.tmp` leftovers from an interrupted save) from a directory. Other files
/// are left alone. Returns the number of files removed; a missing directory
/// is not an error.
pub fn clear_artifacts(dir: &Path) -> Result<u64, GraphError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let base = name.strip_suffix(".tmp").unwrap_or(name);
        if ARTIFACT_SUFFIXES.iter().any(|s| base.ends_with(s)) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    tracing::info!(dir = %dir.display(), removed, "graph artifacts cleared");
    Ok(removed)
}

fn xml_err<E: std::fmt::Display>(e: E) -> GraphError {
    GraphError::Xml(e.to_string())
}

fn node_xml_id(raw: u64) -> String {
    format!("n{raw:016x}")
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), GraphError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
