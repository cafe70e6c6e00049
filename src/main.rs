//! Lattice CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "lattice")]
#[command(about = "Build knowledge graphs from noisy entity-mention streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a graph from extraction files (*_entities.json)
    Build {
        /// Directory containing extraction files
        #[arg(short, long, default_value = "./data/entities")]
        input_dir: PathBuf,

        /// Snapshot file to write
        #[arg(short, long, default_value = "./data/graphs/knowledge_graph.snapshot")]
        output: PathBuf,

        /// Also export GraphML to this path
        #[arg(long)]
        graphml: Option<PathBuf>,

        /// Also export a JSON dump to this path
        #[arg(long)]
        json: Option<PathBuf>,

        /// Node-count ceiling
        #[arg(long, default_value = "1000")]
        max_nodes: usize,

        /// Minimum mention confidence kept at ingest
        #[arg(long, default_value = "0.3")]
        min_confidence: f32,
    },
    /// Extract mentions from article files with a gazetteer and build a graph
    Ingest {
        /// Directory containing article files (*.txt or *.json)
        #[arg(short, long, default_value = "./data/articles")]
        input_dir: PathBuf,

        /// Gazetteer dictionary (JSON array of phrase/label/confidence)
        #[arg(short, long)]
        gazetteer: PathBuf,

        /// Snapshot file to write
        #[arg(short, long, default_value = "./data/graphs/knowledge_graph.snapshot")]
        output: PathBuf,

        /// Node-count ceiling
        #[arg(long, default_value = "1000")]
        max_nodes: usize,

        /// Minimum mention confidence kept at ingest
        #[arg(long, default_value = "0.3")]
        min_confidence: f32,
    },
    /// Print statistics for a snapshot
    Stats {
        /// Snapshot file to read
        #[arg(short, long, default_value = "./data/graphs/knowledge_graph.snapshot")]
        snapshot: PathBuf,
    },
    /// Look up an entity and its relationships
    Query {
        /// Entity text to look up
        text: String,

        /// Restrict to one type label
        #[arg(short, long)]
        label: Option<String>,

        /// Snapshot file to read
        #[arg(short, long, default_value = "./data/graphs/knowledge_graph.snapshot")]
        snapshot: PathBuf,
    },
    /// Re-export a snapshot to interchange formats
    Export {
        /// Snapshot file to read
        #[arg(short, long, default_value = "./data/graphs/knowledge_graph.snapshot")]
        snapshot: PathBuf,

        /// GraphML output path
        #[arg(long)]
        graphml: Option<PathBuf>,

        /// JSON dump output path
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Remove generated graph artifacts (snapshots, stats, exports)
    Clear {
        /// Directory holding generated graph artifacts
        #[arg(short, long, default_value = "./data/graphs")]
        data_dir: PathBuf,
    },
    /// Show version
    Version,
}

/// Filter directives covering the binary and both engine crates; the
/// data-quality and capacity events are emitted from the engine crates.
fn log_directives(level: &str) -> String {
    format!("lattice={level},lattice_core={level},lattice_ingest={level}")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_directives(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Lattice v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Build {
            input_dir,
            output,
            graphml,
            json,
            max_nodes,
            min_confidence,
        } => {
            commands::build(
                input_dir,
                output,
                graphml,
                json,
                max_nodes,
                min_confidence,
            )
            .await
        }
        Commands::Ingest {
            input_dir,
            gazetteer,
            output,
            max_nodes,
            min_confidence,
        } => commands::ingest(input_dir, gazetteer, output, max_nodes, min_confidence).await,
        Commands::Stats { snapshot } => commands::stats(snapshot).await,
        Commands::Query {
            text,
            label,
            snapshot,
        } => commands::query(text, label, snapshot).await,
        Commands::Export {
            snapshot,
            graphml,
            json,
        } => commands::export(snapshot, graphml, json).await,
        Commands::Clear { data_dir } => commands::clear(data_dir),
        Commands::Version => {
            println!("Lattice v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::log_directives;

    #[test]
    fn log_filter_covers_engine_crates() {
        let directives = log_directives("debug");
        assert!(directives.contains("lattice=debug"));
        assert!(directives.contains("lattice_core=debug"));
        assert!(directives.contains("lattice_ingest=debug"));
    }
}
