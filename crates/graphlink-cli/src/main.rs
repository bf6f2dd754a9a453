//! graphlink CLI - link extracted entities to structured graph records.
//!
//! Results are printed to stdout as JSON; logs go to stderr and are
//! controlled with `RUST_LOG` (default `info`).
//!
//! # Configuration
//!
//! `--config FILE` loads a `.toml`, `.json` or `.yaml` file. Without it the
//! configuration comes from the environment (a `.env` file is honoured):
//!
//! - `NEO4J_URI`, `NEO4J_USERNAME`, `NEO4J_PASSWORD` - connect to Neo4j
//! - `GRAPHLINK_GRAPH_PROVIDER`, `GRAPHLINK_GRAPH_URL` - any other store
//! - `GRAPHLINK_SIMILARITY_THRESHOLD`, `GRAPHLINK_METRIC`, ... - resolution tuning

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use graphlink_core::{EntityResolver, GraphLinkConfig, ResolutionStatus};
use graphlink_graph_stores::GraphStoreFactory;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "graphlink")]
#[command(author, version, about = "Entity resolution across knowledge graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (toml, json or yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every entity label into correspondence edges
    Resolve {
        /// Minimum value similarity for an edge
        #[arg(long)]
        similarity: Option<f64>,
        /// Minimum key correlation score
        #[arg(long)]
        key_threshold: Option<f64>,
        /// Remove all existing correspondences first
        #[arg(long)]
        clean: bool,
    },

    /// Remove correspondence edges
    Remove {
        /// Only remove edges from entities with this label
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Per-label resolution statistics
    Stats,

    /// Report ambiguous and low-similarity correspondences
    Validate,

    /// Whole-graph quality report
    Quality,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GraphLinkConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => GraphLinkConfig::from_env().context("invalid environment configuration")?,
    };

    if let Commands::Resolve { clean: true, .. } = &cli.command {
        config.resolution.clean_rebuild = true;
    }

    info!(provider = ?config.graph_store.provider, "connecting to graph store");
    let store = GraphStoreFactory::create(config.graph_store.clone()).await?;
    let resolver = EntityResolver::new(store, config.resolution.clone())?;

    match cli.command {
        Commands::Resolve {
            similarity,
            key_threshold,
            ..
        } => {
            let result = resolver
                .resolve_all(
                    similarity.unwrap_or(config.resolution.similarity_threshold),
                    key_threshold.unwrap_or(config.resolution.key_correlation_threshold),
                )
                .await?;
            print_json(&result)?;
            if result.status == ResolutionStatus::Failed {
                bail!("no label could be resolved");
            }
        }
        Commands::Remove { label } => {
            let removal = resolver
                .remove_existing_correspondences(label.as_deref())
                .await?;
            print_json(&removal)?;
        }
        Commands::Stats => print_json(&resolver.get_resolution_statistics().await?)?,
        Commands::Validate => print_json(&resolver.validate_resolutions().await?)?,
        Commands::Quality => print_json(&resolver.assess_quality().await?)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
