//! Loom CLI
//!
//! Inspect a markdown knowledge base from the command line. Every command
//! prints JSON on stdout; logs go to stderr.
//!
//! Usage:
//!   cargo run --features cli --bin loom -- --root ./kb constellation --focus inst-1
//!   cargo run --features cli --bin loom -- --root ./kb similar inst-1 --limit 3
//!   cargo run --features cli --bin loom -- --root ./kb project --recompute
//!
//! A missing or unreadable embeddings file is logged and treated as empty;
//! structural commands still run.
//!
//! Set `RUST_LOG=loomlib=debug` for pipeline tracing.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use loomlib::{
    compose_constellation, embeddings_or_empty, find_most_similar, semantic_siblings,
    KnowledgeStore, LensId, LensRegistry, LoomConfig, MarkdownStore, ScoredId, Siblings,
    SpatialProjector, ViewRequest,
};

#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Relationship graph and spatial layout for a markdown knowledge base")]
struct Args {
    /// Knowledge base root directory
    #[arg(long, short = 'r', default_value = ".")]
    root: PathBuf,

    /// YAML configuration file
    #[arg(long, short = 'c', env = "LOOM_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify and lay out documents around a focus
    Constellation {
        /// Focus document id (omit for the unfocused circle)
        #[arg(long, short = 'f')]
        focus: Option<String>,

        /// Lens to apply (default, formula, production, lineage, channel,
        /// perspective, incubating, recent, framework, semantic)
        #[arg(long, short = 'l', default_value = "default")]
        lens: LensId,

        #[arg(long, default_value_t = 1200.0)]
        width: f64,

        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },

    /// Related documents for a focus
    Similar {
        /// Focus document id
        id: String,

        /// Number of neighbours (defaults to the configured limit)
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Project embeddings to the unit square
    Project {
        /// Ignore persisted coordinates and recompute
        #[arg(long)]
        recompute: bool,
    },

    /// List available lenses
    Lenses,
}

#[derive(Serialize)]
struct SimilarOutput<'a> {
    focus: &'a str,
    scores: Vec<ScoredId>,
    #[serde(flatten)]
    siblings: Siblings<'a>,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loomlib=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<LoomConfig> {
    match path {
        Some(path) => LoomConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(LoomConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = load_config(args.config.as_ref())?;
    let store = MarkdownStore::new(&args.root);

    match args.command {
        Command::Constellation {
            focus,
            lens,
            width,
            height,
        } => {
            let docs = store
                .all_documents()
                .await
                .with_context(|| format!("Failed to read documents under {}", args.root.display()))?;
            let embeddings = embeddings_or_empty(&store).await;

            let mut request = ViewRequest::new(width, height).lens(lens);
            if let Some(focus) = focus.as_deref() {
                request = request.focus(focus);
            }
            if !embeddings.is_empty() {
                request = request.with_embeddings(&embeddings);
            }

            let view = compose_constellation(&docs, &request, &config.capacity, &config.layout);
            print_json(&view, args.pretty)?;
        }

        Command::Similar { id, limit } => {
            let docs = store
                .all_documents()
                .await
                .with_context(|| format!("Failed to read documents under {}", args.root.display()))?;
            let embeddings = embeddings_or_empty(&store).await;
            let limit = limit.unwrap_or(config.similarity.limit);

            let Some(focus) = docs.iter().find(|d| d.id == id) else {
                bail!("Unknown document id: {}", id);
            };

            let scores = embeddings
                .get(&focus.id)
                .map(|target| {
                    find_most_similar(&focus.id, target, &embeddings, &Default::default(), limit)
                })
                .unwrap_or_default();
            let siblings = semantic_siblings(&docs, focus, &embeddings, limit);

            print_json(
                &SimilarOutput {
                    focus: &focus.id,
                    scores,
                    siblings,
                },
                args.pretty,
            )?;
        }

        Command::Project { recompute } => {
            let mut projector = SpatialProjector::new(config.projection.clone());
            let coords = if recompute {
                projector.recompute(&store).await
            } else {
                projector.coordinates(&store).await
            };
            print_json(&coords, args.pretty)?;
        }

        Command::Lenses => {
            let embeddings = embeddings_or_empty(&store).await;
            let registry = LensRegistry::new().with_embeddings(&embeddings);
            print_json(&registry.all(), args.pretty)?;
        }
    }

    Ok(())
}
