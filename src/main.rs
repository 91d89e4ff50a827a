//! Catagen - component catalog generator for the Conduit integration runtime.
//!
//! Thin CLI over the library: loads the configuration and worklist, runs the
//! batch, and writes one resource bundle per (runtime, version) request.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use catagen::{
    ArtifactCoordinate, ArtifactResolver, BatchRunner, CatalogOutcome, CatalogVersionLoader,
    GeneratorConfig, HttpFetcher,
};

/// Component catalog generator for the Conduit integration runtime
#[derive(Parser)]
#[command(name = "catagen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate catalogs for every (runtime, version) in a worklist
    Generate {
        /// Worklist file (YAML sequence of {runtime, version})
        worklist: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "catalog-out")]
        output: PathBuf,

        /// Override the configured concurrency limit
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Resolve a single coordinate and print its transitive closure
    Resolve {
        /// Coordinate as group:name:version
        coordinate: String,
    },

    /// Remove the download cache
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("catagen=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catagen=info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    let resolver = build_resolver(&config)?;

    match cli.command {
        Commands::Generate {
            worklist,
            output,
            concurrency,
        } => {
            let requests = catagen::config::load_worklist(&worklist)
                .with_context(|| format!("failed to load worklist from {}", worklist.display()))?;

            let loader = Arc::new(CatalogVersionLoader::new(
                resolver,
                config.local_artifacts.clone(),
            ));
            let runner = BatchRunner::new(loader)
                .concurrency(concurrency.unwrap_or(config.concurrency))
                .external_schemas(config.external_schemas.clone());

            let outcomes = runner.run(requests).await;
            report(&outcomes, &output)?;
        }
        Commands::Resolve { coordinate } => {
            let coordinate = ArtifactCoordinate::parse(&coordinate)
                .with_context(|| format!("invalid coordinate '{coordinate}', expected group:name:version"))?;
            for artifact in resolver.resolve_transitive(&coordinate).await? {
                println!("{}  {}", artifact.coordinate, artifact.local_path.display());
            }
        }
        Commands::ClearCache => {
            resolver.clear_cache()?;
            println!("Cleared cache at {}", resolver.cache_root().display());
        }
    }

    Ok(())
}

fn build_resolver(config: &GeneratorConfig) -> Result<Arc<ArtifactResolver>> {
    let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
    Ok(Arc::new(ArtifactResolver::new(
        config.repositories.policy(),
        Arc::new(fetcher),
        config.cache_dir.clone(),
        config.augmentation_map(),
    )))
}

/// Write successful bundles to disk and print the per-request summary.
fn report(outcomes: &[CatalogOutcome], output: &Path) -> Result<()> {
    let mut failures = 0usize;

    for outcome in outcomes {
        match &outcome.result {
            Ok(catalog) => {
                let dir = output.join(format!(
                    "{}-{}",
                    catalog.request.runtime, catalog.request.version
                ));
                fs::create_dir_all(&dir)?;

                for name in catalog.bundle.names() {
                    if let Some(content) = catalog.bundle.get(name) {
                        fs::write(dir.join(name), content)?;
                    }
                }
                let provenance = serde_json::to_vec_pretty(&catalog.provenance)?;
                fs::write(dir.join("provenance.json"), provenance)?;

                println!(
                    "ok    {}  ({} resources)",
                    outcome.request,
                    catalog.bundle.len()
                );
            }
            Err(e) => {
                failures += 1;
                println!("fail  {}  {e}", outcome.request);
            }
        }
    }

    println!(
        "{} succeeded, {} failed (of {})",
        outcomes.len() - failures,
        failures,
        outcomes.len()
    );

    if failures > 0 {
        bail!("{failures} of {} catalog versions failed", outcomes.len());
    }
    Ok(())
}
