use anyhow::Context;
use clap::{Parser, Subcommand};
use featsim::{ingest_jsonl, open_catalog, AppConfig, CatalogBackend, RestApi, SimilarityPipeline};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Feature-weighted pairwise similarity for metadata catalogs
#[derive(Parser, Debug)]
#[command(name = "featsim")]
#[command(about = "Feature-weighted pairwise similarity for metadata catalogs", long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// LMDB catalog directory, overrides the configured backend
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load metadata records from a JSON Lines file
    Load { path: PathBuf },
    /// Rebuild every similarity pair
    Run,
    /// Concepts most similar to ID
    Similar {
        id: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Per-feature breakdown of the pair (A, B)
    Explain { a: String, b: String },
    /// Serve the REST API
    Serve {
        #[arg(long)]
        http_port: Option<u16>,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(data_dir) = &args.data_dir {
        config.catalog = CatalogBackend::Lmdb {
            path: data_dir.clone(),
        };
    }

    info!("Starting featsim v{}", env!("CARGO_PKG_VERSION"));
    let gateway = open_catalog(&config.catalog)?;

    match args.command {
        Command::Load { path } => {
            let file = File::open(&path).with_context(|| format!("cannot open {:?}", path))?;
            let report = ingest_jsonl(gateway, &config.pipeline, BufReader::new(file))?;
            print_json(&report)?;
        }
        Command::Run => {
            let pipeline = SimilarityPipeline::new(config.pipeline, gateway)?;
            let report = tokio::task::spawn_blocking(move || pipeline.run()).await??;
            print_json(&report)?;
        }
        Command::Similar { id, limit } => {
            let pipeline = SimilarityPipeline::new(config.pipeline, gateway)?;
            print_json(&pipeline.similar_to(&id, limit)?)?;
        }
        Command::Explain { a, b } => {
            let pipeline = SimilarityPipeline::new(config.pipeline, gateway)?;
            match pipeline.explain(&a, &b)? {
                Some(explanation) => print_json(&explanation)?,
                None => anyhow::bail!("pair ({}, {}) not found", a, b),
            }
        }
        Command::Serve { http_port } => {
            let pipeline = Arc::new(SimilarityPipeline::new(config.pipeline, gateway)?);
            let http_port = http_port.unwrap_or(config.http_port);

            let http_handle = std::thread::spawn(move || {
                info!("Starting HTTP server on port {}", http_port);
                let sys = actix_web::rt::System::new();
                sys.block_on(async {
                    if let Err(e) = RestApi::start(pipeline, http_port).await {
                        tracing::error!("HTTP server error: {}", e);
                    }
                })
            });
            info!("HTTP API: http://localhost:{}/", http_port);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
                _ = tokio::task::spawn_blocking(move || {
                    http_handle.join().ok();
                }) => {
                    info!("HTTP server stopped");
                }
            }
            info!("Shutting down...");
        }
    }

    Ok(())
}
