//! # Asset Smusher - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e del content repository
//! - Avvio del comando richiesto
//!
//! ## Comandi:
//! - `tools`: mostra i tool locali trovati
//! - `optimize <path>`: ottimizza un file in modalità manual
//! - `optimize-key <id,file>`: risolve la chiave e ottimizza
//! - `bulk-page --start N`: un solo step del Bulk Enumerator, in JSON
//! - `bulk`: tutto il job, con progress bar o righe JSON
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-smusher --config smush.json bulk --workers 8 --verbose
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use asset_smusher::{
    progress::ProgressManager, BulkCursor, BulkEnumerator, BulkRunner, Config, ContentRepository,
    DirectoryRepository, Engine, FileLog, ImageAsset, LogSink, ManifestRepository, Mode, OptimizationRequest,
    Optimizer, ToolDiscovery, TracingLog,
};

#[derive(Parser)]
#[command(name = "asset-smusher")]
#[command(about = "Shrink JPEG, PNG and GIF assets with local optimizers or a remote compression service")]
struct Args {
    /// Configuration file (JSON); defaults to the user config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Content manifest (JSON); without it every numeric folder under files_root is an item
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the search path and which optimizers were found
    Tools,

    /// Optimize one file in manual mode
    Optimize {
        path: PathBuf,

        /// Engine to use instead of the configured one (remote | local)
        #[arg(short, long, value_parser = parse_engine)]
        engine: Option<Engine>,

        /// JPEG quality (1-100)
        #[arg(short, long)]
        quality: Option<u8>,
    },

    /// Optimize an asset by "<item id>,<file>" key
    OptimizeKey {
        key: String,

        /// Run in bulk mode instead of manual mode
        #[arg(long)]
        bulk: bool,
    },

    /// Enumerate one bulk page and print it as JSON
    BulkPage {
        #[arg(long, default_value = "0")]
        start: usize,
    },

    /// Optimize every asset of the content tree
    Bulk {
        /// Number of parallel workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Item offset to resume from
        #[arg(long, default_value = "0")]
        start: usize,

        /// Emit JSON lines instead of a progress bar
        #[arg(long)]
        json: bool,
    },
}

fn parse_engine(value: &str) -> Result<Engine, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown engine '{}', expected remote or local", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, stdout is reserved for JSON output
    let default_level = if args.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(args.config.as_deref()).await?;

    match args.command {
        Command::Tools => {
            let capabilities = ToolDiscovery::discover_from_config(&config);
            print!("{}", capabilities.report());
        }

        Command::Optimize { path, engine, quality } => {
            if let Some(engine) = engine {
                config.manual_engine = Some(engine);
            }
            if let Some(quality) = quality {
                config.manual_quality = quality;
            }
            let optimizer = build_optimizer(config)?;

            let item_id = path
                .parent()
                .and_then(|dir| dir.file_name())
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<u64>().ok())
                .unwrap_or_default();
            let asset = ImageAsset::original(&path, item_id).await?;

            let result = optimizer.optimize(OptimizationRequest::forced(asset, Mode::Manual)).await;
            result.to_response().emit();
            if let Some(err) = result.error {
                anyhow::bail!(err);
            }
        }

        Command::OptimizeKey { key, bulk } => {
            let repo = load_repository(args.manifest.as_deref(), &config.files_root).await?;
            let optimizer = build_optimizer(config)?;
            let mode = if bulk { Mode::Bulk } else { Mode::Manual };

            let result = optimizer.optimize_key(repo.as_ref(), &key, mode).await;
            result.to_response().emit();
        }

        Command::BulkPage { start } => {
            let repo = load_repository(args.manifest.as_deref(), &config.files_root).await?;
            let enumerator = BulkEnumerator::new(repo, config.files_root.clone(), config.bulk_actions.clone());

            let step = enumerator.next_page(&BulkCursor::at(start)).await;
            debug!("Next start: {}, done: {}", step.cursor.offset, step.done);
            step.to_message().emit();
        }

        Command::Bulk { workers, start, json } => {
            let repo = load_repository(args.manifest.as_deref(), &config.files_root).await?;
            let optimizer = Arc::new(build_optimizer(config)?);

            let stats = BulkRunner::new(optimizer, repo, workers, json).run(start).await?;
            if !json {
                info!("{}", stats.format_summary());
            }
        }
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
            }
            path.to_path_buf()
        }
        None => match dirs::config_dir() {
            Some(dir) => dir.join("asset-smusher").join("config.json"),
            None => return Ok(Config::default()),
        },
    };

    debug!("Loading configuration from {}", path.display());
    Config::from_file(&path).await
}

fn build_optimizer(config: Config) -> Result<Optimizer> {
    let log: Arc<dyn LogSink> = match &config.log_file {
        Some(path) => Arc::new(FileLog::new(path, config.log_max_bytes)?),
        None => Arc::new(TracingLog),
    };
    let capabilities = ToolDiscovery::discover_from_config(&config);
    Optimizer::new(config, capabilities, log)
}

async fn load_repository(manifest: Option<&Path>, files_root: &Path) -> Result<Arc<dyn ContentRepository>> {
    if let Some(manifest) = manifest {
        return Ok(Arc::new(ManifestRepository::load(manifest).await?));
    }

    if !files_root.is_dir() {
        return Err(anyhow::anyhow!("Files root does not exist: {}", files_root.display()));
    }
    let spinner = ProgressManager::spinner(&format!("Scanning {}", files_root.display()));
    let repo = DirectoryRepository::scan(files_root)?;
    spinner.finish_and_clear();
    Ok(Arc::new(repo))
}
