//! # Asset Smusher Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Architettura dei moduli:
//! - `variation`: riconoscimento delle variazioni di un'immagine originale
//! - `tool_resolver`: discovery dei tool di ottimizzazione locali
//! - `local_chain`: esecuzione della catena di tool locali
//! - `remote_client`: client del servizio di compressione remoto
//! - `optimizer`: orchestratore per-asset, lock per path, driver bulk
//! - `bulk`: enumerazione paginata del content tree
//! - `content`: repository dei contenuti (manifest JSON o directory)
//! - `config` / `error` / `log_sink` / `json_output` / `progress` / `utils`
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use asset_smusher::{Config, ImageAsset, Mode, OptimizationRequest, Optimizer, ToolDiscovery, TracingLog};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let capabilities = ToolDiscovery::discover_from_config(&config);
//! let optimizer = Optimizer::new(config, capabilities, Arc::new(TracingLog))?;
//!
//! let asset = ImageAsset::original("site/assets/files/1234/photo.jpg", 1234).await?;
//! let result = optimizer.optimize(OptimizationRequest::forced(asset, Mode::Manual)).await;
//! println!("{}", serde_json::to_string(&result.to_response())?);
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod bulk;
pub mod config;
pub mod content;
pub mod error;
pub mod json_output;
pub mod local_chain;
pub mod log_sink;
pub mod optimizer;
pub mod progress;
pub mod remote_client;
pub mod tool_resolver;
pub mod utils;
pub mod variation;

pub use asset::{Engine, ImageAsset, Mode};
pub use bulk::{BulkCursor, BulkEnumerator, BulkStep, WorkItem};
pub use config::{ChainPolicy, Config};
pub use content::{ContentRepository, DirectoryRepository, ManifestRepository};
pub use error::OptimizeError;
pub use log_sink::{FileLog, LogSink, TracingLog};
pub use optimizer::{BulkRunner, OptimizationRequest, OptimizationResult, Optimizer};
pub use remote_client::RemoteClient;
pub use tool_resolver::{Capabilities, OptimizerCapability, ToolDiscovery};
pub use variation::is_variation;
