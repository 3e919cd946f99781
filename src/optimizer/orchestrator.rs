//! # Optimization Orchestrator
//!
//! Punto d'ingresso per-asset. Per ogni chiamata:
//! 1. **Eligibility**: senza `force` e senza resize registrato → no-op
//! 2. **Estensione**: solo png/jpg/jpeg/gif (`UnsupportedExtension`)
//! 3. **Engine**: quello configurato per la modalità (`NoEngineSelected`)
//! 4. **Dispatch**: Local Chain Runner o Remote Service Client, con lock per path
//! 5. **Log**: una riga sul `LogSink` prima di ritornare, sempre
//!
//! Nessun errore attraversa questo confine: ogni fallimento diventa un
//! `OptimizationResult` con `error` valorizzato.

use crate::asset::{Engine, ImageAsset, Mode};
use crate::config::Config;
use crate::content::{item_dir, locate_asset, parse_key, ContentRepository};
use crate::error::OptimizeError;
use crate::local_chain;
use crate::log_sink::LogSink;
use crate::optimizer::path_locks::PathLocks;
use crate::optimizer::result::{EngineReport, OptimizationResult};
use crate::remote_client::RemoteClient;
use crate::tool_resolver::Capabilities;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One optimization call
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub asset: ImageAsset,
    pub mode: Mode,
    /// Bypass the resize gate
    pub force: bool,
    /// A resize or crop was recorded for this asset in the calling context
    pub resized: bool,
}

impl OptimizationRequest {
    /// Request that always attempts optimization
    pub fn forced(asset: ImageAsset, mode: Mode) -> Self {
        Self {
            asset,
            mode,
            force: true,
            resized: false,
        }
    }

    /// Auto-mode request for a freshly resized variation
    pub fn after_resize(asset: ImageAsset, resized: bool) -> Self {
        Self {
            asset,
            mode: Mode::Auto,
            force: false,
            resized,
        }
    }
}

pub struct Optimizer {
    config: Config,
    capabilities: Capabilities,
    remote: RemoteClient,
    log: Arc<dyn LogSink>,
    locks: PathLocks,
}

impl Optimizer {
    pub fn new(config: Config, capabilities: Capabilities, log: Arc<dyn LogSink>) -> Result<Self> {
        config.validate()?;
        let remote = RemoteClient::new(&config.remote)?;
        Ok(Self {
            config,
            capabilities,
            remote,
            log,
            locks: PathLocks::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub async fn optimize(&self, request: OptimizationRequest) -> OptimizationResult {
        let OptimizationRequest {
            asset,
            mode,
            force,
            resized,
        } = request;
        let files_url = self.config.files_url.as_str();

        if !force && !resized {
            debug!("{} not resized, nothing to do", asset.path.display());
            return OptimizationResult::noop(&asset, mode, files_url);
        }

        if !asset.has_allowed_extension() {
            let err = OptimizeError::UnsupportedExtension(asset.extension.clone());
            self.log
                .save(&format!("({}): Error optimizing {}, {}", mode, asset.path.display(), err));
            return OptimizationResult::failed(&asset, mode, files_url, None, err);
        }

        let Some(engine) = self.config.engine_for(mode) else {
            self.log.save(&format!(
                "No engine selected ({}). {}, source {} bytes",
                mode,
                asset.path.display(),
                asset.size
            ));
            let err = OptimizeError::NoEngineSelected(mode.to_string());
            return OptimizationResult::failed(&asset, mode, files_url, None, err);
        };

        let start_time = Instant::now();
        let outcome = {
            let _guard = self.locks.lock(&asset.path).await;
            self.dispatch(engine, &asset, mode).await
        };
        debug!(
            "{} ({}) finished {} in {:?}",
            engine.log_label(),
            mode,
            asset.path.display(),
            start_time.elapsed()
        );

        match outcome {
            Ok(report) => {
                self.log.save(&format!(
                    "{} ({}): {}, source {} bytes, destination {} bytes, reduction {}%",
                    engine.log_label(),
                    mode,
                    asset.path.display(),
                    report.src_size,
                    report.dest_size,
                    report.percent
                ));
                OptimizationResult::completed(&asset, mode, files_url, engine, report)
            }
            Err(err) => {
                self.log.save(&format!(
                    "{} ({}): Error optimizing {}, {}",
                    engine.log_label(),
                    mode,
                    asset.path.display(),
                    err
                ));
                OptimizationResult::failed(&asset, mode, files_url, Some(engine), err)
            }
        }
    }

    async fn dispatch(&self, engine: Engine, asset: &ImageAsset, mode: Mode) -> Result<EngineReport, OptimizeError> {
        let quality = self.config.quality_for(mode);
        match engine {
            Engine::Local => local_chain::run_chain(asset, &self.capabilities, &self.config.chain, quality).await,
            Engine::Remote => {
                self.remote
                    .optimize(asset, quality, self.config.chain.min_gain_percent)
                    .await
            }
        }
    }

    /// New original uploaded: optional backup, then a forced auto optimization
    pub async fn on_upload(&self, asset: ImageAsset) -> OptimizationResult {
        let actions = &self.config.auto_actions;
        if !actions.optimize_originals || !asset.has_allowed_extension() {
            return OptimizationResult::noop(&asset, Mode::Auto, &self.config.files_url);
        }

        if actions.backup {
            let backup = asset.backup_path();
            match tokio::fs::copy(&asset.path, &backup).await {
                Ok(_) => debug!("Backup written to {}", backup.display()),
                Err(e) => warn!("Failed to back up {}: {}", asset.path.display(), e),
            }
        }

        self.optimize(OptimizationRequest::forced(asset, Mode::Auto)).await
    }

    /// Variation created by a resize or crop
    pub async fn on_resize(&self, asset: ImageAsset, resized: bool) -> OptimizationResult {
        if !self.config.auto_actions.optimize_variations {
            return OptimizationResult::noop(&asset, Mode::Auto, &self.config.files_url);
        }
        self.optimize(OptimizationRequest::after_resize(asset, resized)).await
    }

    /// Original deleted: drops its backup copy, returns whether one existed
    pub async fn on_delete(&self, asset: &ImageAsset) -> bool {
        let backup = asset.backup_path();
        match tokio::fs::remove_file(&backup).await {
            Ok(()) => {
                debug!("Removed backup {}", backup.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove backup {}: {}", backup.display(), e);
                false
            }
        }
    }

    /// Resolves an `"<id>,<file>"` key and runs a forced optimization in `mode`
    pub async fn optimize_key(&self, repo: &dyn ContentRepository, key: &str, mode: Mode) -> OptimizationResult {
        match locate_asset(repo, &self.config.files_root, key).await {
            Ok(asset) => self.optimize(OptimizationRequest::forced(asset, mode)).await,
            Err(err) => {
                self.log.save(&format!("({}): Error optimizing {}, {}", mode, key, err));
                let path = self.key_path(key);
                OptimizationResult::unresolved(&path, mode, &self.config.files_url, err)
            }
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        match parse_key(key) {
            Some((id, file)) => item_dir(&self.config.files_root, id).join(file),
            None => Path::new(key).to_path_buf(),
        }
    }
}
