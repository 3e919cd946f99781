//! # Local Chain Runner
//!
//! Esegue i tool di ottimizzazione locali configurati per l'estensione di un
//! asset, in ordine, ognuno sul risultato del precedente.
//!
//! ## Pipeline per asset:
//! 1. **Selezione catena**: `ChainPolicy::chain_for(ext)` filtrata ai tool
//!    con un path risolto (`NoOptimizerAvailable` se vuota)
//! 2. **Copia di lavoro**: il file viene copiato in un temporaneo nella stessa
//!    directory; i tool modificano solo la copia
//! 3. **Esecuzione**: ogni tool gira con le sue opzioni + path della copia,
//!    working directory = directory dell'asset, con timeout
//!    - `stop_after_first = true`: si ferma al primo tool riuscito
//!    - `ignore_errors = true`: un tool fallito passa al successivo
//! 4. **Commit**: la copia sostituisce l'originale con un rename atomico solo
//!    se è più piccola e il guadagno raggiunge `min_gain_percent`
//!
//! ## Tool con output su stdout:
//! `jpegtran` scrive il risultato su stdout; l'output sostituisce la copia.
//!
//! Un tool fallito non lascia mai il file originale modificato.

use crate::asset::ImageAsset;
use crate::config::ChainPolicy;
use crate::error::OptimizeError;
use crate::optimizer::result::EngineReport;
use crate::tool_resolver::{Capabilities, OptimizerCapability};
use crate::utils::percent_reduction;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, warn};

/// Tools that write the optimized image to stdout instead of in place
const STDOUT_TOOLS: &[&str] = &["jpegtran"];

/// Runs the configured chain for one asset
pub async fn run_chain(
    asset: &ImageAsset,
    capabilities: &Capabilities,
    policy: &ChainPolicy,
    quality: u8,
) -> Result<EngineReport, OptimizeError> {
    let chain = policy.chain_for(&asset.extension);
    let tools: Vec<&OptimizerCapability> = capabilities.available_in_order(chain).collect();
    if tools.is_empty() {
        return Err(OptimizeError::NoOptimizerAvailable(asset.extension.clone()));
    }

    let dir = asset
        .path
        .parent()
        .ok_or_else(|| OptimizeError::AssetNotFound(asset.path.display().to_string()))?;
    let original_meta = tokio::fs::metadata(&asset.path).await?;
    let initial_size = original_meta.len();

    let work = working_copy(&asset.path, dir, &asset.extension).await?;

    let mut succeeded: Vec<String> = Vec::new();
    let mut last_error = None;

    for tool in tools {
        match run_tool(tool, &work, dir, quality, policy).await {
            Ok(()) => {
                succeeded.push(tool.name.clone());
                if policy.stop_after_first {
                    break;
                }
            }
            Err(e) if policy.ignore_errors => {
                warn!("{}, trying next tool", e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    if succeeded.is_empty() {
        return Err(last_error.unwrap_or_else(|| OptimizeError::NoOptimizerAvailable(asset.extension.clone())));
    }

    let final_size = tokio::fs::metadata(&work).await?.len();
    let percent = percent_reduction(initial_size, final_size);
    debug!(
        "Chain {:?} on {}: {} -> {} bytes ({}%)",
        succeeded,
        asset.path.display(),
        initial_size,
        final_size,
        percent
    );

    if final_size == 0 || final_size >= initial_size || percent < policy.min_gain_percent {
        debug!("Keeping original {}: gain below {}%", asset.path.display(), policy.min_gain_percent);
        return Ok(EngineReport {
            tools: succeeded,
            ..EngineReport::unchanged(initial_size)
        });
    }

    tokio::fs::set_permissions(&work, original_meta.permissions()).await?;
    work.persist(&asset.path).map_err(|e| OptimizeError::Io(e.error.to_string()))?;

    Ok(EngineReport {
        src_size: initial_size,
        dest_size: final_size,
        percent,
        replaced: true,
        tools: succeeded,
    })
}

/// Copies the asset to a temporary sibling keeping its extension
async fn working_copy(path: &Path, dir: &Path, extension: &str) -> Result<TempPath, OptimizeError> {
    let work = tempfile::Builder::new()
        .prefix(".smush-")
        .suffix(&format!(".{}", extension))
        .tempfile_in(dir)?
        .into_temp_path();
    tokio::fs::copy(path, &work).await?;
    Ok(work)
}

/// Runs one tool on the working copy
async fn run_tool(
    tool: &OptimizerCapability,
    work: &Path,
    dir: &Path,
    quality: u8,
    policy: &ChainPolicy,
) -> Result<(), OptimizeError> {
    let failed = |detail: String| OptimizeError::OptimizerExecutionFailed {
        tool: tool.name.clone(),
        detail,
    };
    let tool_path = tool.path.as_deref().ok_or_else(|| failed("not found".to_string()))?;

    let mut args = tool.options.clone();
    if tool.name == "jpegoptim" {
        args.push(format!("-m{}", quality));
    }
    debug!("Running {:?} {:?} {}", tool_path, args, work.display());

    let start_time = Instant::now();
    let child = Command::new(tool_path)
        .args(&args)
        .arg(work)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    let output = tokio::time::timeout(policy.tool_timeout(), child.wait_with_output())
        .await
        .map_err(|_| failed(format!("timed out after {:?}", policy.tool_timeout())))?
        .map_err(|e| failed(e.to_string()))?;
    let elapsed = start_time.elapsed();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(failed(format!("exit status {} after {:?}: {}", code, elapsed, stderr.trim())));
    }

    if STDOUT_TOOLS.contains(&tool.name.as_str()) {
        if output.stdout.is_empty() {
            return Err(failed("no output on stdout".to_string()));
        }
        tokio::fs::write(work, &output.stdout).await?;
    }

    debug!("{} completed successfully in {:?}", tool.name, elapsed);
    Ok(())
}
