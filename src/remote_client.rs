//! # Remote Service Client
//!
//! Client per il servizio di compressione remoto (API compatibile reSmush.it).
//!
//! ## Flusso:
//! 1. Rifiuta subito file oltre `size_limit` (`AssetTooLarge`)
//! 2. Upload multipart (campo `files`) con `qlty` ed `exif=true` in query
//! 3. Parsing JSON: `error` → `RemoteApiError`, corpo vuoto → `EmptyResponse`
//! 4. Gate: scarica solo se `dest_size < (100 - soglia) / 100 * src_size`
//! 5. Download in un file temporaneo accanto all'originale, poi rename atomico
//!
//! Il client HTTP ha timeout espliciti sia di connessione che di richiesta:
//! i default di reqwest non ne impongono nessuno.

use crate::asset::ImageAsset;
use crate::config::RemoteConfig;
use crate::error::OptimizeError;
use crate::optimizer::result::EngineReport;
use crate::utils::percent_reduction;
use anyhow::Result;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Success or error body returned by the service
#[derive(Debug, Deserialize)]
struct ServiceResponse {
    error: Option<serde_json::Value>,
    src_size: Option<u64>,
    dest_size: Option<u64>,
    #[allow(dead_code)]
    percent: Option<serde_json::Value>,
    dest: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: Client,
    endpoint: Url,
    size_limit: u64,
}

impl RemoteClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("asset-smusher/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let endpoint = Url::parse(&config.endpoint)?;

        Ok(Self {
            http,
            endpoint,
            size_limit: config.size_limit,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Uploads one asset and replaces it with the service's result when the gain is worth it
    pub async fn optimize(
        &self,
        asset: &ImageAsset,
        quality: u8,
        min_gain_percent: u8,
    ) -> Result<EngineReport, OptimizeError> {
        if asset.size > self.size_limit {
            return Err(OptimizeError::AssetTooLarge {
                size: asset.size,
                limit: self.size_limit,
            });
        }

        let start_time = Instant::now();
        let body = tokio::fs::read(&asset.path).await?;
        let local_size = body.len() as u64;

        let part = Part::bytes(body)
            .file_name(asset.basename())
            .mime_str(&format!("image/{}", asset.extension))
            .map_err(|e| OptimizeError::TransportFailure(e.to_string()))?;
        let form = Form::new().part("files", part);

        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("exif", "true".to_string()), ("qlty", quality.to_string())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| OptimizeError::TransportFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OptimizeError::TransportFailure(format!("HTTP status {}", status.as_u16())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| OptimizeError::TransportFailure(e.to_string()))?;
        debug!("Upload of {} answered in {:?}", asset.path.display(), start_time.elapsed());

        let reply = parse_reply(&bytes)?;
        let (src_size, dest_size, dest) = match (reply.src_size, reply.dest_size, reply.dest) {
            (Some(src), Some(dst), Some(dest)) => (src, dst, dest),
            _ => return Err(OptimizeError::EmptyResponse),
        };

        let ceiling = (100 - u64::from(min_gain_percent.min(100))) * src_size / 100;
        if dest_size >= ceiling {
            debug!(
                "Remote result for {} not worth it: {} -> {} bytes",
                asset.path.display(),
                src_size,
                dest_size
            );
            return Ok(EngineReport::unchanged(local_size));
        }

        let downloaded = self.download(&dest).await?;
        let final_size = downloaded.len() as u64;
        if final_size == 0 || final_size >= local_size {
            warn!(
                "Downloaded file for {} is {} bytes, local file is {} bytes: keeping original",
                asset.path.display(),
                final_size,
                local_size
            );
            return Ok(EngineReport::unchanged(local_size));
        }

        replace_atomically(asset, &downloaded).await?;

        Ok(EngineReport {
            src_size: local_size,
            dest_size: final_size,
            percent: percent_reduction(local_size, final_size),
            replaced: true,
            tools: Vec::new(),
        })
    }

    async fn download(&self, dest: &str) -> Result<Vec<u8>, OptimizeError> {
        let url = self
            .endpoint
            .join(dest)
            .map_err(|e| OptimizeError::DownloadFailed(format!("invalid URL {}: {}", dest, e)))?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| OptimizeError::DownloadFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OptimizeError::DownloadFailed(format!("HTTP status {} for {}", status.as_u16(), url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| OptimizeError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn parse_reply(bytes: &[u8]) -> Result<ServiceResponse, OptimizeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(OptimizeError::EmptyResponse);
    }
    let reply: ServiceResponse = serde_json::from_slice(bytes).map_err(|_| OptimizeError::EmptyResponse)?;

    match &reply.error {
        None | Some(serde_json::Value::Null) => Ok(reply),
        Some(serde_json::Value::Number(code)) => Err(OptimizeError::remote_api(code.as_i64().unwrap_or_default())),
        Some(serde_json::Value::String(raw)) => match raw.trim().parse::<i64>() {
            Ok(code) => Err(OptimizeError::remote_api(code)),
            Err(_) => Err(OptimizeError::RemoteApiError {
                code: 0,
                message: raw.clone(),
            }),
        },
        Some(other) => Err(OptimizeError::RemoteApiError {
            code: 0,
            message: other.to_string(),
        }),
    }
}

/// Writes `data` next to the asset and renames it over the original
async fn replace_atomically(asset: &ImageAsset, data: &[u8]) -> Result<(), OptimizeError> {
    let dir = asset
        .path
        .parent()
        .ok_or_else(|| OptimizeError::DownloadFailed(format!("no parent directory for {}", asset.path.display())))?;
    let permissions = tokio::fs::metadata(&asset.path).await?.permissions();

    let temp = tempfile::Builder::new()
        .prefix(".smush-")
        .suffix(&format!(".{}", asset.extension))
        .tempfile_in(dir)
        .map_err(|e| OptimizeError::DownloadFailed(e.to_string()))?
        .into_temp_path();

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&temp)
        .await
        .map_err(|e| OptimizeError::DownloadFailed(e.to_string()))?;
    file.write_all(data)
        .await
        .map_err(|e| OptimizeError::DownloadFailed(e.to_string()))?;
    file.sync_all()
        .await
        .map_err(|e| OptimizeError::DownloadFailed(e.to_string()))?;
    drop(file);

    tokio::fs::set_permissions(&temp, permissions).await?;
    temp.persist(&asset.path)
        .map_err(|e| OptimizeError::DownloadFailed(e.error.to_string()))?;
    Ok(())
}
