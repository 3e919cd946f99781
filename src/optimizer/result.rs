//! # Optimization Result
//!
//! Esito strutturato di una singola ottimizzazione. Non viene mai persistito
//! dal core: il chiamante lo logga, lo serializza o lo scarta.

use crate::asset::{Engine, ImageAsset, Mode};
use crate::error::OptimizeError;
use crate::json_output::OptimizeResponse;
use std::path::{Path, PathBuf};

/// What an engine did to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    pub src_size: u64,
    pub dest_size: u64,
    pub percent: u8,
    /// true when the file on disk was replaced
    pub replaced: bool,
    /// Local tools that ran successfully, in order
    pub tools: Vec<String>,
}

impl EngineReport {
    /// File left as it was
    pub fn unchanged(size: u64) -> Self {
        Self {
            src_size: size,
            dest_size: size,
            percent: 0,
            replaced: false,
            tools: Vec::new(),
        }
    }
}

/// Outcome of one `optimize` call
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub error: Option<OptimizeError>,
    pub percent: u8,
    pub src_size: u64,
    pub dest_size: u64,
    pub path: PathBuf,
    pub file: String,
    pub basedir: String,
    /// Locator for display, `<files_url><basedir>/<file>`
    pub url: String,
    pub mode: Mode,
    pub engine: Option<Engine>,
    /// Eligibility gate said no: nothing was attempted
    pub skipped: bool,
    pub replaced: bool,
    pub tools: Vec<String>,
}

impl OptimizationResult {
    fn base(asset: &ImageAsset, mode: Mode, files_url: &str) -> Self {
        Self::at_path(&asset.path, asset.size, mode, files_url)
    }

    fn at_path(path: &Path, size: u64, mode: Mode, files_url: &str) -> Self {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let basedir = path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let url = format!("{}/{}/{}", files_url.trim_end_matches('/'), basedir, file);
        Self {
            error: None,
            percent: 0,
            src_size: size,
            dest_size: size,
            path: path.to_path_buf(),
            file,
            basedir,
            url,
            mode,
            engine: None,
            skipped: false,
            replaced: false,
            tools: Vec::new(),
        }
    }

    /// Sentinel for "nothing to do", not an error
    pub fn noop(asset: &ImageAsset, mode: Mode, files_url: &str) -> Self {
        Self {
            skipped: true,
            ..Self::base(asset, mode, files_url)
        }
    }

    pub fn failed(asset: &ImageAsset, mode: Mode, files_url: &str, engine: Option<Engine>, error: OptimizeError) -> Self {
        Self {
            error: Some(error),
            engine,
            ..Self::base(asset, mode, files_url)
        }
    }

    /// Failure before any asset could be resolved, e.g. an unknown `id,file` key
    pub fn unresolved(path: &Path, mode: Mode, files_url: &str, error: OptimizeError) -> Self {
        Self {
            error: Some(error),
            ..Self::at_path(path, 0, mode, files_url)
        }
    }

    pub fn completed(asset: &ImageAsset, mode: Mode, files_url: &str, engine: Engine, report: EngineReport) -> Self {
        Self {
            engine: Some(engine),
            percent: report.percent,
            src_size: report.src_size,
            dest_size: report.dest_size,
            replaced: report.replaced,
            tools: report.tools,
            ..Self::base(asset, mode, files_url)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Remote API error code, if the service reported one
    pub fn api_error_code(&self) -> Option<i64> {
        self.error.as_ref().and_then(OptimizeError::api_code)
    }

    /// JSON projection used by the per-item optimize interface
    pub fn to_response(&self) -> OptimizeResponse {
        OptimizeResponse {
            error: self.error.as_ref().map(|e| e.to_string()),
            error_api: self
                .error
                .as_ref()
                .filter(|e| e.api_code().is_some())
                .map(|e| e.to_string()),
            percent_new: self.percent.to_string(),
            file: self.file.clone(),
            basedir: self.basedir.clone(),
            url: self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset() -> ImageAsset {
        ImageAsset {
            path: PathBuf::from("/srv/files/1234/a.jpg"),
            extension: "jpg".to_string(),
            size: 2_000_000,
            item_id: 1234,
            is_variation: false,
            original_stem: None,
        }
    }

    #[test]
    fn test_completed_result_response() {
        let report = EngineReport {
            src_size: 2_000_000,
            dest_size: 1_500_000,
            percent: 25,
            replaced: true,
            tools: vec!["jpegoptim".to_string()],
        };
        let result = OptimizationResult::completed(&asset(), Mode::Manual, "/site/assets/files/", Engine::Local, report);
        let response = result.to_response();

        assert!(result.is_success());
        assert_eq!(response.error, None);
        assert_eq!(response.percent_new, "25");
        assert_eq!(response.file, "a.jpg");
        assert_eq!(response.basedir, "1234");
        assert_eq!(response.url, "/site/assets/files/1234/a.jpg");
    }

    #[test]
    fn test_api_error_fills_both_fields() {
        let result = OptimizationResult::failed(
            &asset(),
            Mode::Bulk,
            "/files",
            Some(Engine::Remote),
            OptimizeError::remote_api(403),
        );
        let response = result.to_response();
        assert_eq!(result.api_error_code(), Some(403));
        assert_eq!(response.error, response.error_api);
        assert_eq!(response.percent_new, "0");
    }

    #[test]
    fn test_non_api_error_leaves_error_api_empty() {
        let result = OptimizationResult::failed(&asset(), Mode::Bulk, "/files", None, OptimizeError::EmptyResponse);
        let response = result.to_response();
        assert_eq!(response.error.as_deref(), Some("returned data is empty"));
        assert_eq!(response.error_api, None);
    }

    #[test]
    fn test_unresolved_keeps_locator() {
        let result = OptimizationResult::unresolved(
            Path::new("/srv/files/77/gone.png"),
            Mode::Manual,
            "/site/assets/files/",
            OptimizeError::AssetNotFound("77,gone.png".to_string()),
        );
        let response = result.to_response();
        assert_eq!(response.file, "gone.png");
        assert_eq!(response.basedir, "77");
        assert_eq!(response.error.as_deref(), Some("image not found: 77,gone.png"));
    }

    #[test]
    fn test_noop_is_not_an_error() {
        let result = OptimizationResult::noop(&asset(), Mode::Auto, "/files");
        assert!(result.skipped);
        assert!(result.is_success());
        assert_eq!(result.engine, None);
    }
}
