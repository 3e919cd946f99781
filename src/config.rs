//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'ottimizzatore.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con un campo esplicito per ogni modalità
//!   (`auto_engine`, `manual_engine`, `bulk_engine`, ...) invece di chiavi stringa
//! - Definisce `ChainPolicy` (catene di tool per estensione) e `RemoteConfig`
//! - Fornisce validazione dei parametri e valori di default sensati
//! - Supporta caricamento/salvataggio da/verso file JSON
//!
//! ## Parametri principali:
//! - `*_engine`: engine per modalità (`remote` | `local`, default: `remote`)
//! - `*_quality`: qualità JPEG per modalità (1-100, default: 90)
//! - `chain.stop_after_first`: esegue solo il primo tool riuscito (default: true)
//! - `chain.min_gain_percent`: guadagno minimo per riscrivere il file (default: 5)
//! - `remote.size_limit`: limite del servizio remoto (default: 5 MiB)
//! - `content_root` / `templates_dir` / `assets_dir`: cartelle del sito dove cercare
//!   i tool, derivate da `files_root` se non impostate
//!
//! ## Esempio:
//! ```rust
//! use asset_smusher::Config;
//!
//! let mut config = Config::default();
//! config.bulk_quality = 80;
//! config.validate().unwrap();
//! ```

use crate::asset::{Engine, Mode};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default JPEG quality for every mode
pub const DEFAULT_QUALITY: u8 = 90;

/// Every local optimizer the discovery step looks for
pub const KNOWN_TOOLS: &[&str] = &[
    "jpegtran", "jpegoptim", "pngquant", "optipng", "pngcrush", "pngout", "advpng", "gifsicle",
];

/// Actions enabled for auto mode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoActions {
    /// Optimize originals on upload
    pub optimize_originals: bool,
    /// Optimize variations on resize/crop
    pub optimize_variations: bool,
    /// Keep a `.autosmush` copy of uploads
    pub backup: bool,
}

/// What a bulk job enumerates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkActions {
    pub optimize_originals: bool,
    pub optimize_variations: bool,
}

/// Local tool chain policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainPolicy {
    /// Extension -> ordered tool names
    pub chains: BTreeMap<String, Vec<String>>,
    /// true: stop after the first tool that succeeds, false: run the whole chain
    pub stop_after_first: bool,
    /// Continue with the next tool when one fails
    pub ignore_errors: bool,
    /// Results saving less than this percentage are not written back
    pub min_gain_percent: u8,
    /// Per-tool execution timeout
    pub tool_timeout_secs: u64,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        let jpeg = vec!["jpegoptim".to_string(), "jpegtran".to_string()];
        let mut chains = BTreeMap::new();
        chains.insert("jpg".to_string(), jpeg.clone());
        chains.insert("jpeg".to_string(), jpeg);
        chains.insert(
            "png".to_string(),
            vec!["pngquant", "optipng", "pngcrush", "advpng"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        chains.insert("gif".to_string(), vec!["gifsicle".to_string()]);

        Self {
            chains,
            stop_after_first: true,
            ignore_errors: false,
            min_gain_percent: 5,
            tool_timeout_secs: 60,
        }
    }
}

impl ChainPolicy {
    /// Ordered tool names configured for an extension
    pub fn chain_for(&self, extension: &str) -> &[String] {
        self.chains
            .get(&extension.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Remote compression service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    /// Largest upload the service accepts, in bytes
    pub size_limit: u64,
    pub connect_timeout_secs: u64,
    /// Whole-request timeout for upload and download alike
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.resmush.it/ws.php".to_string(),
            size_limit: 5 * 1024 * 1024,
            connect_timeout_secs: 3,
            timeout_secs: 30,
        }
    }
}

/// Configuration for image optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auto_engine: Option<Engine>,
    pub manual_engine: Option<Engine>,
    pub bulk_engine: Option<Engine>,
    pub auto_quality: u8,
    pub manual_quality: u8,
    pub bulk_quality: u8,
    pub auto_actions: AutoActions,
    pub bulk_actions: BulkActions,
    pub chain: ChainPolicy,
    /// Tool name -> option list passed before the image path
    pub tool_options: BTreeMap<String, Vec<String>>,
    /// Extra directories searched for tool executables
    pub tools_search_paths: Vec<PathBuf>,
    pub remote: RemoteConfig,
    /// Root of the per-item storage folders (`<files_root>/<item id>/`)
    pub files_root: PathBuf,
    /// Site root, defaults to the directory holding `site/`
    pub content_root: Option<PathBuf>,
    /// Defaults to `<site>/templates`
    pub templates_dir: Option<PathBuf>,
    /// Defaults to the parent of `files_root`
    pub assets_dir: Option<PathBuf>,
    /// URL prefix used to build asset locators
    pub files_url: String,
    /// File log sink, tracing only when unset
    pub log_file: Option<PathBuf>,
    pub log_max_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_engine: Some(Engine::Remote),
            manual_engine: Some(Engine::Remote),
            bulk_engine: Some(Engine::Remote),
            auto_quality: DEFAULT_QUALITY,
            manual_quality: DEFAULT_QUALITY,
            bulk_quality: DEFAULT_QUALITY,
            auto_actions: AutoActions::default(),
            bulk_actions: BulkActions::default(),
            chain: ChainPolicy::default(),
            tool_options: default_tool_options(),
            tools_search_paths: Vec::new(),
            remote: RemoteConfig::default(),
            files_root: PathBuf::from("site/assets/files"),
            content_root: None,
            templates_dir: None,
            assets_dir: None,
            files_url: "/site/assets/files/".to_string(),
            log_file: None,
            log_max_bytes: 20_000,
        }
    }
}

fn default_tool_options() -> BTreeMap<String, Vec<String>> {
    let mut options = BTreeMap::new();
    options.insert("jpegoptim".to_string(), crate::args!["--preserve", "--all-progressive", "--strip-none", "-T5"]);
    options.insert("jpegtran".to_string(), crate::args!["-optimize", "-progressive", "-copy", "all"]);
    options.insert("pngquant".to_string(), crate::args!["--force", "--ext", ".png"]);
    options.insert("optipng".to_string(), crate::args!["-i0", "-o2", "-quiet", "-preserve"]);
    options.insert("pngcrush".to_string(), crate::args!["-reduce", "-q", "-ow"]);
    options.insert("pngout".to_string(), crate::args!["-s3", "-q", "-y"]);
    options.insert("advpng".to_string(), crate::args!["-z", "-3", "-q"]);
    options.insert("gifsicle".to_string(), crate::args!["-b", "-O3"]);
    options
}

impl Config {
    /// Engine configured for a mode
    pub fn engine_for(&self, mode: Mode) -> Option<Engine> {
        match mode {
            Mode::Auto => self.auto_engine,
            Mode::Manual => self.manual_engine,
            Mode::Bulk => self.bulk_engine,
        }
    }

    /// JPEG quality configured for a mode
    pub fn quality_for(&self, mode: Mode) -> u8 {
        match mode {
            Mode::Auto => self.auto_quality,
            Mode::Manual => self.manual_quality,
            Mode::Bulk => self.bulk_quality,
        }
    }

    /// Directories searched for tools after `PATH`: the configured install
    /// locations, then the content root, templates and assets directories
    pub fn tool_search_dirs(&self) -> Vec<PathBuf> {
        let ancestor = |n: usize| match self.files_root.ancestors().nth(n) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut dirs = self.tools_search_paths.clone();
        dirs.push(self.content_root.clone().unwrap_or_else(|| ancestor(3)));
        dirs.push(self.templates_dir.clone().unwrap_or_else(|| ancestor(2).join("templates")));
        dirs.push(self.assets_dir.clone().unwrap_or_else(|| ancestor(1)));
        dirs
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        for (mode, quality) in [
            (Mode::Auto, self.auto_quality),
            (Mode::Manual, self.manual_quality),
            (Mode::Bulk, self.bulk_quality),
        ] {
            if quality == 0 || quality > 100 {
                return Err(anyhow::anyhow!("JPEG quality for {} mode must be between 1 and 100", mode));
            }
        }

        if self.chain.min_gain_percent >= 100 {
            return Err(anyhow::anyhow!("Minimum gain must be below 100%"));
        }

        if self.chain.tool_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Tool timeout must be greater than 0"));
        }

        if self.remote.timeout_secs == 0 || self.remote.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Remote timeouts must be greater than 0"));
        }

        if self.remote.size_limit == 0 {
            return Err(anyhow::anyhow!("Remote size limit must be greater than 0"));
        }

        reqwest::Url::parse(&self.remote.endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid remote endpoint {}: {}", self.remote.endpoint, e))?;

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert_ok!(config.validate());

        config.manual_quality = 0;
        assert_err!(config.validate());

        config.manual_quality = 80;
        config.chain.min_gain_percent = 100;
        assert_err!(config.validate());

        config.chain.min_gain_percent = 5;
        config.remote.endpoint = "not a url".to_string();
        assert_err!(config.validate());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.engine_for(Mode::Bulk), Some(Engine::Remote));
        assert_eq!(config.quality_for(Mode::Auto), 90);
        assert!(config.chain.stop_after_first);
        assert!(!config.chain.ignore_errors);
        assert_eq!(config.remote.size_limit, 5_242_880);
        assert_eq!(config.chain.chain_for("PNG"), ["pngquant", "optipng", "pngcrush", "advpng"]);
        assert!(config.chain.chain_for("webp").is_empty());
        for tool in KNOWN_TOOLS {
            assert!(config.tool_options.contains_key(*tool), "missing options for {}", tool);
        }
    }

    #[test]
    fn test_tool_search_dirs_follow_files_root() {
        let config = Config {
            tools_search_paths: vec![PathBuf::from("/opt/smush/bin")],
            files_root: PathBuf::from("/var/www/site/assets/files"),
            ..Config::default()
        };
        assert_eq!(
            config.tool_search_dirs(),
            vec![
                PathBuf::from("/opt/smush/bin"),
                PathBuf::from("/var/www"),
                PathBuf::from("/var/www/site/templates"),
                PathBuf::from("/var/www/site/assets"),
            ]
        );

        let relative = Config::default();
        assert_eq!(relative.tool_search_dirs()[0], PathBuf::from("."));

        let explicit = Config {
            content_root: Some(PathBuf::from("/srv/root")),
            templates_dir: Some(PathBuf::from("/srv/tpl")),
            assets_dir: Some(PathBuf::from("/srv/assets")),
            ..Config::default()
        };
        assert_eq!(
            explicit.tool_search_dirs(),
            vec![PathBuf::from("/srv/root"), PathBuf::from("/srv/tpl"), PathBuf::from("/srv/assets")]
        );
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            bulk_engine: Some(Engine::Local),
            manual_engine: None,
            bulk_quality: 75,
            bulk_actions: BulkActions { optimize_originals: true, optimize_variations: true },
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.engine_for(Mode::Bulk), Some(Engine::Local));
        assert_eq!(loaded_config.engine_for(Mode::Manual), None);
        assert_eq!(loaded_config.quality_for(Mode::Bulk), 75);
        assert!(loaded_config.bulk_actions.optimize_variations);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        tokio::fs::write(&config_path, r#"{"auto_engine": "localtools", "chain": {"stop_after_first": false}}"#)
            .await
            .unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.auto_engine, Some(Engine::Local));
        assert!(!config.chain.stop_after_first);
        assert_eq!(config.chain.min_gain_percent, 5);
        assert_eq!(config.manual_quality, DEFAULT_QUALITY);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.bulk_quality, DEFAULT_QUALITY);
    }
}
