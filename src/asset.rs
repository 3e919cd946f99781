//! # Image Asset Module
//!
//! Identità di un singolo file immagine su disco e tipi di base
//! (`Mode`, `Engine`) condivisi da orchestratore, engine e configurazione.

use crate::error::OptimizeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions any engine accepts
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Suffix of the copy kept when uploads are backed up
pub const BACKUP_SUFFIX: &str = ".autosmush";

/// Operating mode of one optimization call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Auto,
    Manual,
    Bulk,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Auto => "auto",
            Mode::Manual => "manual",
            Mode::Bulk => "bulk",
        };
        f.write_str(name)
    }
}

/// Backend used for one optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[serde(alias = "resmushit")]
    Remote,
    #[serde(alias = "localtools")]
    Local,
}

impl Engine {
    /// Prefix used on every log line written by this engine
    pub fn log_label(&self) -> &'static str {
        match self {
            Engine::Remote => "RemoteService",
            Engine::Local => "ServerTools",
        }
    }
}

/// One on-disk image, original or variation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub path: PathBuf,
    /// Lower-cased extension without the dot
    pub extension: String,
    pub size: u64,
    /// Content item owning the file
    pub item_id: u64,
    pub is_variation: bool,
    /// Stem of the original's filename, set for variations
    pub original_stem: Option<String>,
}

impl ImageAsset {
    /// Builds an asset for an original image, reading its size from disk
    pub async fn original(path: impl Into<PathBuf>, item_id: u64) -> Result<Self, OptimizeError> {
        Self::load(path.into(), item_id, None).await
    }

    /// Builds an asset for a variation of `original_name`
    pub async fn variation(
        path: impl Into<PathBuf>,
        item_id: u64,
        original_name: &str,
    ) -> Result<Self, OptimizeError> {
        let stem = original_name
            .split_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(original_name)
            .to_string();
        Self::load(path.into(), item_id, Some(stem)).await
    }

    async fn load(path: PathBuf, item_id: u64, original_stem: Option<String>) -> Result<Self, OptimizeError> {
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|_| OptimizeError::AssetNotFound(path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(OptimizeError::AssetNotFound(path.display().to_string()));
        }

        Ok(Self {
            extension: extension_of(&path),
            size: metadata.len(),
            item_id,
            is_variation: original_stem.is_some(),
            original_stem,
            path,
        })
    }

    /// File name component
    pub fn basename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Name of the storage directory (the item id for per-item folders)
    pub fn basedir(&self) -> String {
        self.path
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// `<path>.autosmush`
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    pub fn has_allowed_extension(&self) -> bool {
        ALLOWED_EXTENSIONS.contains(&self.extension.as_str())
    }
}

/// Lower-cased extension of a path, empty if none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_original_reads_size_and_extension() {
        let dir = TempDir::new().unwrap();
        let item_dir = dir.path().join("1234");
        std::fs::create_dir(&item_dir).unwrap();
        let path = item_dir.join("Photo.JPG");
        std::fs::write(&path, vec![0u8; 300]).unwrap();

        let asset = ImageAsset::original(&path, 1234).await.unwrap();
        assert_eq!(asset.size, 300);
        assert_eq!(asset.extension, "jpg");
        assert!(asset.has_allowed_extension());
        assert!(!asset.is_variation);
        assert_eq!(asset.basename(), "Photo.JPG");
        assert_eq!(asset.basedir(), "1234");
    }

    #[tokio::test]
    async fn test_variation_keeps_original_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.0x260.png");
        std::fs::write(&path, b"png").unwrap();

        let asset = ImageAsset::variation(&path, 7, "photo.png").await.unwrap();
        assert!(asset.is_variation);
        assert_eq!(asset.original_stem.as_deref(), Some("photo"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = ImageAsset::original(dir.path().join("nope.jpg"), 1).await.unwrap_err();
        assert!(matches!(err, OptimizeError::AssetNotFound(_)));
    }

    #[test]
    fn test_mode_serde_names() {
        assert_eq!(serde_json::to_string(&Mode::Bulk).unwrap(), "\"bulk\"");
        let engine: Engine = serde_json::from_str("\"localtools\"").unwrap();
        assert_eq!(engine, Engine::Local);
    }
}
