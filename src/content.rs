//! # Content Repository
//!
//! Modello minimo del content tree dell'host: item con campi immagine e campi
//! repeater (item annidati). Ogni item salva i propri file in
//! `<files_root>/<item id>/`.
//!
//! ## Implementazioni:
//! - `ManifestRepository`: item descritti da un manifest JSON
//! - `DirectoryRepository`: ogni sotto-directory numerica di `files_root` è
//!   un item con un solo campo immagine
//!
//! `locate_asset` risolve una chiave `"<id>,<file>"` in un `ImageAsset`
//! (originale o variazione).

use crate::asset::{extension_of, ImageAsset, ALLOWED_EXTENSIONS};
use crate::error::OptimizeError;
use crate::variation::is_variation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One field of a content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentField {
    /// Image-bearing field, `files` are basenames of originals
    Image { name: String, files: Vec<String> },
    /// Repeating container of nested items
    Repeater { name: String, items: Vec<ContentItem> },
    /// Anything the optimizer does not care about
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    #[serde(default)]
    pub fields: Vec<ContentField>,
}

/// Original image reference: owning item and basename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub item_id: u64,
    pub file: String,
}

impl ImageRef {
    /// `"<id>,<file>"` key used by the bulk interface
    pub fn key(&self) -> String {
        format!("{},{}", self.item_id, self.file)
    }
}

impl ContentItem {
    /// Originals on this item, plus those of repeater items one level down
    pub fn images(&self) -> Vec<ImageRef> {
        let mut images = Vec::new();
        self.collect_images(0, &mut images);
        images
    }

    fn collect_images(&self, level: usize, out: &mut Vec<ImageRef>) {
        for field in &self.fields {
            match field {
                ContentField::Image { files, .. } => out.extend(files.iter().map(|file| ImageRef {
                    item_id: self.id,
                    file: file.clone(),
                })),
                ContentField::Repeater { items, .. } if level == 0 => {
                    for nested in items {
                        nested.collect_images(level + 1, out);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images().is_empty()
    }

    /// Item itself or a repeater item nested under it
    fn find(&self, id: u64) -> Option<&ContentItem> {
        if self.id == id {
            return Some(self);
        }
        self.fields.iter().find_map(|field| match field {
            ContentField::Repeater { items, .. } => items.iter().find_map(|item| item.find(id)),
            _ => None,
        })
    }
}

/// Content tree lookup consumed by the bulk enumerator and by key resolution
pub trait ContentRepository: Send + Sync {
    /// Number of top-level items owning at least one image
    fn count_items_with_images(&self) -> usize;

    /// Item with images at `offset` in a stable order
    fn item_at(&self, offset: usize) -> Option<ContentItem>;

    /// Item by identifier, nested repeater items included
    fn item(&self, id: u64) -> Option<ContentItem>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    items: Vec<ContentItem>,
}

/// Items from a JSON manifest `{"items": [...]}`
#[derive(Debug, Clone)]
pub struct ManifestRepository {
    items: Vec<ContentItem>,
    with_images: Vec<usize>,
}

impl ManifestRepository {
    pub fn new(items: Vec<ContentItem>) -> Self {
        let with_images = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.has_images())
            .map(|(index, _)| index)
            .collect();
        Self { items, with_images }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest: Manifest =
            serde_json::from_str(&content).with_context(|| format!("Invalid manifest {}", path.display()))?;
        Ok(Self::new(manifest.items))
    }
}

impl ContentRepository for ManifestRepository {
    fn count_items_with_images(&self) -> usize {
        self.with_images.len()
    }

    fn item_at(&self, offset: usize) -> Option<ContentItem> {
        self.with_images.get(offset).map(|&index| self.items[index].clone())
    }

    fn item(&self, id: u64) -> Option<ContentItem> {
        self.items.iter().find_map(|item| item.find(id)).cloned()
    }
}

/// Items inferred from `<files_root>/<numeric id>/` directories
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    items: Vec<ContentItem>,
}

impl DirectoryRepository {
    /// Scans `files_root` once; originals are allowed images with exactly one `.` in the name
    pub fn scan(files_root: &Path) -> Result<Self> {
        let mut items = Vec::new();

        for entry in WalkDir::new(files_root).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Failed to scan {}", files_root.display()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().and_then(|name| name.parse::<u64>().ok()) else {
                continue;
            };

            let mut files: Vec<String> = WalkDir::new(entry.path())
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| e.file_name().to_str().map(String::from))
                .filter(|name| is_original_name(name))
                .collect();
            if files.is_empty() {
                continue;
            }
            files.sort();

            items.push(ContentItem {
                id,
                fields: vec![ContentField::Image {
                    name: "images".to_string(),
                    files,
                }],
            });
        }

        items.sort_by_key(|item| item.id);
        debug!("Found {} items with images under {}", items.len(), files_root.display());
        Ok(Self { items })
    }
}

fn is_original_name(name: &str) -> bool {
    name.matches('.').count() == 1
        && !name.starts_with('.')
        && ALLOWED_EXTENSIONS.contains(&extension_of(Path::new(name)).as_str())
}

impl ContentRepository for DirectoryRepository {
    fn count_items_with_images(&self) -> usize {
        self.items.len()
    }

    fn item_at(&self, offset: usize) -> Option<ContentItem> {
        self.items.get(offset).cloned()
    }

    fn item(&self, id: u64) -> Option<ContentItem> {
        self.items.iter().find(|item| item.id == id).cloned()
    }
}

/// Storage directory of one item
pub fn item_dir(files_root: &Path, item_id: u64) -> PathBuf {
    files_root.join(item_id.to_string())
}

/// Splits `"<id>,<file>"`
pub fn parse_key(key: &str) -> Option<(u64, &str)> {
    let (id, file) = key.split_once(',')?;
    let id = id.trim().parse::<u64>().ok().filter(|id| *id > 0)?;
    let file = file.trim();
    // basename only
    if file.is_empty() || file.contains('/') || file.contains('\\') || file == "." || file == ".." {
        return None;
    }
    Some((id, file))
}

/// Resolves a `"<id>,<file>"` key to an original or one of its variations
pub async fn locate_asset(
    repo: &dyn ContentRepository,
    files_root: &Path,
    key: &str,
) -> Result<ImageAsset, OptimizeError> {
    let not_found = || OptimizeError::AssetNotFound(key.to_string());
    let (id, file) = parse_key(key).ok_or_else(not_found)?;
    let item = repo.item(id).ok_or_else(not_found)?;
    let images = item.images();

    let asset = if let Some(original) = images.iter().find(|image| image.item_id == id && image.file == file) {
        ImageAsset::original(item_dir(files_root, original.item_id).join(file), id).await?
    } else {
        let original = images
            .iter()
            .filter(|image| image.item_id == id)
            .find(|image| is_variation(&image.file, file))
            .ok_or_else(not_found)?;
        ImageAsset::variation(item_dir(files_root, id).join(file), id, &original.file).await?
    };

    if asset.size == 0 {
        return Err(OptimizeError::ZeroSize(asset.path.display().to_string()));
    }
    Ok(asset)
}
