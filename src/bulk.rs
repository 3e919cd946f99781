//! # Bulk Enumerator
//!
//! Attraversamento paginato e riprendibile del content tree: ogni chiamata a
//! `next_page` elabora esattamente un item e restituisce la worklist di quel
//! solo item. Il cursore non accumula immagini delle pagine precedenti.
//!
//! ## Per ogni item:
//! - originali dei campi immagine (anche dentro i repeater, un livello)
//!   se `optimize_originals` è attivo
//! - variazioni trovate tra i file della directory dell'item, tramite
//!   `is_variation`, se `optimize_variations` è attivo
//!
//! ## Progresso:
//! `floor(offset / total * 100)` dopo l'avanzamento; `done` quando
//! `offset >= total`. Con zero item il job è subito concluso a 0%.

use crate::asset::BACKUP_SUFFIX;
use crate::config::BulkActions;
use crate::content::{item_dir, ContentRepository};
use crate::json_output::BulkPageMessage;
use crate::variation::is_variation;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One asset to optimize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub item_id: u64,
    pub file: String,
    pub is_variation: bool,
}

impl WorkItem {
    /// `"<id>,<file>"`
    pub fn key(&self) -> String {
        format!("{},{}", self.item_id, self.file)
    }
}

/// Pagination state of one bulk job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCursor {
    /// Items owning at least one image
    pub total: usize,
    /// Items already enumerated
    pub offset: usize,
    /// Worklist of the last page only
    pub worklist: Vec<WorkItem>,
}

impl BulkCursor {
    /// Cursor resuming at `offset`, e.g. from a polling client's `start`
    pub fn at(offset: usize) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }
}

/// Result of one `next_page` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkStep {
    pub cursor: BulkCursor,
    /// Offset the page was read at, after clamping
    pub page_offset: usize,
    pub progress: u8,
    pub done: bool,
}

impl BulkStep {
    pub fn worklist(&self) -> &[WorkItem] {
        &self.cursor.worklist
    }

    /// Counter text for progress UIs, the percentage sits inside `{}`
    pub fn counter(&self) -> String {
        if self.page_offset < self.cursor.total {
            format!(
                "Processing item {} out of {} - {{{}}}% complete",
                self.page_offset + 1,
                self.cursor.total,
                self.progress
            )
        } else {
            "All done - {100}% complete".to_string()
        }
    }

    pub fn to_message(&self) -> BulkPageMessage {
        BulkPageMessage {
            counter: self.counter(),
            num_batches: self.cursor.total,
            num_images: self.cursor.worklist.len(),
            images: self.cursor.worklist.iter().map(WorkItem::key).collect(),
        }
    }
}

pub struct BulkEnumerator {
    repo: Arc<dyn ContentRepository>,
    files_root: PathBuf,
    actions: BulkActions,
}

impl BulkEnumerator {
    pub fn new(repo: Arc<dyn ContentRepository>, files_root: impl Into<PathBuf>, actions: BulkActions) -> Self {
        Self {
            repo,
            files_root: files_root.into(),
            actions,
        }
    }

    /// Fresh cursor at offset 0
    pub fn start(&self) -> BulkCursor {
        BulkCursor {
            total: self.repo.count_items_with_images(),
            ..BulkCursor::default()
        }
    }

    /// Enumerates the item at `cursor.offset` and advances by one
    pub async fn next_page(&self, cursor: &BulkCursor) -> BulkStep {
        let total = self.repo.count_items_with_images();
        let start = cursor.offset.min(total);

        if total == 0 {
            debug!("No items with images, nothing to enumerate");
            return BulkStep {
                cursor: BulkCursor { total, offset: 0, worklist: Vec::new() },
                page_offset: 0,
                progress: 0,
                done: true,
            };
        }

        let worklist = match self.repo.item_at(start) {
            Some(item) if start < total => self.enumerate(&item.images()).await,
            _ => Vec::new(),
        };

        let offset = (start + 1).min(total);
        let progress = (start * 100 / total) as u8;
        debug!(
            "Bulk page {} of {}: {} assets, {}% complete",
            start + 1,
            total,
            worklist.len(),
            progress
        );

        BulkStep {
            cursor: BulkCursor { total, offset, worklist },
            page_offset: start,
            progress,
            done: offset >= total,
        }
    }

    async fn enumerate(&self, images: &[crate::content::ImageRef]) -> Vec<WorkItem> {
        let mut seen = HashSet::new();
        let mut worklist = Vec::new();
        let mut listings: HashMap<u64, Vec<String>> = HashMap::new();

        for image in images {
            if self.actions.optimize_originals {
                let work = WorkItem {
                    item_id: image.item_id,
                    file: image.file.clone(),
                    is_variation: false,
                };
                if seen.insert(work.key()) {
                    worklist.push(work);
                }
            }

            if self.actions.optimize_variations {
                if !listings.contains_key(&image.item_id) {
                    let dir = item_dir(&self.files_root, image.item_id);
                    listings.insert(image.item_id, list_files(&dir).await);
                }
                let siblings = listings.get(&image.item_id).map(Vec::as_slice).unwrap_or(&[]);

                let variations = siblings
                    .iter()
                    .filter(|name| !name.ends_with(BACKUP_SUFFIX))
                    .filter(|name| is_variation(&image.file, name));
                for sibling in variations {
                    let work = WorkItem {
                        item_id: image.item_id,
                        file: sibling.clone(),
                        is_variation: true,
                    };
                    if seen.insert(work.key()) {
                        worklist.push(work);
                    }
                }
            }
        }

        worklist
    }
}

/// Sorted file names of a directory, empty when it cannot be read
async fn list_files(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", dir.display(), e);
            return names;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                    names.push(name.to_string());
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error listing {}: {}", dir.display(), e);
                break;
            }
        }
    }

    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentField, ContentItem, ManifestRepository};
    use tempfile::TempDir;

    fn item(id: u64, files: &[&str]) -> ContentItem {
        ContentItem {
            id,
            fields: vec![ContentField::Image {
                name: "images".to_string(),
                files: files.iter().map(|f| f.to_string()).collect(),
            }],
        }
    }

    fn both() -> BulkActions {
        BulkActions {
            optimize_originals: true,
            optimize_variations: true,
        }
    }

    fn enumerator(items: Vec<ContentItem>, root: &Path, actions: BulkActions) -> BulkEnumerator {
        BulkEnumerator::new(Arc::new(ManifestRepository::new(items)), root, actions)
    }

    #[tokio::test]
    async fn test_ten_items_finish_after_ten_pages() {
        let root = TempDir::new().unwrap();
        let items = (1..=10).map(|id| item(id, &["a.jpg"])).collect();
        let bulk = enumerator(items, root.path(), both());

        let mut cursor = bulk.start();
        assert_eq!(cursor.total, 10);
        let mut progress = Vec::new();
        let mut counters = Vec::new();
        loop {
            let step = bulk.next_page(&cursor).await;
            assert!(step.cursor.offset > cursor.offset);
            assert_eq!(step.worklist().len(), 1);
            progress.push(step.progress);
            counters.push(step.counter());
            cursor = step.cursor.clone();
            if step.done {
                break;
            }
            assert!(progress.len() < 10);
        }
        assert_eq!(progress, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert_eq!(counters[0], "Processing item 1 out of 10 - {0}% complete");
        assert_eq!(counters[9], "Processing item 10 out of 10 - {90}% complete");

        let finished = bulk.next_page(&cursor).await;
        assert!(finished.done);
        assert_eq!(finished.progress, 100);
        assert_eq!(finished.counter(), "All done - {100}% complete");
    }

    #[tokio::test]
    async fn test_zero_items_is_done_immediately() {
        let root = TempDir::new().unwrap();
        let bulk = enumerator(vec![item(1, &[])], root.path(), both());

        let step = bulk.next_page(&bulk.start()).await;
        assert!(step.done);
        assert_eq!(step.progress, 0);
        assert!(step.worklist().is_empty());
        assert_eq!(step.to_message().num_batches, 0);
    }

    #[tokio::test]
    async fn test_offset_past_total_is_clamped() {
        let root = TempDir::new().unwrap();
        let bulk = enumerator(vec![item(1, &["a.jpg"]), item(2, &["b.jpg"])], root.path(), both());

        let step = bulk.next_page(&BulkCursor::at(57)).await;
        assert!(step.done);
        assert_eq!(step.cursor.offset, 2);
        assert_eq!(step.progress, 100);
        assert!(step.worklist().is_empty());
        assert_eq!(step.counter(), "All done - {100}% complete");
    }

    #[tokio::test]
    async fn test_variations_are_listed_from_item_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("1234");
        std::fs::create_dir(&dir).unwrap();
        for name in ["a.jpg", "a.0x260.jpg", "a.100x100-crop.jpg", "b.jpg", "a.jpg.autosmush"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        let bulk = enumerator(vec![item(1234, &["a.jpg"])], root.path(), both());

        let step = bulk.next_page(&bulk.start()).await;
        let keys: Vec<String> = step.worklist().iter().map(WorkItem::key).collect();
        assert_eq!(keys, vec!["1234,a.jpg", "1234,a.0x260.jpg", "1234,a.100x100-crop.jpg"]);
        assert!(step.worklist()[1].is_variation);
        assert!(!step.worklist()[0].is_variation);

        let message = step.to_message();
        assert_eq!(message.num_images, 3);
        assert_eq!(message.counter, "Processing item 1 out of 1 - {100}% complete");
    }

    #[tokio::test]
    async fn test_only_originals_when_variations_disabled() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("5");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("a.0x260.jpg"), b"x").unwrap();
        let actions = BulkActions {
            optimize_originals: true,
            optimize_variations: false,
        };
        let bulk = enumerator(vec![item(5, &["a.jpg"])], root.path(), actions);

        let step = bulk.next_page(&bulk.start()).await;
        assert_eq!(step.worklist().len(), 1);
        assert_eq!(step.worklist()[0].key(), "5,a.jpg");
    }

    #[tokio::test]
    async fn test_worklist_is_deduplicated() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("9");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("a.50x50.png"), b"x").unwrap();
        // same original in two fields, both matching the same variation
        let repeated = ContentItem {
            id: 9,
            fields: vec![
                ContentField::Image { name: "one".to_string(), files: vec!["a.png".to_string()] },
                ContentField::Image { name: "two".to_string(), files: vec!["a.png".to_string()] },
            ],
        };
        let bulk = enumerator(vec![repeated], root.path(), both());

        let step = bulk.next_page(&bulk.start()).await;
        let keys: Vec<String> = step.worklist().iter().map(WorkItem::key).collect();
        assert_eq!(keys, vec!["9,a.png", "9,a.50x50.png"]);
    }

    #[tokio::test]
    async fn test_repeater_images_use_nested_item_directory() {
        let root = TempDir::new().unwrap();
        let nested_dir = root.path().join("200");
        std::fs::create_dir(&nested_dir).unwrap();
        std::fs::write(nested_dir.join("slide.300x0.png"), b"x").unwrap();
        let page = ContentItem {
            id: 100,
            fields: vec![ContentField::Repeater {
                name: "slides".to_string(),
                items: vec![item(200, &["slide.png"])],
            }],
        };
        let bulk = enumerator(vec![page], root.path(), both());

        let step = bulk.next_page(&bulk.start()).await;
        let keys: Vec<String> = step.worklist().iter().map(WorkItem::key).collect();
        assert_eq!(keys, vec!["200,slide.png", "200,slide.300x0.png"]);
    }
}
