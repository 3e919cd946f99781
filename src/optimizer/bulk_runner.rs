//! # Bulk Runner
//!
//! Driver cooperativo per il comando `bulk`: chiama `next_page` finché il
//! job non è concluso e ottimizza ogni worklist con al massimo `workers`
//! task concorrenti. Un errore su un asset non interrompe il job.

use crate::asset::Mode;
use crate::bulk::{BulkCursor, BulkEnumerator};
use crate::content::ContentRepository;
use crate::json_output::JsonMessage;
use crate::optimizer::orchestrator::Optimizer;
use crate::optimizer::result::OptimizationResult;
use crate::progress::{OptimizationStats, ProgressManager};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct BulkRunner {
    optimizer: Arc<Optimizer>,
    repo: Arc<dyn ContentRepository>,
    workers: usize,
    json_output: bool,
}

impl BulkRunner {
    pub fn new(optimizer: Arc<Optimizer>, repo: Arc<dyn ContentRepository>, workers: usize, json_output: bool) -> Self {
        Self {
            optimizer,
            repo,
            workers: workers.max(1),
            json_output,
        }
    }

    /// Walks every page starting at `start` and returns aggregate statistics
    pub async fn run(&self, start: usize) -> Result<OptimizationStats> {
        let start_time = Instant::now();
        let config = self.optimizer.config();
        let enumerator = BulkEnumerator::new(self.repo.clone(), config.files_root.clone(), config.bulk_actions.clone());

        let mut cursor = BulkCursor::at(start);
        let total = self.repo.count_items_with_images();
        let mut stats = OptimizationStats::new();

        if self.json_output {
            JsonMessage::Start {
                total_items: total,
                engine: config.engine_for(Mode::Bulk).map(|e| e.log_label().to_string()),
                workers: self.workers,
            }
            .emit();
        } else {
            info!("Starting bulk optimization of {} items with {} workers", total, self.workers);
        }

        if total == 0 {
            if self.json_output {
                JsonMessage::error("No items with images found".to_string(), None).emit();
            } else {
                warn!("No items with images found");
            }
            return Ok(stats);
        }

        let progress = (!self.json_output).then(|| {
            let progress = ProgressManager::new(total as u64);
            progress.set_position(start.min(total) as u64);
            progress
        });
        let semaphore = Arc::new(Semaphore::new(self.workers));

        loop {
            let step = enumerator.next_page(&cursor).await;

            let mut tasks = Vec::new();
            for work in step.worklist() {
                let permit = semaphore.clone().acquire_owned().await?;
                let optimizer = self.optimizer.clone();
                let repo = self.repo.clone();
                let key = work.key();
                tasks.push(tokio::spawn(async move {
                    let _permit = permit;
                    optimizer.optimize_key(repo.as_ref(), &key, Mode::Bulk).await
                }));
            }

            for joined in futures::future::join_all(tasks).await {
                match joined {
                    Ok(result) => self.record(&result, &mut stats),
                    Err(e) => {
                        error!("Optimization task panicked: {}", e);
                        stats.add_error();
                    }
                }
            }

            if self.json_output {
                JsonMessage::Page {
                    offset: step.cursor.offset,
                    total_items: step.cursor.total,
                    progress: step.progress,
                    num_images: step.worklist().len(),
                }
                .emit();
            }
            if let Some(progress) = &progress {
                progress.update(&step.counter());
            }

            if step.done {
                break;
            }
            cursor = step.cursor;
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        if self.json_output {
            JsonMessage::Complete {
                files_processed: stats.files_processed,
                files_optimized: stats.files_optimized,
                files_skipped: stats.files_skipped,
                errors: stats.errors,
                total_bytes_saved: stats.total_bytes_saved,
                duration_seconds: elapsed,
            }
            .emit();
        }
        if let Some(progress) = &progress {
            progress.finish(&stats.format_summary());
        }

        Ok(stats)
    }

    fn record(&self, result: &OptimizationResult, stats: &mut OptimizationStats) {
        if self.json_output {
            JsonMessage::file_complete(result).emit();
        }

        if result.error.is_some() {
            stats.add_error();
        } else if result.replaced {
            stats.add_optimized(result.src_size, result.dest_size);
        } else {
            stats.add_skipped(result.src_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Engine;
    use crate::config::{BulkActions, Config};
    use crate::content::{ContentField, ContentItem, ManifestRepository};
    use crate::log_sink::TracingLog;
    use crate::tool_resolver::Capabilities;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_errors_do_not_stop_the_job() {
        let dir = TempDir::new().unwrap();
        let mut items = Vec::new();
        for id in 1..=3u64 {
            let item_dir = dir.path().join(id.to_string());
            std::fs::create_dir(&item_dir).unwrap();
            std::fs::write(item_dir.join("a.png"), vec![1u8; 50]).unwrap();
            items.push(ContentItem {
                id,
                fields: vec![ContentField::Image {
                    name: "images".to_string(),
                    files: vec!["a.png".to_string(), "missing.png".to_string()],
                }],
            });
        }

        let config = Config {
            bulk_engine: Some(Engine::Local),
            files_root: dir.path().to_path_buf(),
            bulk_actions: BulkActions {
                optimize_originals: true,
                optimize_variations: false,
            },
            ..Config::default()
        };
        let optimizer = Arc::new(Optimizer::new(config, Capabilities::default(), Arc::new(TracingLog)).unwrap());
        let runner = BulkRunner::new(optimizer, Arc::new(ManifestRepository::new(items)), 2, true);

        let stats = runner.run(0).await.unwrap();

        // no local tools: every asset fails, missing files too
        assert_eq!(stats.files_processed, 6);
        assert_eq!(stats.errors, 6);
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let optimizer = Arc::new(Optimizer::new(Config::default(), Capabilities::default(), Arc::new(TracingLog)).unwrap());
        let runner = BulkRunner::new(optimizer, Arc::new(ManifestRepository::new(Vec::new())), 4, true);

        let stats = runner.run(0).await.unwrap();
        assert_eq!(stats.files_processed, 0);
    }
}
