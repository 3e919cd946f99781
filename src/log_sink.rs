//! # Log Sink Module
//!
//! Destinazione del messaggio di esito scritto dall'orchestratore dopo ogni
//! ottimizzazione. Il messaggio è una singola stringa, scritta in modo sincrono
//! prima che `optimize` ritorni.
//!
//! ## Implementazioni:
//! - `TracingLog`: inoltra a `tracing::info!`
//! - `FileLog`: appende righe `<timestamp>\t<messaggio>` a un file e lo
//!   accorcia quando supera `max_bytes`, mantenendo le righe più recenti

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Logging sink accepting a single message string
pub trait LogSink: Send + Sync {
    fn save(&self, message: &str);
}

/// Sink that forwards every line to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn save(&self, message: &str) {
        info!(target: "asset_smusher::log", "{}", message);
    }
}

/// Append-only file log pruned to a byte budget
pub struct FileLog {
    path: PathBuf,
    max_bytes: u64,
    write_lock: Mutex<()>,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            max_bytes,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}\t{}", timestamp, message.replace('\n', " "))?;
        drop(file);

        if fs::metadata(&self.path)?.len() > self.max_bytes {
            self.prune()?;
        }
        Ok(())
    }

    /// Keeps the newest whole lines that fit in `max_bytes`
    fn prune(&self) -> std::io::Result<()> {
        let content = fs::read_to_string(&self.path)?;
        let mut kept: Vec<&str> = Vec::new();
        let mut size = 0u64;
        for line in content.lines().rev() {
            let line_size = line.len() as u64 + 1;
            if size + line_size > self.max_bytes {
                break;
            }
            size += line_size;
            kept.push(line);
        }
        kept.reverse();

        let mut pruned = kept.join("\n");
        if !pruned.is_empty() {
            pruned.push('\n');
        }
        fs::write(&self.path, pruned)
    }
}

impl LogSink for FileLog {
    fn save(&self, message: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = self.append(message) {
            warn!("Failed to write log line to {}: {}", self.path.display(), e);
        }
        info!(target: "asset_smusher::log", "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_log_appends_lines() {
        let dir = TempDir::new().unwrap();
        let log = FileLog::new(dir.path().join("logs/optimizer.log"), 20_000).unwrap();
        log.save("first");
        log.save("second");

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\tfirst"));
        assert!(lines[1].ends_with("\tsecond"));
    }

    #[test]
    fn test_file_log_prunes_oldest_lines() {
        let dir = TempDir::new().unwrap();
        let log = FileLog::new(dir.path().join("optimizer.log"), 200).unwrap();
        for i in 0..50 {
            log.save(&format!("message number {}", i));
        }

        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.len() <= 200);
        assert!(content.contains("message number 49"));
        assert!(!content.contains("message number 0\n"));
    }
}
