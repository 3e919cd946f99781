//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON.
//!
//! ## Responsabilità:
//! - `OptimizeResponse`: risposta per-asset `{error, error_api, percentNew, file, basedir, url}`
//! - `BulkPageMessage`: risposta di uno step bulk `{counter, numBatches, numImages, images}`
//! - `JsonMessage`: eventi emessi su stdout, una riga per messaggio, dal
//!   comando `bulk --json`
//!
//! ## Tipi di messaggi:
//! - `start`: inizio del job bulk
//! - `page`: uno step del Bulk Enumerator completato
//! - `file_complete`: fine elaborazione di un asset
//! - `complete`: fine del job con statistiche finali
//! - `error`: errore a livello di job

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-asset optimize response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub error: Option<String>,
    pub error_api: Option<String>,
    #[serde(rename = "percentNew")]
    pub percent_new: String,
    pub file: String,
    pub basedir: String,
    pub url: String,
}

/// One bulk step, as returned to a polling client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkPageMessage {
    /// Human readable status, the percentage is wrapped in `{}`
    pub counter: String,
    pub num_batches: usize,
    pub num_images: usize,
    /// `"<item id>,<file>"` keys
    pub images: Vec<String>,
}

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "start")]
    Start {
        total_items: usize,
        engine: Option<String>,
        workers: usize,
    },

    #[serde(rename = "page")]
    Page {
        offset: usize,
        total_items: usize,
        progress: u8,
        num_images: usize,
    },

    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        original_size: u64,
        optimized_size: u64,
        reduction_percent: u8,
        skipped: bool,
        error: Option<String>,
    },

    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_optimized: usize,
        files_skipped: usize,
        errors: usize,
        total_bytes_saved: u64,
        duration_seconds: f64,
    },

    #[serde(rename = "error")]
    Error { message: String, details: Option<String> },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn file_complete(result: &crate::optimizer::OptimizationResult) -> Self {
        Self::FileComplete {
            path: result.path.clone(),
            original_size: result.src_size,
            optimized_size: result.dest_size,
            reduction_percent: result.percent,
            skipped: result.skipped,
            error: result.error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl BulkPageMessage {
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}

impl OptimizeResponse {
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}
