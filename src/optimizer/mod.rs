//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `orchestrator`: punto d'ingresso per-asset (`Optimizer`)
//! - `result`: esito strutturato e sua proiezione JSON
//! - `path_locks`: serializzazione per path
//! - `bulk_runner`: driver del job bulk per la CLI

pub mod bulk_runner;
pub mod orchestrator;
pub mod path_locks;
pub mod result;

pub use bulk_runner::BulkRunner;
pub use orchestrator::{OptimizationRequest, Optimizer};
pub use path_locks::PathLocks;
pub use result::{EngineReport, OptimizationResult};
