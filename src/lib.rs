// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod digest;
pub mod error;
pub mod freshness;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod select;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{RefineryError, Result};
pub use crate::model::{CanonicalSignal, ScoredSignal};
pub use crate::pipeline::{run_cycle, run_digest};
