// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod channel;
pub mod config;
pub mod dedup;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod priority;
pub mod quota;
pub mod quota_router;
pub mod roster;
pub mod services;
pub mod source_tiers;
pub mod store;
pub mod text;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::error::{PipelineError, StoreError};
pub use crate::orchestrator::{LaneReport, Orchestrator, RunStatus, RunSummary, Services};
pub use crate::priority::SelectionMode;
pub use crate::types::{
    CandidateItem, Category, ClassificationResult, ClassifiedItem, Fingerprint, Lane, Resource,
};
