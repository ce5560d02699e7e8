//! Typed errors for the seams where callers branch on the kind of failure.
//! Everything else (config files, service adapters) uses `anyhow`.

use thiserror::Error;

/// Item store failures, split by blast radius.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all; the calling lane halts.
    #[error("item store unavailable: {0}")]
    Unavailable(String),
    /// A single write was refused; only that item fails.
    #[error("item {item_id} rejected by store: {reason}")]
    Rejected { item_id: u64, reason: String },
}

impl StoreError {
    pub fn is_lane_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Errors that abort a run before any item is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot load quota counters: {0:#}")]
    QuotaLoad(anyhow::Error),
    #[error("cannot read candidate items")]
    ItemStore(#[source] StoreError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
