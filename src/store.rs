// src/store.rs
//! Item store seam: the pipeline reads the unprocessed pool from it and
//! writes one terminal outcome per item back.
//!
//! `MemoryItemStore` is the in-process implementation used by the binary
//! (backed by a JSON file) and by tests (with failure injection).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::types::{CandidateItem, ItemOutcome};

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Every item whose processed flag is still unset. Freshness filtering
    /// happens in the scorer so the stale backlog can be counted.
    async fn unprocessed(&self) -> Result<Vec<CandidateItem>, StoreError>;

    /// Persist the terminal outcome and mark the item processed.
    async fn save_outcome(&self, outcome: &ItemOutcome) -> Result<(), StoreError>;
}

/// On-disk shape: `{items, outcomes}`. A bare item list is accepted on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDump {
    pub items: Vec<CandidateItem>,
    #[serde(default)]
    pub outcomes: Vec<ItemOutcome>,
}

#[derive(Default)]
struct Inner {
    items: Vec<CandidateItem>,
    outcomes: Vec<ItemOutcome>,
}

#[derive(Default)]
pub struct MemoryItemStore {
    inner: Mutex<Inner>,
    read_unavailable: bool,
    unavailable_on: HashSet<u64>,
    reject_on: HashSet<u64>,
}

impl MemoryItemStore {
    pub fn new(items: Vec<CandidateItem>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items,
                outcomes: Vec::new(),
            }),
            ..Self::default()
        }
    }

    /// Load `[item, ...]` or `{items, outcomes}` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading items from {}", path.display()))?;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ItemsFile {
            List(Vec<CandidateItem>),
            Dump(StoreDump),
        }
        let dump = match serde_json::from_str::<ItemsFile>(&raw)
            .with_context(|| format!("parsing items {}", path.display()))?
        {
            ItemsFile::List(items) => StoreDump {
                items,
                outcomes: Vec::new(),
            },
            ItemsFile::Dump(d) => d,
        };
        Ok(Self {
            inner: Mutex::new(Inner {
                items: dump.items,
                outcomes: dump.outcomes,
            }),
            ..Self::default()
        })
    }

    /// Write items and outcomes as one JSON document (tmp file + rename).
    pub fn flush_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.dump())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    /// Reads fail with `Unavailable`.
    pub fn unavailable(mut self) -> Self {
        self.read_unavailable = true;
        self
    }

    /// Saving this item reports the whole store as unavailable.
    pub fn unavailable_on(mut self, item_id: u64) -> Self {
        self.unavailable_on.insert(item_id);
        self
    }

    /// Saving this item is rejected (item-level failure).
    pub fn reject_on(mut self, item_id: u64) -> Self {
        self.reject_on.insert(item_id);
        self
    }

    pub fn dump(&self) -> StoreDump {
        let g = self.lock();
        StoreDump {
            items: g.items.clone(),
            outcomes: g.outcomes.clone(),
        }
    }

    pub fn outcomes(&self) -> Vec<ItemOutcome> {
        self.lock().outcomes.clone()
    }

    pub fn outcome_for(&self, item_id: u64) -> Option<ItemOutcome> {
        self.lock()
            .outcomes
            .iter()
            .find(|o| o.item_id == item_id)
            .cloned()
    }

    pub fn is_processed(&self, item_id: u64) -> bool {
        self.lock()
            .items
            .iter()
            .any(|i| i.id == item_id && i.processed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn unprocessed(&self) -> Result<Vec<CandidateItem>, StoreError> {
        if self.read_unavailable {
            return Err(StoreError::Unavailable("item store offline".into()));
        }
        Ok(self
            .lock()
            .items
            .iter()
            .filter(|i| !i.processed)
            .cloned()
            .collect())
    }

    async fn save_outcome(&self, outcome: &ItemOutcome) -> Result<(), StoreError> {
        let id = outcome.item_id;
        if self.unavailable_on.contains(&id) {
            return Err(StoreError::Unavailable(format!(
                "connection lost while saving item {id}"
            )));
        }
        if self.reject_on.contains(&id) {
            return Err(StoreError::Rejected {
                item_id: id,
                reason: "write refused".into(),
            });
        }

        let mut g = self.lock();
        let Some(item) = g.items.iter_mut().find(|i| i.id == id) else {
            return Err(StoreError::Rejected {
                item_id: id,
                reason: "unknown item".into(),
            });
        };
        item.processed = true;
        g.outcomes.retain(|o| o.item_id != id);
        g.outcomes.push(outcome.clone());
        Ok(())
    }
}
