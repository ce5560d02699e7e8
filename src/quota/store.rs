// src/quota/store.rs
//! Persistence for quota counters. The JSON-file store writes atomically via a
//! temp file + rename, so a crash mid-save leaves the previous state intact.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::QuotaSnapshot;

#[async_trait::async_trait]
pub trait QuotaStore: Send + Sync {
    /// `Ok(None)` when nothing was stored yet.
    async fn load(&self) -> Result<Option<QuotaSnapshot>>;
    async fn save(&self, snapshot: &QuotaSnapshot) -> Result<()>;
}

/// `{date, worker_usage, premium_used}` as a single JSON file.
pub struct JsonFileQuotaStore {
    path: PathBuf,
}

impl JsonFileQuotaStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl QuotaStore for JsonFileQuotaStore {
    async fn load(&self) -> Result<Option<QuotaSnapshot>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        let snap = serde_json::from_str(&raw)
            .with_context(|| format!("parsing quota state {}", self.path.display()))?;
        Ok(Some(snap))
    }

    async fn save(&self, snapshot: &QuotaSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests and offline runs.
#[derive(Default)]
pub struct MemoryQuotaStore {
    slot: Mutex<Option<QuotaSnapshot>>,
    fail_load: bool,
}

impl MemoryQuotaStore {
    pub fn new(initial: Option<QuotaSnapshot>) -> Self {
        Self {
            slot: Mutex::new(initial),
            fail_load: false,
        }
    }

    /// A store whose `load` always fails.
    pub fn unavailable() -> Self {
        Self {
            slot: Mutex::new(None),
            fail_load: true,
        }
    }

    pub fn current(&self) -> Option<QuotaSnapshot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn load(&self) -> Result<Option<QuotaSnapshot>> {
        if self.fail_load {
            anyhow::bail!("quota store unavailable");
        }
        Ok(self.current())
    }

    async fn save(&self, snapshot: &QuotaSnapshot) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot.clone());
        Ok(())
    }
}
