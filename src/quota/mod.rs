//! # Daily quota state
//!
//! Process-wide counters shared by both lanes:
//! - per-worker items assigned today,
//! - premium generations used today vs. the daily limit.
//!
//! Both are reset when the calendar date changes. Every read-then-increment
//! happens inside one `transact` call under a single mutex, so two lanes can
//! never both take the last unit of a worker's capacity or of the premium
//! budget.

pub mod store;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

pub use store::{JsonFileQuotaStore, MemoryQuotaStore, QuotaStore};

/// Persisted shape: `{date, worker_usage, premium_used}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub date: NaiveDate,
    #[serde(default)]
    pub worker_usage: BTreeMap<String, u32>,
    #[serde(default)]
    pub premium_used: u32,
}

impl QuotaSnapshot {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            worker_usage: BTreeMap::new(),
            premium_used: 0,
        }
    }

    /// Counters valid for `today`: a snapshot from any other date yields zeros.
    pub fn for_day(self, today: NaiveDate) -> Self {
        if self.date == today {
            self
        } else {
            Self::empty(today)
        }
    }
}

/// Mutable counters, only reachable through `QuotaState::transact`.
#[derive(Debug)]
pub struct QuotaLedger {
    date: NaiveDate,
    worker_usage: BTreeMap<String, u32>,
    premium_used: u32,
    premium_limit: u32,
}

impl QuotaLedger {
    pub fn worker_used(&self, worker_id: &str) -> u32 {
        self.worker_usage.get(worker_id).copied().unwrap_or(0)
    }

    /// Take one unit of a worker's capacity; refuses at `max`.
    pub fn claim_worker(&mut self, worker_id: &str, max: u32) -> bool {
        let used = self.worker_usage.entry(worker_id.to_string()).or_insert(0);
        if *used < max {
            *used += 1;
            true
        } else {
            false
        }
    }

    pub fn premium_used(&self) -> u32 {
        self.premium_used
    }

    pub fn premium_limit(&self) -> u32 {
        self.premium_limit
    }

    /// Take one premium unit if `premium_used < gate` (and below the hard limit).
    pub fn claim_premium(&mut self, gate: f64) -> bool {
        let used = self.premium_used;
        if used < self.premium_limit && f64::from(used) < gate {
            self.premium_used += 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct QuotaState {
    inner: Mutex<QuotaLedger>,
}

impl QuotaState {
    /// Build from a loaded snapshot; stale snapshots are reset for `today`.
    pub fn from_snapshot(snapshot: QuotaSnapshot, today: NaiveDate, premium_limit: u32) -> Self {
        let stale = snapshot.date != today;
        let s = snapshot.for_day(today);
        if stale {
            info!(target: "quota", %today, "quota counters reset for new day");
        }
        Self {
            inner: Mutex::new(QuotaLedger {
                date: s.date,
                worker_usage: s.worker_usage,
                premium_used: s.premium_used.min(premium_limit),
                premium_limit,
            }),
        }
    }

    pub fn fresh(today: NaiveDate, premium_limit: u32) -> Self {
        Self::from_snapshot(QuotaSnapshot::empty(today), today, premium_limit)
    }

    /// Run `f` with exclusive access to the counters.
    pub fn transact<R>(&self, f: impl FnOnce(&mut QuotaLedger) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn worker_used(&self, worker_id: &str) -> u32 {
        self.transact(|l| l.worker_used(worker_id))
    }

    pub fn premium_used(&self) -> u32 {
        self.transact(|l| l.premium_used())
    }

    pub fn premium_limit(&self) -> u32 {
        self.transact(|l| l.premium_limit())
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        self.transact(|l| QuotaSnapshot {
            date: l.date,
            worker_usage: l.worker_usage.clone(),
            premium_used: l.premium_used,
        })
    }
}
