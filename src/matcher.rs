//! # Capacity matcher
//! Picks the best eligible worker for an item and claims one unit of that
//! worker's daily capacity in the same critical section.
//!
//! Eligibility: category covered, importance >= worker minimum, usage below
//! the daily cap. Score (higher wins, first in registration order on ties):
//!   - +3.0 primary specialty / +2.0 secondary specialty
//!   - +2.0 importance >= min + 5 / +1.0 otherwise
//!   - +1.0 premium preference with importance >= 15,
//!     +0.5 standard preference with importance <= 12
//!   - +0.5 while the worker is under half of its daily capacity

use serde::Serialize;
use tracing::debug;

use crate::quota::{QuotaLedger, QuotaState};
use crate::roster::{PreferredResource, Roster, WorkerProfile};
use crate::types::Category;

const PRIMARY_SPECIALTY: f64 = 3.0;
const SECONDARY_SPECIALTY: f64 = 2.0;
const COMFORTABLY_QUALIFIED: f64 = 2.0;
const QUALIFIED: f64 = 1.0;
const COMFORT_MARGIN: u8 = 5;
const PREMIUM_FIT: f64 = 1.0;
const PREMIUM_FIT_MIN_IMPORTANCE: u8 = 15;
const STANDARD_FIT: f64 = 0.5;
const STANDARD_FIT_MAX_IMPORTANCE: u8 = 12;
const LOAD_BALANCE: f64 = 0.5;

/// Successful assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub worker: WorkerProfile,
    pub score: f64,
}

pub struct CapacityMatcher {
    roster: Roster,
}

impl CapacityMatcher {
    pub fn new(roster: Roster) -> Self {
        Self { roster }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Select and claim a worker; `None` when nobody is eligible.
    pub fn assign(
        &self,
        category: Category,
        importance: u8,
        quota: &QuotaState,
    ) -> Option<Assignment> {
        quota.transact(|ledger| {
            let (idx, score) = self.best_candidate(category, importance, ledger)?;
            let worker = &self.roster.workers()[idx];
            if !ledger.claim_worker(&worker.id, worker.max_daily_items) {
                return None;
            }
            debug!(
                target: "matcher",
                worker = %worker.id,
                score,
                used = ledger.worker_used(&worker.id),
                limit = worker.max_daily_items,
                "worker assigned"
            );
            Some(Assignment {
                worker: worker.clone(),
                score,
            })
        })
    }

    /// Read-only ranking of every eligible worker (registration order kept for ties).
    pub fn rank(&self, category: Category, importance: u8, quota: &QuotaState) -> Vec<(String, f64)> {
        quota.transact(|ledger| {
            self.roster
                .workers()
                .iter()
                .filter_map(|w| {
                    let used = ledger.worker_used(&w.id);
                    eligible(w, category, importance, used)
                        .then(|| (w.id.clone(), score(w, category, importance, used)))
                })
                .collect()
        })
    }

    fn best_candidate(
        &self,
        category: Category,
        importance: u8,
        ledger: &QuotaLedger,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, w) in self.roster.workers().iter().enumerate() {
            let used = ledger.worker_used(&w.id);
            if !eligible(w, category, importance, used) {
                continue;
            }
            let s = score(w, category, importance, used);
            // Strictly greater: the earliest registered worker keeps ties.
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((idx, s));
            }
        }
        best
    }
}

fn eligible(w: &WorkerProfile, category: Category, importance: u8, used: u32) -> bool {
    w.covers(category) && importance >= w.min_importance && used < w.max_daily_items
}

fn score(w: &WorkerProfile, category: Category, importance: u8, used: u32) -> f64 {
    let mut s = 0.0;

    s += if w.primary_specialty() == Some(category) {
        PRIMARY_SPECIALTY
    } else {
        SECONDARY_SPECIALTY
    };

    s += if importance >= w.min_importance.saturating_add(COMFORT_MARGIN) {
        COMFORTABLY_QUALIFIED
    } else {
        QUALIFIED
    };

    match w.preferred_resource {
        PreferredResource::Premium if importance >= PREMIUM_FIT_MIN_IMPORTANCE => s += PREMIUM_FIT,
        PreferredResource::Standard if importance <= STANDARD_FIT_MAX_IMPORTANCE => {
            s += STANDARD_FIT
        }
        _ => {}
    }

    // used < 50% of capacity
    if u64::from(used) * 2 < u64::from(w.max_daily_items) {
        s += LOAD_BALANCE;
    }

    s
}
