//! # Quota router
//! Chooses the standard or premium generation resource per item against the
//! shared daily premium budget.
//!
//! 1. Worker prefers premium (after hybrid resolution): premium while the
//!    budget is not exhausted, otherwise downgrade to standard.
//! 2. Otherwise importance tiers gate on the fraction of the budget used:
//!    critical → 100%, important → 80%, standard → 60%, below → standard.
//!
//! Granting premium increments the shared counter inside the same lock as the
//! check.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::quota::{QuotaSnapshot, QuotaState};
use crate::roster::WorkerProfile;
use crate::types::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    #[serde(default = "default_premium_daily_limit")]
    pub premium_daily_limit: u32,
    #[serde(default = "default_critical")]
    pub critical: u8,
    #[serde(default = "default_important")]
    pub important: u8,
    #[serde(default = "default_standard")]
    pub standard: u8,
    /// Fraction of the limit below which `important` items still get premium.
    #[serde(default = "default_important_gate")]
    pub important_gate: f64,
    /// Fraction of the limit below which `standard` items still get premium.
    #[serde(default = "default_standard_gate")]
    pub standard_gate: f64,
}

fn default_premium_daily_limit() -> u32 {
    15
}
fn default_critical() -> u8 {
    16
}
fn default_important() -> u8 {
    14
}
fn default_standard() -> u8 {
    12
}
fn default_important_gate() -> f64 {
    0.8
}
fn default_standard_gate() -> f64 {
    0.6
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            premium_daily_limit: default_premium_daily_limit(),
            critical: default_critical(),
            important: default_important(),
            standard: default_standard(),
            important_gate: default_important_gate(),
            standard_gate: default_standard_gate(),
        }
    }
}

/// Which rule decided the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    WorkerPreference,
    Critical,
    Important,
    Standard,
    BelowThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceDecision {
    pub resource: Resource,
    pub gate: Gate,
    /// Premium was wanted by the gate but the budget refused it.
    pub downgraded: bool,
}

pub struct QuotaRouter {
    policy: QuotaPolicy,
}

impl QuotaRouter {
    pub fn new(policy: QuotaPolicy) -> Self {
        Self { policy }
    }

    /// Counters for `today` under this policy's premium limit. The ledger
    /// carries the limit from here on.
    pub fn open_day(&self, snapshot: QuotaSnapshot, today: NaiveDate) -> QuotaState {
        QuotaState::from_snapshot(snapshot, today, self.policy.premium_daily_limit)
    }

    pub fn choose_resource(
        &self,
        item_id: u64,
        importance: u8,
        worker: Option<&WorkerProfile>,
        quota: &QuotaState,
    ) -> ResourceDecision {
        let p = &self.policy;
        let wants_premium =
            worker.is_some_and(|w| w.preferred_resource.resolve(importance) == Resource::Premium);

        let (gate, fraction) = if wants_premium {
            (Gate::WorkerPreference, 1.0)
        } else if importance >= p.critical {
            (Gate::Critical, 1.0)
        } else if importance >= p.important {
            (Gate::Important, p.important_gate)
        } else if importance >= p.standard {
            (Gate::Standard, p.standard_gate)
        } else {
            return ResourceDecision {
                resource: Resource::Standard,
                gate: Gate::BelowThresholds,
                downgraded: false,
            };
        };

        let (granted, used, limit) = quota.transact(|l| {
            let gate_value = f64::from(l.premium_limit()) * fraction;
            let granted = l.claim_premium(gate_value);
            (granted, l.premium_used(), l.premium_limit())
        });

        if granted {
            return ResourceDecision {
                resource: Resource::Premium,
                gate,
                downgraded: false,
            };
        }

        if matches!(gate, Gate::WorkerPreference | Gate::Critical) {
            warn!(
                target: "quota",
                item = item_id,
                worker = worker.map(|w| w.id.as_str()).unwrap_or("-"),
                ?gate,
                used,
                limit,
                "premium budget exhausted, downgrading to standard"
            );
        }
        ResourceDecision {
            resource: Resource::Standard,
            gate,
            downgraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::PreferredResource;
    use crate::types::Category;
    use chrono::NaiveDate;

    fn quota(limit: u32, used: u32) -> QuotaState {
        let q = QuotaState::fresh(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(), limit);
        for _ in 0..used {
            q.transact(|l| l.claim_premium(f64::INFINITY));
        }
        q
    }

    fn w(pref: PreferredResource) -> WorkerProfile {
        WorkerProfile {
            id: "w".into(),
            name: "W".into(),
            specialties: vec![Category::Politics],
            preferred_resource: pref,
            min_importance: 1,
            max_daily_items: 5,
        }
    }

    fn router(limit: u32) -> QuotaRouter {
        QuotaRouter::new(QuotaPolicy {
            premium_daily_limit: limit,
            ..QuotaPolicy::default()
        })
    }

    #[test]
    fn opened_day_takes_the_policy_limit() {
        let day = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let mut snap = QuotaSnapshot::empty(day);
        snap.premium_used = 9;

        let q = router(4).open_day(snap, day);
        assert_eq!(q.premium_limit(), 4);
        assert_eq!(q.premium_used(), 4);
        assert_eq!(router(4).choose_resource(1, 20, None, &q).resource, Resource::Standard);
    }

    #[test]
    fn important_gate_at_eighty_percent() {
        let r = router(10);
        let q = quota(10, 7);
        let first = r.choose_resource(1, 14, None, &q);
        assert_eq!(first.resource, Resource::Premium);
        assert_eq!(first.gate, Gate::Important);
        assert_eq!(q.premium_used(), 8);

        let second = r.choose_resource(2, 14, None, &q);
        assert_eq!(second.resource, Resource::Standard);
        assert!(second.downgraded);
        assert_eq!(q.premium_used(), 8);
    }

    #[test]
    fn standard_gate_at_sixty_percent() {
        let r = router(10);
        let q = quota(10, 5);
        assert_eq!(r.choose_resource(1, 12, None, &q).resource, Resource::Premium);
        assert_eq!(r.choose_resource(2, 13, None, &q).resource, Resource::Standard);
        assert_eq!(q.premium_used(), 6);
    }

    #[test]
    fn critical_uses_full_budget() {
        let r = router(10);
        let q = quota(10, 9);
        assert_eq!(r.choose_resource(1, 16, None, &q).resource, Resource::Premium);
        let d = r.choose_resource(2, 20, None, &q);
        assert_eq!(d.resource, Resource::Standard);
        assert!(d.downgraded);
        assert_eq!(q.premium_used(), 10);
    }

    #[test]
    fn low_importance_never_consumes_budget() {
        let r = router(10);
        let q = quota(10, 0);
        let d = r.choose_resource(1, 11, None, &q);
        assert_eq!(d.resource, Resource::Standard);
        assert_eq!(d.gate, Gate::BelowThresholds);
        assert!(!d.downgraded);
        assert_eq!(q.premium_used(), 0);
    }

    #[test]
    fn premium_worker_bypasses_importance_tiers() {
        let r = router(10);
        let q = quota(10, 9);
        let prem = w(PreferredResource::Premium);
        let d = r.choose_resource(1, 5, Some(&prem), &q);
        assert_eq!(d.resource, Resource::Premium);
        assert_eq!(d.gate, Gate::WorkerPreference);

        let d2 = r.choose_resource(2, 5, Some(&prem), &q);
        assert_eq!(d2.resource, Resource::Standard);
        assert!(d2.downgraded);
    }

    #[test]
    fn hybrid_worker_below_threshold_falls_through_to_tiers() {
        let r = router(10);
        let q = quota(10, 0);
        let hybrid = w(PreferredResource::Hybrid { premium_from: 15 });
        assert_eq!(
            r.choose_resource(1, 14, Some(&hybrid), &q).gate,
            Gate::Important
        );
        assert_eq!(
            r.choose_resource(2, 15, Some(&hybrid), &q).gate,
            Gate::WorkerPreference
        );
        let standard = w(PreferredResource::Standard);
        assert_eq!(
            r.choose_resource(3, 10, Some(&standard), &q).gate,
            Gate::BelowThresholds
        );
    }

    #[test]
    fn degradation_curve_never_exceeds_limit() {
        let r = router(15);
        let q = quota(15, 0);
        for i in 0..200u64 {
            let imp = (i % 20) as u8 + 1;
            let _ = r.choose_resource(i, imp, None, &q);
            assert!(q.premium_used() <= 15);
        }
        assert_eq!(q.premium_used(), 15);
    }
}
