// tests/quota_contention.rs
//
// Many tasks racing on one QuotaState: the worker caps and the premium
// limit hold no matter how the claims interleave.

use chrono::NaiveDate;
use std::sync::Arc;

use newsdesk_dispatch::matcher::CapacityMatcher;
use newsdesk_dispatch::quota::QuotaState;
use newsdesk_dispatch::quota_router::{QuotaPolicy, QuotaRouter};
use newsdesk_dispatch::roster::Roster;
use newsdesk_dispatch::{Category, Resource};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn premium_grants_never_exceed_the_daily_limit() {
    let quota = Arc::new(QuotaState::fresh(day(), 15));
    let router = Arc::new(QuotaRouter::new(QuotaPolicy::default()));

    let mut handles = Vec::new();
    for task in 0..8u64 {
        let quota = quota.clone();
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let mut granted = 0u32;
            for i in 0..10u64 {
                let d = router.choose_resource(task * 100 + i, 20, None, &quota);
                if d.resource == Resource::Premium {
                    granted += 1;
                }
                tokio::task::yield_now().await;
            }
            granted
        }));
    }

    let mut total = 0;
    for h in handles {
        total += h.await.unwrap();
    }
    assert_eq!(total, 15);
    assert_eq!(quota.premium_used(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn gated_tiers_stop_at_their_share_under_contention() {
    let quota = Arc::new(QuotaState::fresh(day(), 15));
    let router = Arc::new(QuotaRouter::new(QuotaPolicy::default()));

    // importance 12: standard tier, 60% gate -> at most 9 grants
    let mut handles = Vec::new();
    for task in 0..6u64 {
        let quota = quota.clone();
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            (0..10u64)
                .filter(|i| {
                    router.choose_resource(task * 100 + i, 12, None, &quota).resource
                        == Resource::Premium
                })
                .count()
        }));
    }
    let mut total = 0;
    for h in handles {
        total += h.await.unwrap();
    }
    assert_eq!(total, 9);

    // the critical tier can still spend the remainder
    let d = router.choose_resource(999, 18, None, &quota);
    assert_eq!(d.resource, Resource::Premium);
    assert_eq!(quota.premium_used(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_capacity_is_claimed_exactly_once() {
    let quota = Arc::new(QuotaState::fresh(day(), 15));
    let matcher = Arc::new(CapacityMatcher::new(Roster::default_seed()));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let quota = quota.clone();
        let matcher = matcher.clone();
        handles.push(tokio::spawn(async move {
            let mut got = Vec::new();
            for _ in 0..4 {
                if let Some(a) = matcher.assign(Category::Sport, 9, &quota) {
                    got.push(a.worker.id);
                }
                tokio::task::yield_now().await;
            }
            got
        }));
    }

    let mut assigned = Vec::new();
    for h in handles {
        assigned.extend(h.await.unwrap());
    }
    // sports_desk is the only sport worker, with 7 slots a day
    assert_eq!(assigned.len(), 7);
    assert!(assigned.iter().all(|w| w == "sports_desk"));
    assert_eq!(quota.worker_used("sports_desk"), 7);
}

#[test]
fn premium_worker_falls_back_once_budget_is_gone() {
    let quota = QuotaState::fresh(day(), 2);
    let router = QuotaRouter::new(QuotaPolicy {
        premium_daily_limit: 2,
        ..QuotaPolicy::default()
    });
    let matcher = CapacityMatcher::new(Roster::default_seed());

    let mut resources = Vec::new();
    for id in 0..3 {
        let a = matcher.assign(Category::Politics, 17, &quota).unwrap();
        resources.push(router.choose_resource(id, 17, Some(&a.worker), &quota).resource);
    }
    assert_eq!(
        resources,
        vec![Resource::Premium, Resource::Premium, Resource::Standard]
    );
}
