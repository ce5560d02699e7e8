// src/orchestrator.rs
//! # Pipeline orchestrator
//!
//! One run: `SELECT → CLASSIFY → DEDUPE → ROUTE → [FAST ∥ DEEP] → AGGREGATE`.
//!
//! - SELECT ranks the store's unprocessed pool; nothing selected ends the run.
//! - CLASSIFY calls the classifier with bounded concurrency and dispatches
//!   spaced by `classify_delay_ms`; failures and timeouts fall back to the
//!   default classification.
//! - DEDUPE suppresses near-duplicates and writes them back as terminal;
//!   nothing kept ends the run.
//! - The two lanes run concurrently and share only the `QuotaState`. Inside a
//!   lane items go one at a time: matcher → quota router → generation with
//!   fallbacks → store write, with a pause between items.
//! - Item-level failures are counted and logged; an unavailable store halts
//!   only the lane that hit it.
//! - AGGREGATE persists quota counters, records metrics and returns the
//!   `RunSummary`.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::channel::{self, LaneSplit};
use crate::config::PipelineConfig;
use crate::dedup::DeduplicationEngine;
use crate::error::{PipelineError, StoreError};
use crate::matcher::CapacityMatcher;
use crate::metrics as m;
use crate::priority::{PriorityScorer, SelectionMode};
use crate::quota::{QuotaSnapshot, QuotaState, QuotaStore};
use crate::quota_router::QuotaRouter;
use crate::roster::{Roster, WorkerUsage};
use crate::services::{default_classification, generate_with_fallback, DynClassifier, DynGenerator};
use crate::source_tiers::SourceTierTable;
use crate::store::ItemStore;
use crate::text::anon_hash;
use crate::types::{CandidateItem, ClassifiedItem, Disposition, ItemOutcome, Lane, Resource};

/// External collaborators of a run.
#[derive(Clone)]
pub struct Services {
    pub classifier: DynClassifier,
    pub generator: DynGenerator,
    pub items: Arc<dyn ItemStore>,
    pub quota_store: Arc<dyn QuotaStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Nothing fresh and unprocessed to select.
    NoWork,
    /// Every selected item was a duplicate.
    AllDuplicates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneReport {
    pub lane: Lane,
    pub assigned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub emergency: usize,
    /// Items that found no eligible worker and went through the generic path.
    pub unassigned: usize,
    pub premium_granted: usize,
    pub elapsed_ms: u64,
    pub items_per_minute: f64,
    /// Set when a lane-fatal store error stopped the lane.
    pub halted: Option<String>,
    #[serde(skip)]
    workers: Vec<String>,
}

impl LaneReport {
    fn new(lane: Lane, assigned: usize) -> Self {
        Self {
            lane,
            assigned,
            succeeded: 0,
            failed: 0,
            emergency: 0,
            unassigned: 0,
            premium_granted: 0,
            elapsed_ms: 0,
            items_per_minute: 0.0,
            halted: None,
            workers: Vec::new(),
        }
    }
}

/// User-visible result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: SelectionMode,
    pub status: RunStatus,
    pub selected: usize,
    pub stale_unprocessed: usize,
    pub classify_fallbacks: usize,
    pub deduplicated_out: usize,
    pub fast_assigned: usize,
    pub deep_assigned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub emergency: usize,
    pub premium_granted: usize,
    pub premium_used: u32,
    pub premium_limit: u32,
    /// Capacity claimed per worker during this run, including items whose
    /// store write failed afterwards.
    pub worker_assignments: BTreeMap<String, u32>,
    /// Daily usage of every roster worker after the run.
    pub worker_usage: Vec<WorkerUsage>,
    pub quota_persisted: bool,
    pub lanes: Vec<LaneReport>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn empty(mode: SelectionMode, status: RunStatus) -> Self {
        Self {
            mode,
            status,
            selected: 0,
            stale_unprocessed: 0,
            classify_fallbacks: 0,
            deduplicated_out: 0,
            fast_assigned: 0,
            deep_assigned: 0,
            succeeded: 0,
            failed: 0,
            emergency: 0,
            premium_granted: 0,
            premium_used: 0,
            premium_limit: 0,
            worker_assignments: BTreeMap::new(),
            worker_usage: Vec::new(),
            quota_persisted: false,
            lanes: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

/// What an item claimed and produced, whether or not its write landed.
struct Done {
    worker_id: Option<String>,
    resource: Resource,
    emergency: bool,
}

pub struct Orchestrator {
    cfg: PipelineConfig,
    scorer: PriorityScorer,
    dedup: DeduplicationEngine,
    matcher: CapacityMatcher,
    quota_router: QuotaRouter,
    services: Services,
}

impl Orchestrator {
    pub fn new(
        cfg: PipelineConfig,
        tiers: SourceTierTable,
        roster: Roster,
        services: Services,
    ) -> Result<Self, PipelineError> {
        cfg.validate()?;
        Ok(Self {
            scorer: PriorityScorer::new(tiers),
            dedup: DeduplicationEngine::new(cfg.dedup),
            matcher: CapacityMatcher::new(roster),
            quota_router: QuotaRouter::new(cfg.quota),
            services,
            cfg,
        })
    }

    pub fn roster(&self) -> &Roster {
        self.matcher.roster()
    }

    pub async fn run(&self, mode: SelectionMode) -> Result<RunSummary, PipelineError> {
        self.run_at(mode, Utc::now()).await
    }

    /// Run with an explicit clock (freshness windows and the quota day).
    pub async fn run_at(
        &self,
        mode: SelectionMode,
        now: DateTime<Utc>,
    ) -> Result<RunSummary, PipelineError> {
        m::ensure_described();
        counter!(m::RUNS_TOTAL).increment(1);
        let started = Instant::now();
        info!(
            target: "pipeline",
            mode = mode.as_str(),
            classifier = self.services.classifier.name(),
            generator = self.services.generator.name(),
            "run started"
        );

        // Run-fatal: no item is touched without trustworthy counters.
        let today = now.date_naive();
        let snapshot = self
            .services
            .quota_store
            .load()
            .await
            .map_err(PipelineError::QuotaLoad)?
            .unwrap_or_else(|| QuotaSnapshot::empty(today));
        let quota = self.quota_router.open_day(snapshot, today);

        // SELECT
        let pool = self
            .services
            .items
            .unprocessed()
            .await
            .map_err(PipelineError::ItemStore)?;
        let selection = self.scorer.select(&pool, now, self.cfg.mode_limits(mode));
        let mut summary = RunSummary::empty(mode, RunStatus::Completed);
        summary.selected = selection.items.len();
        summary.stale_unprocessed = selection.stale_unprocessed;
        counter!(m::SELECTED_TOTAL).increment(summary.selected as u64);
        info!(
            target: "pipeline",
            pool = pool.len(),
            selected = summary.selected,
            stale = summary.stale_unprocessed,
            "selection done"
        );
        if selection.items.is_empty() {
            summary.status = RunStatus::NoWork;
            return Ok(self.finish(summary, &quota, started).await);
        }

        // CLASSIFY
        let classified = self
            .classify_all(selection.items.into_iter().map(|s| s.item).collect())
            .await;
        summary.classify_fallbacks = classified.iter().filter(|c| c.defaulted).count();
        counter!(m::CLASSIFY_FALLBACK_TOTAL).increment(summary.classify_fallbacks as u64);

        // DEDUPE
        let deduped = self.dedup.dedupe(classified);
        summary.deduplicated_out = deduped.duplicates.len();
        counter!(m::DUPLICATES_TOTAL).increment(summary.deduplicated_out as u64);
        for d in &deduped.duplicates {
            let outcome = ItemOutcome {
                item_id: d.item.id(),
                classification: d.item.classification.clone(),
                disposition: Disposition::Duplicate {
                    of: d.kept_id,
                    similarity: d.similarity,
                },
            };
            if let Err(e) = self.services.items.save_outcome(&outcome).await {
                warn!(target: "pipeline", item = d.item.id(), error = %e, "duplicate write-back failed");
            }
        }
        info!(
            target: "pipeline",
            kept = deduped.kept.len(),
            duplicates = summary.deduplicated_out,
            "dedup done"
        );
        if deduped.kept.is_empty() {
            summary.status = RunStatus::AllDuplicates;
            return Ok(self.finish(summary, &quota, started).await);
        }

        // ROUTE
        let LaneSplit { fast, deep } = channel::route(&self.cfg.channels, deduped.kept);
        summary.fast_assigned = fast.len();
        summary.deep_assigned = deep.len();

        // FAST ∥ DEEP
        let (fast_report, deep_report) = tokio::join!(
            self.run_lane(Lane::Fast, fast, &quota),
            self.run_lane(Lane::Deep, deep, &quota),
        );

        for r in [&fast_report, &deep_report] {
            summary.succeeded += r.succeeded;
            summary.failed += r.failed;
            summary.emergency += r.emergency;
            summary.premium_granted += r.premium_granted;
            for w in &r.workers {
                *summary.worker_assignments.entry(w.clone()).or_insert(0) += 1;
            }
        }
        summary.lanes = vec![fast_report, deep_report];

        Ok(self.finish(summary, &quota, started).await)
    }

    async fn classify_all(&self, items: Vec<CandidateItem>) -> Vec<ClassifiedItem> {
        let timeout = self.cfg.lanes.call_timeout();
        let defaults = self.cfg.classifier;
        let classifier = &self.services.classifier;
        let spacing = self.cfg.lanes.classify_delay();
        let first_dispatch = Instant::now();

        stream::iter(items.into_iter().enumerate())
            .map(|(idx, item)| async move {
                // Dispatch `idx` waits for its slot, whatever the in-flight cap.
                let slot = spacing.saturating_mul(u32::try_from(idx).unwrap_or(u32::MAX));
                if !slot.is_zero() {
                    tokio::time::sleep_until(first_dispatch + slot).await;
                }
                let call = classifier.classify(&item.title, &item.body);
                let (classification, defaulted) = match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(c)) => (c.sanitized(), false),
                    Ok(Err(e)) => {
                        warn!(
                            target: "pipeline",
                            item = item.id,
                            title = %anon_hash(&item.title),
                            error = %e,
                            "classification failed, using defaults"
                        );
                        (default_classification(&item.title, &defaults), true)
                    }
                    Err(_) => {
                        warn!(
                            target: "pipeline",
                            item = item.id,
                            title = %anon_hash(&item.title),
                            timeout_secs = timeout.as_secs(),
                            "classification timed out, using defaults"
                        );
                        (default_classification(&item.title, &defaults), true)
                    }
                };
                ClassifiedItem {
                    item,
                    classification,
                    defaulted,
                }
            })
            .buffered(self.cfg.lanes.classify_concurrency.max(1))
            .collect()
            .await
    }

    async fn run_lane(&self, lane: Lane, items: Vec<ClassifiedItem>, quota: &QuotaState) -> LaneReport {
        let started = Instant::now();
        let total = items.len();
        let mut report = LaneReport::new(lane, total);
        let delay = self.cfg.lanes.item_delay();

        for (idx, item) in items.into_iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let id = item.id();
            let (done, saved) = self.process_item(lane, item, quota).await;

            // Worker capacity and premium units are spent at claim time.
            match done.worker_id {
                Some(w) => report.workers.push(w),
                None => report.unassigned += 1,
            }
            if done.resource == Resource::Premium {
                report.premium_granted += 1;
            }

            match saved {
                Ok(()) => {
                    report.succeeded += 1;
                    if done.emergency {
                        report.emergency += 1;
                    }
                }
                Err(e) if e.is_lane_fatal() => {
                    let remaining = total - idx;
                    error!(
                        target: "pipeline",
                        lane = lane.as_str(),
                        item = id,
                        remaining,
                        error = %e,
                        "lane halted"
                    );
                    report.failed += remaining;
                    report.halted = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!(target: "pipeline", lane = lane.as_str(), item = id, error = %e, "item failed");
                    report.failed += 1;
                }
            }
        }

        let elapsed = started.elapsed();
        report.elapsed_ms = elapsed.as_millis() as u64;
        let processed = (report.succeeded + report.failed) as f64;
        report.items_per_minute = if elapsed.as_secs_f64() > 0.0 {
            processed * 60.0 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        counter!(m::ITEMS_SUCCEEDED_TOTAL, "lane" => lane.as_str()).increment(report.succeeded as u64);
        counter!(m::ITEMS_FAILED_TOTAL, "lane" => lane.as_str()).increment(report.failed as u64);
        histogram!(m::LANE_MS, "lane" => lane.as_str()).record(report.elapsed_ms as f64);
        info!(
            target: "pipeline",
            lane = lane.as_str(),
            assigned = report.assigned,
            succeeded = report.succeeded,
            failed = report.failed,
            emergency = report.emergency,
            elapsed_ms = report.elapsed_ms,
            "lane finished"
        );
        report
    }

    async fn process_item(
        &self,
        lane: Lane,
        item: ClassifiedItem,
        quota: &QuotaState,
    ) -> (Done, Result<(), StoreError>) {
        let id = item.id();
        let assignment = self.matcher.assign(item.category(), item.importance(), quota);
        let worker = assignment.as_ref().map(|a| &a.worker);
        if worker.is_none() {
            debug!(
                target: "pipeline",
                item = id,
                category = %item.category(),
                importance = item.importance(),
                "no eligible worker, generic path"
            );
        }

        let decision = self
            .quota_router
            .choose_resource(id, item.importance(), worker, quota);
        if decision.resource == Resource::Premium {
            counter!(m::PREMIUM_GRANTED_TOTAL).increment(1);
        }

        let produced = generate_with_fallback(
            self.services.generator.as_ref(),
            &item.item,
            &item.classification,
            worker,
            decision.resource,
            self.cfg.lanes.call_timeout(),
        )
        .await;
        let emergency = produced.produced_by.is_none();
        if emergency {
            counter!(m::EMERGENCY_CONTENT_TOTAL).increment(1);
        }

        let outcome = ItemOutcome {
            item_id: id,
            classification: item.classification,
            disposition: Disposition::Generated {
                lane,
                worker_id: worker.map(|w| w.id.clone()),
                worker_name: worker.map(|w| w.name.clone()),
                resource: decision.resource,
                produced_by: produced.produced_by,
                emergency,
                content: produced.content,
            },
        };

        let save = self.services.items.save_outcome(&outcome);
        let saved = match tokio::time::timeout(self.cfg.lanes.call_timeout(), save).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Rejected {
                item_id: id,
                reason: "store write timed out".into(),
            }),
        };
        if saved.is_ok() {
            debug!(
                target: "pipeline",
                lane = lane.as_str(),
                item = id,
                title = %anon_hash(&item.item.title),
                worker = worker.map(|w| w.id.as_str()).unwrap_or("-"),
                resource = %decision.resource,
                gate = ?decision.gate,
                "item done"
            );
        }

        let done = Done {
            worker_id: worker.map(|w| w.id.clone()),
            resource: decision.resource,
            emergency,
        };
        (done, saved)
    }

    /// AGGREGATE: persist counters, publish gauges, log the summary.
    async fn finish(&self, mut summary: RunSummary, quota: &QuotaState, started: Instant) -> RunSummary {
        let snapshot = quota.snapshot();
        summary.premium_used = snapshot.premium_used;
        summary.premium_limit = quota.premium_limit();
        summary.worker_usage = self.roster().usage_report(quota);
        summary.quota_persisted = match self.services.quota_store.save(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                error!(target: "quota", error = %e, "failed to persist quota counters");
                false
            }
        };
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        gauge!(m::PREMIUM_USED).set(f64::from(summary.premium_used));
        gauge!(m::LAST_RUN_TS).set(Utc::now().timestamp() as f64);

        info!(
            target: "pipeline",
            mode = summary.mode.as_str(),
            status = ?summary.status,
            selected = summary.selected,
            stale_unprocessed = summary.stale_unprocessed,
            classify_fallbacks = summary.classify_fallbacks,
            deduplicated_out = summary.deduplicated_out,
            fast = summary.fast_assigned,
            deep = summary.deep_assigned,
            succeeded = summary.succeeded,
            failed = summary.failed,
            emergency = summary.emergency,
            premium_used = summary.premium_used,
            premium_limit = summary.premium_limit,
            quota_persisted = summary.quota_persisted,
            elapsed_ms = summary.elapsed_ms,
            "run summary"
        );
        summary
    }
}
