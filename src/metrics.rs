// src/metrics.rs
//! Pipeline metric names, one-time descriptions and the optional Prometheus
//! recorder used by the binary.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const RUNS_TOTAL: &str = "pipeline_runs_total";
pub const SELECTED_TOTAL: &str = "pipeline_selected_total";
pub const DUPLICATES_TOTAL: &str = "pipeline_duplicates_total";
pub const CLASSIFY_FALLBACK_TOTAL: &str = "pipeline_classify_fallback_total";
pub const ITEMS_SUCCEEDED_TOTAL: &str = "pipeline_items_succeeded_total";
pub const ITEMS_FAILED_TOTAL: &str = "pipeline_items_failed_total";
pub const PREMIUM_GRANTED_TOTAL: &str = "pipeline_premium_granted_total";
pub const EMERGENCY_CONTENT_TOTAL: &str = "pipeline_emergency_content_total";
pub const LAST_RUN_TS: &str = "pipeline_last_run_ts";
pub const PREMIUM_USED: &str = "pipeline_premium_used";
pub const LANE_MS: &str = "pipeline_lane_ms";

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(RUNS_TOTAL, "Pipeline runs started.");
        describe_counter!(SELECTED_TOTAL, "Items selected by priority scoring.");
        describe_counter!(DUPLICATES_TOTAL, "Items suppressed as near-duplicates.");
        describe_counter!(
            CLASSIFY_FALLBACK_TOTAL,
            "Items that fell back to the default classification."
        );
        describe_counter!(ITEMS_SUCCEEDED_TOTAL, "Items persisted with content, by lane.");
        describe_counter!(ITEMS_FAILED_TOTAL, "Items that failed in a lane, by lane.");
        describe_counter!(PREMIUM_GRANTED_TOTAL, "Premium generation grants.");
        describe_counter!(
            EMERGENCY_CONTENT_TOTAL,
            "Items that ended on the emergency template."
        );
        describe_gauge!(LAST_RUN_TS, "Unix ts when the pipeline last finished.");
        describe_gauge!(PREMIUM_USED, "Premium generations used today.");
        describe_histogram!(LANE_MS, "Lane wall time in milliseconds.");
    });
}

/// Install the Prometheus recorder globally.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")?;
    ensure_described();
    Ok(handle)
}
