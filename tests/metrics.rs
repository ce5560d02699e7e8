// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global.

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use newsdesk_dispatch::metrics::install_prometheus;
use newsdesk_dispatch::quota::{MemoryQuotaStore, QuotaStore};
use newsdesk_dispatch::roster::Roster;
use newsdesk_dispatch::services::mock::{ScriptedClassifier, ScriptedGenerator};
use newsdesk_dispatch::services::{DynClassifier, DynGenerator};
use newsdesk_dispatch::source_tiers::SourceTierTable;
use newsdesk_dispatch::store::{ItemStore, MemoryItemStore};
use newsdesk_dispatch::{CandidateItem, Orchestrator, PipelineConfig, SelectionMode, Services};

#[tokio::test]
async fn run_publishes_expected_series() {
    let handle = install_prometheus().expect("recorder installs once");

    let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
    let items: Arc<dyn ItemStore> = Arc::new(MemoryItemStore::new(vec![CandidateItem {
        id: 1,
        title: "Unscripted headline".into(),
        body: "Some body text".into(),
        source: "Telex".into(),
        published_at: now,
        processed: false,
    }]));
    let quota_store: Arc<dyn QuotaStore> = Arc::new(MemoryQuotaStore::new(None));
    let classifier: DynClassifier = Arc::new(ScriptedClassifier::new());
    let generator: DynGenerator = Arc::new(ScriptedGenerator::new());

    let mut cfg = PipelineConfig::default();
    cfg.lanes.item_delay_ms = 0;
    cfg.lanes.classify_delay_ms = 0;
    let orchestrator = Orchestrator::new(
        cfg,
        SourceTierTable::default_seed(),
        Roster::default_seed(),
        Services {
            classifier,
            generator,
            items,
            quota_store,
        },
    )
    .unwrap();

    let summary = orchestrator
        .run_at(SelectionMode::HourlyUpdate, now)
        .await
        .unwrap();
    assert_eq!(summary.selected, 1);
    assert_eq!(summary.classify_fallbacks, 1);

    let text = handle.render();
    for needle in [
        "pipeline_runs_total",
        "pipeline_selected_total",
        "pipeline_classify_fallback_total",
        "pipeline_items_succeeded_total",
        "pipeline_premium_used",
        "pipeline_last_run_ts",
        "pipeline_lane_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
