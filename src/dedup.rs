//! Near-duplicate suppression over classifier fingerprints.
//!
//! Items are visited in descending importance (stable for ties). Each item is
//! compared against every item already kept; the first kept item whose
//! similarity exceeds the threshold marks it as a duplicate. Kept items are
//! never displaced, so the most important story of a cluster always wins.
//!
//! Similarity = `topic_weight * topic + entity_weight * entities` where
//! `topic` is normalized Levenshtein similarity of the lower-cased main topics
//! and `entities` is the Jaccard index of the lower-cased entity sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::text::anon_hash;
use crate::types::{ClassifiedItem, Fingerprint};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupParams {
    /// Strictly-greater-than threshold for "duplicate".
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_topic_weight")]
    pub topic_weight: f64,
    #[serde(default = "default_entity_weight")]
    pub entity_weight: f64,
}

fn default_threshold() -> f64 {
    0.55
}
fn default_topic_weight() -> f64 {
    0.6
}
fn default_entity_weight() -> f64 {
    0.4
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            topic_weight: default_topic_weight(),
            entity_weight: default_entity_weight(),
        }
    }
}

/// A suppressed item and the kept item it collided with.
#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub item: ClassifiedItem,
    pub kept_id: u64,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Kept items, in descending importance order.
    pub kept: Vec<ClassifiedItem>,
    /// Suppressed items, in the order they were visited.
    pub duplicates: Vec<Duplicate>,
}

#[derive(Debug, Clone)]
pub struct DeduplicationEngine {
    params: DedupParams,
}

impl DeduplicationEngine {
    pub fn new(mut params: DedupParams) -> Self {
        params.threshold = params.threshold.clamp(0.0, 1.0);
        Self { params }
    }

    pub fn similarity(&self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        self.params.topic_weight * topic_similarity(&a.main_topic, &b.main_topic)
            + self.params.entity_weight * entity_overlap(&a.key_entities, &b.key_entities)
    }

    pub fn dedupe(&self, items: Vec<ClassifiedItem>) -> DedupOutcome {
        let mut sorted = items;
        sorted.sort_by(|a, b| b.importance().cmp(&a.importance()));

        let mut out = DedupOutcome::default();
        for candidate in sorted {
            let hit = out.kept.iter().find_map(|kept| {
                let sim = self.similarity(
                    &candidate.classification.fingerprint,
                    &kept.classification.fingerprint,
                );
                (sim > self.params.threshold).then_some((kept.id(), sim))
            });

            match hit {
                Some((kept_id, similarity)) => {
                    debug!(
                        target: "dedup",
                        item = candidate.id(),
                        kept = kept_id,
                        similarity,
                        title = %anon_hash(&candidate.item.title),
                        "duplicate suppressed"
                    );
                    out.duplicates.push(Duplicate {
                        item: candidate,
                        kept_id,
                        similarity,
                    });
                }
                None => out.kept.push(candidate),
            }
        }
        out
    }
}

/// Case-insensitive normalized edit-distance similarity in [0, 1].
/// Blank topics carry no signal and score 0.
pub fn topic_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Jaccard index of lower-cased entity sets; 0 when either side is empty.
pub fn entity_overlap(a: &[String], b: &[String]) -> f64 {
    let sa: BTreeSet<String> = lowered(a);
    let sb: BTreeSet<String> = lowered(b);
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    inter / union
}

fn lowered(v: &[String]) -> BTreeSet<String> {
    v.iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
