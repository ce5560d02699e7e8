//! # Priority scoring and fresh-item selection
//! Pure ranking over a read-only candidate pool. The composite score is
//! `source tier points + freshness bonus`; selection keeps unprocessed items
//! inside the mode's cutoff window and takes the top `max_items`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::source_tiers::SourceTierTable;
use crate::types::CandidateItem;

/// Operating mode of a run; each mode has its own window and cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    FirstRun,
    HourlyUpdate,
    Maintenance,
}

impl SelectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMode::FirstRun => "first_run",
            SelectionMode::HourlyUpdate => "hourly_update",
            SelectionMode::Maintenance => "maintenance",
        }
    }
}

/// Cutoff window and cap for one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeLimits {
    pub window_hours: i64,
    pub max_items: usize,
}

impl ModeLimits {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.window_hours)
    }
}

/// An item with its computed priority score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: CandidateItem,
    pub score: f64,
}

/// Result of `select`: ranked items plus the stale backlog size.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub items: Vec<ScoredItem>,
    /// Unprocessed items older than the cutoff (ignored this run).
    pub stale_unprocessed: usize,
}

pub struct PriorityScorer {
    tiers: SourceTierTable,
}

impl PriorityScorer {
    pub fn new(tiers: SourceTierTable) -> Self {
        Self { tiers }
    }

    /// `source points + freshness bonus` for one item at `now`.
    pub fn score(&self, item: &CandidateItem, now: DateTime<Utc>) -> f64 {
        score(item, &self.tiers, now)
    }

    /// Rank the pool and keep the top `limits.max_items` fresh, unprocessed items.
    ///
    /// Ordering: score desc, then more recent `published_at`, then input order.
    pub fn select(
        &self,
        pool: &[CandidateItem],
        now: DateTime<Utc>,
        limits: ModeLimits,
    ) -> Selection {
        let cutoff = limits.cutoff(now);

        let mut stale_unprocessed = 0usize;
        let mut ranked: Vec<ScoredItem> = Vec::with_capacity(pool.len());
        for item in pool.iter().filter(|i| !i.processed) {
            if item.published_at < cutoff {
                stale_unprocessed += 1;
                continue;
            }
            ranked.push(ScoredItem {
                score: self.score(item, now),
                item: item.clone(),
            });
        }

        // Stable sort keeps input order as the last tie-breaker.
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.item.published_at.cmp(&a.item.published_at))
        });
        ranked.truncate(limits.max_items);

        Selection {
            items: ranked,
            stale_unprocessed,
        }
    }
}

/// Free-function form of the score, for callers that hold only a table.
pub fn score(item: &CandidateItem, tiers: &SourceTierTable, now: DateTime<Utc>) -> f64 {
    let entry = tiers.lookup(&item.source);
    let age = now - item.published_at;
    let profile = entry.freshness;

    let bonus = if age <= Duration::minutes(profile.breaking_minutes) {
        profile.breaking_bonus
    } else if age <= Duration::minutes(profile.fresh_minutes) {
        profile.fresh_bonus
    } else {
        0.0
    };

    entry.tier.points() + bonus
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn item(id: u64, source: &str, minutes_ago: i64) -> CandidateItem {
        CandidateItem {
            id,
            title: format!("item {id}"),
            body: String::new(),
            source: source.to_string(),
            published_at: now() - Duration::minutes(minutes_ago),
            processed: false,
        }
    }

    fn scorer() -> PriorityScorer {
        PriorityScorer::new(SourceTierTable::default_seed())
    }

    #[test]
    fn breaking_fresh_and_old_bonuses() {
        let s = scorer();
        assert_eq!(s.score(&item(1, "ProPublica", 10), now()), 240.0);
        assert_eq!(s.score(&item(2, "ProPublica", 30), now()), 240.0);
        assert_eq!(s.score(&item(3, "ProPublica", 31), now()), 170.0);
        assert_eq!(s.score(&item(4, "ProPublica", 120), now()), 170.0);
        assert_eq!(s.score(&item(5, "ProPublica", 121), now()), 120.0);
    }

    #[test]
    fn unknown_source_scores_lowest_tier() {
        let s = scorer();
        assert_eq!(s.score(&item(1, "Random Blog", 500), now()), 30.0);
    }

    #[test]
    fn select_filters_window_and_processed() {
        let s = scorer();
        let mut done = item(3, "Telex", 5);
        done.processed = true;
        let pool = vec![item(1, "Telex", 5), item(2, "Telex", 300), done];
        let sel = s.select(
            &pool,
            now(),
            ModeLimits {
                window_hours: 2,
                max_items: 10,
            },
        );
        assert_eq!(sel.items.len(), 1);
        assert_eq!(sel.items[0].item.id, 1);
        assert_eq!(sel.stale_unprocessed, 1);
    }

    #[test]
    fn select_orders_by_score_then_recency_then_input() {
        let s = scorer();
        let pool = vec![
            item(1, "Index", 60),       // 60 + 50
            item(2, "ProPublica", 90),  // 120 + 50
            item(3, "Index", 45),       // 60 + 50, newer than #1
            item(4, "Index", 60),       // ties #1 fully; input order keeps #1 first
            item(5, "Random", 5),       // 30 + 120
        ];
        let sel = s.select(
            &pool,
            now(),
            ModeLimits {
                window_hours: 24,
                max_items: 4,
            },
        );
        let ids: Vec<u64> = sel.items.iter().map(|s| s.item.id).collect();
        assert_eq!(ids, vec![2, 5, 3, 1]);
    }

    #[test]
    fn selection_is_deterministic() {
        let s = scorer();
        let pool: Vec<CandidateItem> = (0..30)
            .map(|i| item(i, if i % 3 == 0 { "HVG" } else { "444.hu" }, (i as i64) * 7))
            .collect();
        let limits = ModeLimits {
            window_hours: 2,
            max_items: 8,
        };
        let a: Vec<u64> = s.select(&pool, now(), limits).items.iter().map(|x| x.item.id).collect();
        let b: Vec<u64> = s.select(&pool, now(), limits).items.iter().map(|x| x.item.id).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }
}
