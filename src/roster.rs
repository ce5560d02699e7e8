//! # Worker roster
//! Immutable registry of content-production specialists, loaded once at
//! startup from JSON (or the built-in seed). Registration order is the
//! matcher's tie-break order, so the roster keeps the file order verbatim.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::quota::QuotaState;
use crate::types::{Category, Resource};

/// Generation resource a worker prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredResource {
    Standard,
    Premium,
    /// Standard by default, premium from `premium_from` importance upward.
    Hybrid {
        #[serde(default = "default_hybrid_premium_from")]
        premium_from: u8,
    },
}

fn default_hybrid_premium_from() -> u8 {
    16
}

impl PreferredResource {
    /// Resolve the preference for a concrete item importance.
    pub fn resolve(self, importance: u8) -> Resource {
        match self {
            PreferredResource::Standard => Resource::Standard,
            PreferredResource::Premium => Resource::Premium,
            PreferredResource::Hybrid { premium_from } if importance >= premium_from => {
                Resource::Premium
            }
            PreferredResource::Hybrid { .. } => Resource::Standard,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: String,
    pub name: String,
    /// First entry is the primary specialty.
    pub specialties: Vec<Category>,
    pub preferred_resource: PreferredResource,
    pub min_importance: u8,
    pub max_daily_items: u32,
}

impl WorkerProfile {
    pub fn primary_specialty(&self) -> Option<Category> {
        self.specialties.first().copied()
    }

    pub fn covers(&self, category: Category) -> bool {
        self.specialties.contains(&category)
    }
}

/// Per-worker usage line for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerUsage {
    pub id: String,
    pub name: String,
    pub used: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    workers: Vec<WorkerProfile>,
}

impl Roster {
    /// Build a roster, rejecting duplicate ids, empty specialty lists and
    /// zero capacities.
    pub fn new(workers: Vec<WorkerProfile>) -> Result<Self> {
        let mut ids = HashSet::new();
        for w in &workers {
            if !ids.insert(w.id.as_str()) {
                bail!("duplicate worker id in roster: {}", w.id);
            }
            if w.specialties.is_empty() {
                bail!("worker {} has no specialties", w.id);
            }
            if w.max_daily_items == 0 {
                bail!("worker {} has max_daily_items = 0", w.id);
            }
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> &[WorkerProfile] {
        &self.workers
    }

    pub fn get(&self, id: &str) -> Option<&WorkerProfile> {
        self.workers.iter().find(|w| w.id == id)
    }

    /// Load a roster from JSON (`[ {worker}, ... ]` or `{ "workers": [...] }`).
    /// A missing file yields the seed; a malformed one is an error.
    pub fn load_or_seed<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "roster file not found, using built-in seed");
            return Ok(Self::default_seed());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading roster from {}", path.display()))?;
        let roster = Self::from_json(&raw)
            .with_context(|| format!("parsing roster {}", path.display()))?;
        info!(path = %path.display(), workers = roster.workers().len(), "roster loaded");
        Ok(roster)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RosterFile {
            List(Vec<WorkerProfile>),
            Wrapped { workers: Vec<WorkerProfile> },
        }
        let workers = match serde_json::from_str::<RosterFile>(raw)? {
            RosterFile::List(v) => v,
            RosterFile::Wrapped { workers } => workers,
        };
        Self::new(workers)
    }

    /// Usage snapshot against the current quota state, in registration order.
    pub fn usage_report(&self, quota: &QuotaState) -> Vec<WorkerUsage> {
        self.workers
            .iter()
            .map(|w| WorkerUsage {
                id: w.id.clone(),
                name: w.name.clone(),
                used: quota.worker_used(&w.id),
                limit: w.max_daily_items,
            })
            .collect()
    }

    /// Built-in desk: premium analysts, hybrid specialists and a standard team.
    pub fn default_seed() -> Self {
        use Category::*;
        use PreferredResource::*;

        let w = |id: &str,
                 name: &str,
                 specialties: &[Category],
                 preferred_resource: PreferredResource,
                 min_importance: u8,
                 max_daily_items: u32| WorkerProfile {
            id: id.to_string(),
            name: name.to_string(),
            specialties: specialties.to_vec(),
            preferred_resource,
            min_importance,
            max_daily_items,
        };

        Self {
            workers: vec![
                w("politics_analyst", "Aron Vass", &[Politics], Premium, 15, 3),
                w("markets_analyst", "Edit Kardos", &[Economy], Premium, 14, 4),
                w(
                    "senior_generalist",
                    "Henrik Sallai",
                    &[Politics, Economy, Foreign, Tech, General],
                    Premium,
                    16,
                    5,
                ),
                w("tech_desk", "Tamas Orban", &[Tech], Hybrid { premium_from: 15 }, 8, 6),
                w("business_desk", "Gizella Fekete", &[Economy], Hybrid { premium_from: 15 }, 9, 5),
                w("parliament_desk", "Peter Halasz", &[Politics], Standard, 6, 8),
                w("foreign_desk", "Karoly Nemeth", &[Foreign], Standard, 7, 6),
                w("culture_desk", "Karola Szabo", &[Entertainment, Lifestyle], Standard, 3, 8),
                w("celebrity_desk", "Beata Lukacs", &[Entertainment], Standard, 3, 7),
                w("lifestyle_desk", "Eleonora Bodnar", &[Lifestyle], Standard, 4, 6),
                w("sports_desk", "Sara Takacs", &[Sport], Standard, 5, 7),
                w("motoring_desk", "Aladar Varga", &[Cars], Standard, 4, 5),
            ],
        }
    }
}
