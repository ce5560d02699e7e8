//! # Source Tiers
//!
//! Static mapping from feed source names (e.g. "BBC News World", "Telex")
//! to an ordered tier and a freshness profile, used by the priority scorer.
//!
//! - Loads from JSON config (sources + aliases + optional profiles).
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases can map alternative spellings to canonical sources.
//! - Fallback order: aliases → exact match → lowest tier.
//! - Includes a built-in `default_seed()` with the known feed roster.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};
use tracing::warn;

/// Ordered source tiers, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    EliteInvestigative,
    EliteGlobal,
    EliteTech,
    PremiumDomestic,
    StandardDomestic,
    Other,
}

impl SourceTier {
    /// Fixed point value per tier; strictly decreasing in tier order.
    pub fn points(self) -> f64 {
        match self {
            SourceTier::EliteInvestigative => 120.0,
            SourceTier::EliteGlobal => 110.0,
            SourceTier::EliteTech => 100.0,
            SourceTier::PremiumDomestic => 80.0,
            SourceTier::StandardDomestic => 60.0,
            SourceTier::Other => 30.0,
        }
    }
}

/// Freshness bonus windows. `breaking` wins over `fresh` when both apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreshnessProfile {
    #[serde(default = "default_breaking_minutes")]
    pub breaking_minutes: i64,
    #[serde(default = "default_breaking_bonus")]
    pub breaking_bonus: f64,
    #[serde(default = "default_fresh_minutes")]
    pub fresh_minutes: i64,
    #[serde(default = "default_fresh_bonus")]
    pub fresh_bonus: f64,
}

fn default_breaking_minutes() -> i64 {
    30
}
fn default_breaking_bonus() -> f64 {
    120.0
}
fn default_fresh_minutes() -> i64 {
    120
}
fn default_fresh_bonus() -> f64 {
    50.0
}

impl Default for FreshnessProfile {
    fn default() -> Self {
        Self {
            breaking_minutes: default_breaking_minutes(),
            breaking_bonus: default_breaking_bonus(),
            fresh_minutes: default_fresh_minutes(),
            fresh_bonus: default_fresh_bonus(),
        }
    }
}

/// Resolved lookup result for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTierEntry {
    pub tier: SourceTier,
    pub freshness: FreshnessProfile,
}

/// Source tier table, loaded from JSON or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceTierTable {
    /// Freshness profile for sources without an override.
    #[serde(default)]
    pub default_freshness: FreshnessProfile,
    /// Canonical (normalized) source name → tier.
    #[serde(default)]
    pub sources: HashMap<String, SourceTier>,
    /// Aliases mapping non-canonical names → canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Per-source freshness overrides, keyed by canonical name.
    #[serde(default)]
    pub freshness: HashMap<String, FreshnessProfile>,
}

impl SourceTierTable {
    /// Load from a JSON file; falls back to `default_seed()` when the file is
    /// missing or unreadable.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<SourceTierTable>(&s) {
                Ok(t) => t.normalized(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid source tier table, using seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    /// Re-key every map by its normalized name so lookups are stable.
    fn normalized(self) -> Self {
        Self {
            default_freshness: self.default_freshness,
            sources: self
                .sources
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
            freshness: self
                .freshness
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
        }
    }

    /// Resolve tier + freshness profile for a source name.
    ///
    /// Unknown sources always get `SourceTier::Other`, the lowest tier.
    pub fn lookup(&self, source: &str) -> SourceTierEntry {
        let s = normalize(source);
        let canon = self.aliases.get(&s).cloned().unwrap_or(s);
        let tier = self
            .sources
            .get(&canon)
            .copied()
            .unwrap_or(SourceTier::Other);
        let freshness = self
            .freshness
            .get(&canon)
            .copied()
            .unwrap_or(self.default_freshness);
        SourceTierEntry { tier, freshness }
    }

    /// Built-in seed with the known feed roster.
    pub fn default_seed() -> Self {
        let mut sources = HashMap::new();
        let tiers: [(SourceTier, &[&str]); 5] = [
            (
                SourceTier::EliteInvestigative,
                &[
                    "The Intercept",
                    "ProPublica",
                    "Bellingcat",
                    "OCCRP",
                    "The Economist - Finance",
                    "The Economist - Business",
                    "Bloomberg Markets",
                ],
            ),
            (
                SourceTier::EliteGlobal,
                &["BBC News UK", "BBC News World", "CNN Latest", "The Guardian World"],
            ),
            (
                SourceTier::EliteTech,
                &["TechCrunch", "The Verge", "WIRED Business", "Ars Technica"],
            ),
            (
                SourceTier::PremiumDomestic,
                &["Portfolio", "G7", "HVG", "Telex", "Válasz Online", "Qubit"],
            ),
            (
                SourceTier::StandardDomestic,
                &["Index", "24.hu", "444.hu", "Magyar Nemzet"],
            ),
        ];
        for (tier, names) in tiers {
            for name in names {
                sources.insert(normalize(name), tier);
            }
        }

        let mut aliases = HashMap::new();
        for (a, c) in [
            ("bbc", "bbc news world"),
            ("bbc world", "bbc news world"),
            ("guardian", "the guardian world"),
            ("economist finance", "the economist finance"),
            ("wired", "wired business"),
            ("index.hu", "index"),
            ("hvg.hu", "hvg"),
            ("telex.hu", "telex"),
        ] {
            aliases.insert(normalize(a), normalize(c));
        }

        Self {
            default_freshness: FreshnessProfile::default(),
            sources,
            aliases,
            freshness: HashMap::new(),
        }
    }
}

/// Lowercase, replace punctuation/dashes with spaces, collapse spaces.
/// Dots inside domain-like names ("24.hu") are kept.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', ',', '’', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_monotonic() {
        let order = [
            SourceTier::EliteInvestigative,
            SourceTier::EliteGlobal,
            SourceTier::EliteTech,
            SourceTier::PremiumDomestic,
            SourceTier::StandardDomestic,
            SourceTier::Other,
        ];
        for w in order.windows(2) {
            assert!(w[0].points() > w[1].points());
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn exact_and_case_insensitive_match() {
        let t = SourceTierTable::default_seed();
        assert_eq!(t.lookup("ProPublica").tier, SourceTier::EliteInvestigative);
        assert_eq!(t.lookup("PROPUBLICA").tier, SourceTier::EliteInvestigative);
        assert_eq!(t.lookup("24.hu").tier, SourceTier::StandardDomestic);
    }

    #[test]
    fn dash_normalization_matches_canonical() {
        let t = SourceTierTable::default_seed();
        assert_eq!(t.lookup("The Economist — Finance").tier, SourceTier::EliteInvestigative);
        assert_eq!(t.lookup("The Economist-Finance").tier, SourceTier::EliteInvestigative);
    }

    #[test]
    fn alias_resolves_to_canonical() {
        let t = SourceTierTable::default_seed();
        assert_eq!(t.lookup("Telex.hu").tier, SourceTier::PremiumDomestic);
        assert_eq!(t.lookup("BBC").tier, SourceTier::EliteGlobal);
    }

    #[test]
    fn unknown_source_gets_lowest_tier() {
        let t = SourceTierTable::default_seed();
        let e = t.lookup("Some Blog");
        assert_eq!(e.tier, SourceTier::Other);
        assert_eq!(e.freshness, FreshnessProfile::default());
    }

    #[test]
    fn json_overrides_and_profiles_load() {
        // an unknown-source tier key is not honoured: unknown stays lowest
        let json = r#"{
            "default_tier": "standard_domestic",
            "sources": { "Local Wire": "elite_global" },
            "aliases": { "LW": "local wire" },
            "freshness": { "local wire": { "breaking_minutes": 10, "breaking_bonus": 200.0 } }
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tiers.json");
        std::fs::write(&p, json).unwrap();

        let t = SourceTierTable::load_from_file(&p);
        let e = t.lookup("lw");
        assert_eq!(e.tier, SourceTier::EliteGlobal);
        assert_eq!(e.freshness.breaking_minutes, 10);
        assert_eq!(e.freshness.fresh_minutes, 120);
        assert_eq!(t.lookup("nobody").tier, SourceTier::Other);
        assert_eq!(t.lookup("Local Wire").tier, SourceTier::EliteGlobal);
    }

    #[test]
    fn missing_file_falls_back_to_seed() {
        let t = SourceTierTable::load_from_file("definitely/not/here.json");
        assert_eq!(t.lookup("Telex").tier, SourceTier::PremiumDomestic);
    }
}
