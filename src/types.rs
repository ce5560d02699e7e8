//! # Core data model
//! Plain data shared by every pipeline stage: candidate items, classifier
//! output, lanes, generation resources and the per-item outcome written back
//! to the item store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of editorial categories the classifier may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Economy,
    Tech,
    Sport,
    Entertainment,
    Foreign,
    Lifestyle,
    Cars,
    General,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Politics,
        Category::Economy,
        Category::Tech,
        Category::Sport,
        Category::Entertainment,
        Category::Foreign,
        Category::Lifestyle,
        Category::Cars,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Economy => "economy",
            Category::Tech => "tech",
            Category::Sport => "sport",
            Category::Entertainment => "entertainment",
            Category::Foreign => "foreign",
            Category::Lifestyle => "lifestyle",
            Category::Cars => "cars",
            Category::General => "general",
        }
    }

    /// Lenient parse for classifier replies: unknown labels become `General`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Category::General)
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| anyhow::anyhow!("unknown category: {s}"))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw ingested item as handed over by the item store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
}

/// Compact topic signature used for near-duplicate detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub main_topic: String,
    #[serde(default)]
    pub key_entities: Vec<String>,
}

/// Upper bound on entities kept per fingerprint.
pub const MAX_KEY_ENTITIES: usize = 4;

impl Fingerprint {
    pub fn new<S: Into<String>>(main_topic: S, entities: &[&str]) -> Self {
        Self {
            main_topic: main_topic.into(),
            key_entities: entities
                .iter()
                .take(MAX_KEY_ENTITIES)
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Importance scale used by the classifier.
pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub importance: u8,
    pub fingerprint: Fingerprint,
}

impl ClassificationResult {
    /// Clamp importance into 1..=20 and cap the entity list.
    pub fn sanitized(mut self) -> Self {
        self.importance = self.importance.clamp(MIN_IMPORTANCE, MAX_IMPORTANCE);
        self.fingerprint.key_entities.truncate(MAX_KEY_ENTITIES);
        self
    }
}

/// A candidate item together with its (possibly defaulted) classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItem {
    pub item: CandidateItem,
    pub classification: ClassificationResult,
    /// True when the classifier failed and defaults were applied.
    pub defaulted: bool,
}

impl ClassifiedItem {
    pub fn id(&self) -> u64 {
        self.item.id
    }

    pub fn category(&self) -> Category {
        self.classification.category
    }

    pub fn importance(&self) -> u8 {
        self.classification.importance
    }
}

/// Processing lane an item is routed to after deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Fast,
    Deep,
}

impl Lane {
    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Fast => "fast",
            Lane::Deep => "deep",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation resource tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Standard,
    Premium,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Standard => "standard",
            Resource::Premium => "premium",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the generator service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub body: String,
    #[serde(default = "default_sentiment")]
    pub sentiment: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

/// Terminal state of an item after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Disposition {
    /// Suppressed as a near-duplicate of a kept item.
    Duplicate { of: u64, similarity: f64 },
    /// Content was produced (possibly via the emergency template).
    Generated {
        lane: Lane,
        worker_id: Option<String>,
        worker_name: Option<String>,
        /// Resource granted by the quota router.
        resource: Resource,
        /// Resource that actually produced the content; `None` for the emergency template.
        produced_by: Option<Resource>,
        /// Content came from the emergency template.
        #[serde(default)]
        emergency: bool,
        content: GeneratedContent,
    },
}

/// Write-back record for the item store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: u64,
    pub classification: ClassificationResult,
    pub disposition: Disposition,
}

impl ItemOutcome {
    pub fn is_emergency(&self) -> bool {
        matches!(
            self.disposition,
            Disposition::Generated {
                emergency: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!("Politics".parse::<Category>().unwrap(), Category::Politics);
        assert_eq!(" TECH ".parse::<Category>().unwrap(), Category::Tech);
        assert!("weather".parse::<Category>().is_err());
        assert_eq!(Category::parse_lenient("weather"), Category::General);
    }

    #[test]
    fn sanitized_clamps_importance_and_entities() {
        let c = ClassificationResult {
            category: Category::Sport,
            importance: 42,
            fingerprint: Fingerprint {
                main_topic: "cup final".into(),
                key_entities: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            },
        }
        .sanitized();
        assert_eq!(c.importance, MAX_IMPORTANCE);
        assert_eq!(c.fingerprint.key_entities.len(), MAX_KEY_ENTITIES);

        let zero = ClassificationResult {
            importance: 0,
            ..c
        }
        .sanitized();
        assert_eq!(zero.importance, MIN_IMPORTANCE);
    }

    #[test]
    fn disposition_serializes_with_kind_tag() {
        let d = Disposition::Duplicate {
            of: 7,
            similarity: 0.8,
        };
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["kind"], "duplicate");
        assert_eq!(v["of"], 7);
    }

    #[test]
    fn emergency_flag_is_serialized() {
        let outcome = ItemOutcome {
            item_id: 3,
            classification: ClassificationResult {
                category: Category::Sport,
                importance: 8,
                fingerprint: Fingerprint::new("cup final", &["UEFA"]),
            },
            disposition: Disposition::Generated {
                lane: Lane::Fast,
                worker_id: None,
                worker_name: None,
                resource: Resource::Standard,
                produced_by: None,
                emergency: true,
                content: GeneratedContent {
                    title: "Cup final".into(),
                    body: "Cup final tonight\n\nSource: MTI".into(),
                    sentiment: "neutral".into(),
                    keywords: vec!["MTI".into(), "news".into(), "sport".into()],
                },
            },
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["disposition"]["kind"], "generated");
        assert_eq!(v["disposition"]["emergency"], true);
        assert!(v["disposition"]["produced_by"].is_null());

        let back: ItemOutcome = serde_json::from_value(v).unwrap();
        assert!(back.is_emergency());
    }
}
