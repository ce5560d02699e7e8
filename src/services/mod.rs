// src/services/mod.rs
//! External collaborators: the classifier and the content generator.
//!
//! Both are opaque async services behind traits. This module also owns the
//! local recovery paths around them: the default classification used when
//! the classifier fails, tolerant parsing of model replies, and the
//! generation fallback chain ending in a templated emergency text.

pub mod mock;
pub mod openai;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::roster::WorkerProfile;
use crate::text::{clean_body, truncate_chars};
use crate::types::{
    CandidateItem, Category, ClassificationResult, Fingerprint, GeneratedContent, Resource,
    MAX_IMPORTANCE, MAX_KEY_ENTITIES, MIN_IMPORTANCE,
};

/// Characters of cleaned body kept by the emergency template.
pub const EMERGENCY_BODY_CHARS: usize = 800;

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, title: &str, body: &str) -> Result<ClassificationResult>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        item: &CandidateItem,
        classification: &ClassificationResult,
        worker: Option<&WorkerProfile>,
        resource: Resource,
    ) -> Result<GeneratedContent>;
    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;
pub type DynGenerator = Arc<dyn Generator>;

/// What to assume about an item the classifier could not handle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierDefaults {
    #[serde(default = "default_fallback_category")]
    pub fallback_category: Category,
    /// Midpoint of the 1..=20 scale.
    #[serde(default = "default_fallback_importance")]
    pub fallback_importance: u8,
    /// Title prefix used as the fallback main topic.
    #[serde(default = "default_fallback_topic_chars")]
    pub fallback_topic_chars: usize,
}

fn default_fallback_category() -> Category {
    Category::General
}
fn default_fallback_importance() -> u8 {
    10
}
fn default_fallback_topic_chars() -> usize {
    30
}

impl Default for ClassifierDefaults {
    fn default() -> Self {
        Self {
            fallback_category: default_fallback_category(),
            fallback_importance: default_fallback_importance(),
            fallback_topic_chars: default_fallback_topic_chars(),
        }
    }
}

/// Classification applied when the classifier errors or times out.
pub fn default_classification(title: &str, defaults: &ClassifierDefaults) -> ClassificationResult {
    ClassificationResult {
        category: defaults.fallback_category,
        importance: defaults.fallback_importance,
        fingerprint: Fingerprint {
            main_topic: truncate_chars(title.trim(), defaults.fallback_topic_chars),
            key_entities: Vec::new(),
        },
    }
    .sanitized()
}

/// Last-resort content when every generation resource failed.
pub fn emergency_content(
    item: &CandidateItem,
    classification: &ClassificationResult,
) -> GeneratedContent {
    let cleaned = clean_body(&item.body);
    let excerpt = if cleaned.is_empty() {
        clean_body(&item.title)
    } else {
        truncate_chars(&cleaned, EMERGENCY_BODY_CHARS)
    };
    GeneratedContent {
        title: item.title.trim().to_string(),
        body: format!("{excerpt}\n\nSource: {}", item.source),
        sentiment: "neutral".to_string(),
        keywords: vec![
            item.source.clone(),
            "news".to_string(),
            classification.category.as_str().to_string(),
        ],
    }
}

/// Outcome of the fallback chain: the content and the resource that produced
/// it (`None` for the emergency template).
#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    pub content: GeneratedContent,
    pub produced_by: Option<Resource>,
}

/// Try `resource`, then standard (when premium failed), then the template.
/// Each attempt is bounded by `call_timeout`; a timeout counts as a failure.
pub async fn generate_with_fallback(
    generator: &dyn Generator,
    item: &CandidateItem,
    classification: &ClassificationResult,
    worker: Option<&WorkerProfile>,
    resource: Resource,
    call_timeout: Duration,
) -> Produced {
    let mut chain = vec![resource];
    if resource == Resource::Premium {
        chain.push(Resource::Standard);
    }

    for attempt in chain {
        let call = generator.generate(item, classification, worker, attempt);
        match tokio::time::timeout(call_timeout, call).await {
            Ok(Ok(content)) => {
                return Produced {
                    content: sign(content, worker),
                    produced_by: Some(attempt),
                };
            }
            Ok(Err(e)) => {
                warn!(item = item.id, resource = %attempt, error = %e, "generation failed");
            }
            Err(_) => {
                warn!(
                    item = item.id,
                    resource = %attempt,
                    timeout_secs = call_timeout.as_secs(),
                    "generation timed out"
                );
            }
        }
    }

    warn!(item = item.id, "all generation resources failed, using emergency template");
    Produced {
        content: sign(emergency_content(item, classification), worker),
        produced_by: None,
    }
}

/// Append the worker byline to the body.
fn sign(mut content: GeneratedContent, worker: Option<&WorkerProfile>) -> GeneratedContent {
    if let Some(w) = worker {
        if !content.body.is_empty() {
            content.body.push_str(&format!("\n\n--- {} ---", w.name));
        }
    }
    content
}

/// First `{ ... }` block of a model reply (models like to wrap JSON in prose
/// or code fences).
pub fn extract_json_object(raw: &str) -> Option<&str> {
    static RE_OBJ: OnceCell<Option<Regex>> = OnceCell::new();
    RE_OBJ
        .get_or_init(|| Regex::new(r"(?s)\{.*\}").ok())
        .as_ref()?
        .find(raw)
        .map(|m| m.as_str())
}

/// Tolerant parse of a classifier reply.
///
/// Accepts the fingerprint either nested (`"fingerprint": {...}`) or flat
/// (`main_topic`, `key_entities`), importance as number or numeric string.
/// Unknown categories map to `general`; importance is clamped to 1..=20.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult> {
    let json = extract_json_object(raw).ok_or_else(|| anyhow!("no JSON object in reply"))?;
    let v: Value = serde_json::from_str(json).context("classifier reply is not valid JSON")?;

    let category = v
        .get("category")
        .and_then(Value::as_str)
        .map(Category::parse_lenient)
        .unwrap_or(Category::General);

    let importance = v
        .get("importance")
        .or_else(|| v.get("importance_score"))
        .and_then(parse_number)
        .ok_or_else(|| anyhow!("missing or non-numeric importance"))?;
    let importance = importance
        .round()
        .clamp(f64::from(MIN_IMPORTANCE), f64::from(MAX_IMPORTANCE)) as u8;

    let fp = v.get("fingerprint").unwrap_or(&v);
    let main_topic = fp
        .get("main_topic")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let key_entities = fp
        .get("key_entities")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(MAX_KEY_ENTITIES)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(ClassificationResult {
        category,
        importance,
        fingerprint: Fingerprint {
            main_topic,
            key_entities,
        },
    })
}

/// Tolerant parse of a generator reply. Keywords may be a list or a
/// comma-separated string; a missing title falls back to the item title.
pub fn parse_generated(raw: &str, fallback_title: &str) -> Result<GeneratedContent> {
    let json = extract_json_object(raw).ok_or_else(|| anyhow!("no JSON object in reply"))?;
    let v: Value = serde_json::from_str(json).context("generator reply is not valid JSON")?;

    let text = |key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let body = text("article_body")
        .or_else(|| text("body"))
        .ok_or_else(|| anyhow!("reply has no article body"))?;
    let title = text("title").unwrap_or_else(|| fallback_title.trim().to_string());
    let sentiment = text("sentiment").unwrap_or_else(|| "neutral".to_string());
    let keywords = match v.get("keywords") {
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Ok(GeneratedContent {
        title,
        body,
        sentiment,
        keywords,
    })
}

fn parse_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}
