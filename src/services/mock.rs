// src/services/mock.rs
//! Network-free services: disabled/offline implementations for local runs and
//! scripted ones for tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::{emergency_content, Classifier, Generator};
use crate::roster::WorkerProfile;
use crate::text::{clean_body, truncate_chars};
use crate::types::{CandidateItem, ClassificationResult, GeneratedContent, Resource};

/// Always fails, so every item gets the default classification.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _title: &str, _body: &str) -> Result<ClassificationResult> {
        bail!("classifier disabled")
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Offline generator: deterministic content from the cleaned body, longer
/// excerpt for premium.
pub struct TemplateGenerator;

#[async_trait]
impl Generator for TemplateGenerator {
    async fn generate(
        &self,
        item: &CandidateItem,
        classification: &ClassificationResult,
        _worker: Option<&WorkerProfile>,
        resource: Resource,
    ) -> Result<GeneratedContent> {
        let chars = match resource {
            Resource::Premium => 1600,
            Resource::Standard => 600,
        };
        let body = truncate_chars(&clean_body(&item.body), chars);
        if body.is_empty() {
            bail!("item {} has no body to template from", item.id);
        }
        let base = emergency_content(item, classification);
        Ok(GeneratedContent { body, ..base })
    }
    fn name(&self) -> &'static str {
        "template"
    }
}

/// Classifier answering from a title → result table; unknown titles fail.
#[derive(Default)]
pub struct ScriptedClassifier {
    answers: HashMap<String, ClassificationResult>,
    delay: Option<Duration>,
    calls: Mutex<usize>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, title: &str, result: ClassificationResult) -> Self {
        self.answers.insert(title.to_string(), result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, title: &str, _body: &str) -> Result<ClassificationResult> {
        *self.calls.lock().unwrap_or_else(|p| p.into_inner()) += 1;
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        match self.answers.get(title) {
            Some(r) => Ok(r.clone()),
            None => bail!("no scripted classification for this title"),
        }
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Generator with failure injection per resource or per item id, and a call log.
#[derive(Default)]
pub struct ScriptedGenerator {
    failing_resources: HashSet<Resource>,
    failing_items: HashSet<u64>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(u64, Resource)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_resource(mut self, resource: Resource) -> Self {
        self.failing_resources.insert(resource);
        self
    }

    /// Every resource fails for this item.
    pub fn fail_item(mut self, item_id: u64) -> Self {
        self.failing_items.insert(item_id);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(item id, resource)` for every call, in call order.
    pub fn calls(&self) -> Vec<(u64, Resource)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        item: &CandidateItem,
        classification: &ClassificationResult,
        worker: Option<&WorkerProfile>,
        resource: Resource,
    ) -> Result<GeneratedContent> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((item.id, resource));
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.failing_resources.contains(&resource) || self.failing_items.contains(&item.id) {
            bail!("scripted {resource} failure for item {}", item.id);
        }
        Ok(GeneratedContent {
            title: item.title.clone(),
            body: format!(
                "[{resource}] {} by {}",
                classification.fingerprint.main_topic,
                worker.map(|w| w.id.as_str()).unwrap_or("desk")
            ),
            sentiment: "neutral".to_string(),
            keywords: vec![classification.category.as_str().to_string()],
        })
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}
