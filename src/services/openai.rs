// src/services/openai.rs
//! OpenAI Chat Completions adapters for the classifier and the generator.
//! Requires an API key (config value or `OPENAI_API_KEY` when set to "ENV").

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{parse_classification, parse_generated, Classifier, Generator};
use crate::roster::WorkerProfile;
use crate::text::{clean_body, truncate_chars};
use crate::types::{CandidateItem, Category, ClassificationResult, GeneratedContent, Resource};

const USER_AGENT: &str = "newsdesk-dispatch/0.1";
/// Body characters sent to the classifier.
const CLASSIFY_BODY_CHARS: usize = 1500;
/// Body characters sent to the generator.
const GENERATE_BODY_CHARS: usize = 6000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_standard_model")]
    pub standard_model: String,
    #[serde(default = "default_premium_model")]
    pub premium_model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_standard_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_premium_model() -> String {
    "gpt-4o".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            standard_model: default_standard_model(),
            premium_model: default_premium_model(),
            api_key: default_api_key(),
        }
    }
}

impl OpenAiConfig {
    /// Resolve the "ENV" placeholder.
    pub fn resolved_api_key(&self) -> Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            std::env::var("OPENAI_API_KEY").map_err(|_| anyhow!("Missing OPENAI_API_KEY env var"))
        } else {
            Ok(self.api_key.trim().to_string())
        }
    }

    pub fn model_for(&self, resource: Resource) -> &str {
        match resource {
            Resource::Standard => &self.standard_model,
            Resource::Premium => &self.premium_model,
        }
    }
}

/// Word count requested per resource.
pub fn word_count(resource: Resource) -> &'static str {
    match resource {
        Resource::Premium => "1000-1400",
        Resource::Standard => "600-900",
    }
}

/// Shared HTTP plumbing for both adapters.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    cfg: OpenAiConfig,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: String,
}

impl OpenAiClient {
    pub fn new(cfg: OpenAiConfig, timeout: Duration) -> Result<Self> {
        let api_key = cfg.resolved_api_key()?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { http, api_key, cfg })
    }

    async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let req = Req {
            model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens,
        };
        let url = format!("{}/chat/completions", self.cfg.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("chat completion returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("decoding chat completion")?;
        extract_content(body)
    }
}

fn extract_content(body: Resp) -> Result<String> {
    let content = body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();
    let content = content.trim();
    if content.is_empty() {
        bail!("empty completion");
    }
    Ok(content.to_string())
}

pub struct OpenAiClassifier {
    client: OpenAiClient,
}

impl OpenAiClassifier {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn classify_prompt(title: &str, body: &str) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Title: {title}\n\nText: {body}\n\n\
         Reply with JSON only:\n\
         {{\"category\": one of [{categories}], \
         \"importance\": integer 1-20, \
         \"fingerprint\": {{\"main_topic\": \"2-5 word topic\", \
         \"key_entities\": [\"at most 4 names\"]}}}}"
    )
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, title: &str, body: &str) -> Result<ClassificationResult> {
        let body = truncate_chars(&clean_body(body), CLASSIFY_BODY_CHARS);
        let prompt = classify_prompt(title, &body);
        let system = "You are a news desk editor. Classify the article and rate its importance. \
                      Output only the JSON object.";
        let reply = self
            .client
            .chat(&self.client.cfg.standard_model, system, &prompt, 0.2, 300)
            .await?;
        Ok(parse_classification(&reply)?.sanitized())
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

pub struct OpenAiGenerator {
    client: OpenAiClient,
}

impl OpenAiGenerator {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn generate_prompt(
    item: &CandidateItem,
    classification: &ClassificationResult,
    worker: Option<&WorkerProfile>,
    resource: Resource,
) -> String {
    let byline = match worker {
        Some(w) => format!("You write as {}, the {} desk.", w.name, classification.category),
        None => "You write for the general news desk.".to_string(),
    };
    let body = truncate_chars(&clean_body(&item.body), GENERATE_BODY_CHARS);
    format!(
        "{byline}\nWrite a {words} word article based on the source below.\n\n\
         Source: {source}\nTitle: {title}\nContent: {body}\n\n\
         Reply with JSON only:\n\
         {{\"title\": \"...\", \"article_body\": \"...\", \
         \"sentiment\": \"positive|neutral|negative\", \"keywords\": [\"...\"]}}",
        words = word_count(resource),
        source = item.source,
        title = item.title,
    )
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        item: &CandidateItem,
        classification: &ClassificationResult,
        worker: Option<&WorkerProfile>,
        resource: Resource,
    ) -> Result<GeneratedContent> {
        let prompt = generate_prompt(item, classification, worker, resource);
        let (temperature, max_tokens) = match resource {
            Resource::Premium => (0.6, 4000),
            Resource::Standard => (0.4, 3000),
        };
        let system = "You are a newsroom journalist. Output only the JSON object.";
        let reply = self
            .client
            .chat(
                self.client.cfg.model_for(resource),
                system,
                &prompt,
                temperature,
                max_tokens,
            )
            .await?;
        parse_generated(&reply, &item.title)
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn explicit_key_is_used_verbatim() {
        let cfg = OpenAiConfig {
            api_key: " sk-test ".into(),
            ..OpenAiConfig::default()
        };
        assert_eq!(cfg.resolved_api_key().unwrap(), "sk-test");
        assert_eq!(cfg.model_for(Resource::Premium), "gpt-4o");
        assert_eq!(cfg.model_for(Resource::Standard), "gpt-4o-mini");
    }

    #[test]
    fn empty_completion_is_an_error() {
        let empty: Resp = serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(extract_content(empty).is_err());
        let none: Resp = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_content(none).is_err());
        let ok: Resp =
            serde_json::from_str(r#"{"choices":[{"message":{"content":" {\"a\":1} "}}]}"#).unwrap();
        assert_eq!(extract_content(ok).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn prompts_carry_word_count_and_categories() {
        let item = CandidateItem {
            id: 1,
            title: "Chip plant opens".into(),
            body: "<p>Details</p>".into(),
            source: "The Verge".into(),
            published_at: Utc::now(),
            processed: false,
        };
        let c = ClassificationResult {
            category: Category::Tech,
            importance: 15,
            fingerprint: Default::default(),
        };
        let p = generate_prompt(&item, &c, None, Resource::Premium);
        assert!(p.contains("1000-1400"));
        assert!(p.contains("Content: Details"));
        assert!(generate_prompt(&item, &c, None, Resource::Standard).contains("600-900"));
        assert!(classify_prompt("t", "b").contains("politics, economy, tech"));
    }
}
