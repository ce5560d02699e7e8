// src/config/mod.rs
//! Pipeline configuration (TOML).
//!
//! Lookup order for the file:
//! 1) explicit path (CLI `--config`)
//! 2) $NEWSDESK_CONFIG_PATH
//! 3) config/newsdesk.toml
//!
//! A missing default file yields the built-in defaults. Every section and key
//! is optional. `NEWSDESK_DEDUP_THRESHOLD` and `NEWSDESK_PREMIUM_LIMIT`
//! override the file after loading.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::channel::ChannelRules;
use crate::dedup::DedupParams;
use crate::error::PipelineError;
use crate::priority::{ModeLimits, SelectionMode};
use crate::quota_router::QuotaPolicy;
use crate::services::openai::OpenAiConfig;
use crate::services::ClassifierDefaults;

pub const ENV_CONFIG_PATH: &str = "NEWSDESK_CONFIG_PATH";
pub const ENV_DEDUP_THRESHOLD: &str = "NEWSDESK_DEDUP_THRESHOLD";
pub const ENV_PREMIUM_LIMIT: &str = "NEWSDESK_PREMIUM_LIMIT";
pub const DEFAULT_CONFIG_PATH: &str = "config/newsdesk.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub dedup: DedupParams,
    #[serde(default)]
    pub channels: ChannelRules,
    #[serde(default)]
    pub quota: QuotaPolicy,
    #[serde(default)]
    pub lanes: LaneConfig,
    #[serde(default)]
    pub classifier: ClassifierDefaults,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// Window and cap per operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_first_run")]
    pub first_run: ModeLimits,
    #[serde(default = "default_hourly_update")]
    pub hourly_update: ModeLimits,
    #[serde(default = "default_maintenance")]
    pub maintenance: ModeLimits,
}

fn default_first_run() -> ModeLimits {
    ModeLimits {
        window_hours: 24,
        max_items: 200,
    }
}
fn default_hourly_update() -> ModeLimits {
    ModeLimits {
        window_hours: 2,
        max_items: 100,
    }
}
fn default_maintenance() -> ModeLimits {
    ModeLimits {
        window_hours: 1,
        max_items: 50,
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            first_run: default_first_run(),
            hourly_update: default_hourly_update(),
            maintenance: default_maintenance(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Pause between two items of the same lane.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Bounded wait for every external call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// In-flight classifier calls.
    #[serde(default = "default_classify_concurrency")]
    pub classify_concurrency: usize,
    /// Minimum spacing between two classifier dispatches.
    #[serde(default = "default_classify_delay_ms")]
    pub classify_delay_ms: u64,
}

fn default_item_delay_ms() -> u64 {
    300
}
fn default_call_timeout_secs() -> u64 {
    90
}
fn default_classify_concurrency() -> usize {
    4
}
fn default_classify_delay_ms() -> u64 {
    300
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: default_item_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            classify_concurrency: default_classify_concurrency(),
            classify_delay_ms: default_classify_delay_ms(),
        }
    }
}

impl LaneConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn classify_delay(&self) -> Duration {
        Duration::from_millis(self.classify_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_roster_path")]
    pub roster: PathBuf,
    #[serde(default = "default_source_tiers_path")]
    pub source_tiers: PathBuf,
    #[serde(default = "default_quota_state_path")]
    pub quota_state: PathBuf,
}

fn default_roster_path() -> PathBuf {
    PathBuf::from("config/roster.json")
}
fn default_source_tiers_path() -> PathBuf {
    PathBuf::from("config/source_tiers.json")
}
fn default_quota_state_path() -> PathBuf {
    PathBuf::from("state/quota.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            roster: default_roster_path(),
            source_tiers: default_source_tiers_path(),
            quota_state: default_quota_state_path(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: PipelineConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load an explicit file and apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg =
            Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        cfg.apply_env_overrides();
        info!(path = %path.display(), "pipeline config loaded");
        Ok(cfg)
    }

    /// Env path, then the default path, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(&default);
        }
        info!("no config file found, using defaults");
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_DEDUP_THRESHOLD) {
            match parse_threshold_env(Some(raw)) {
                Some(t) => self.dedup.threshold = t,
                None => warn!("{ENV_DEDUP_THRESHOLD} is not a number, ignored"),
            }
        }
        if let Ok(raw) = std::env::var(ENV_PREMIUM_LIMIT) {
            match parse_limit_env(Some(raw)) {
                Some(limit) => self.quota.premium_daily_limit = limit,
                None => warn!("{ENV_PREMIUM_LIMIT} is not a non-negative integer, ignored"),
            }
        }
    }

    pub fn mode_limits(&self, mode: SelectionMode) -> ModeLimits {
        match mode {
            SelectionMode::FirstRun => self.selection.first_run,
            SelectionMode::HourlyUpdate => self.selection.hourly_update,
            SelectionMode::Maintenance => self.selection.maintenance,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let q = &self.quota;
        if !(q.critical >= q.important && q.important >= q.standard) {
            return Err(PipelineError::Config(format!(
                "quota thresholds must be ordered critical >= important >= standard (got {}/{}/{})",
                q.critical, q.important, q.standard
            )));
        }
        for (name, gate) in [("important_gate", q.important_gate), ("standard_gate", q.standard_gate)] {
            if !(0.0..=1.0).contains(&gate) {
                return Err(PipelineError::Config(format!("quota.{name} must be within 0..=1")));
            }
        }
        if !(0.0..=1.0).contains(&self.dedup.threshold) {
            return Err(PipelineError::Config("dedup.threshold must be within 0..=1".into()));
        }
        if self.lanes.classify_concurrency == 0 {
            return Err(PipelineError::Config("lanes.classify_concurrency must be >= 1".into()));
        }
        if self.lanes.call_timeout_secs == 0 {
            return Err(PipelineError::Config("lanes.call_timeout_secs must be >= 1".into()));
        }
        Ok(())
    }
}

fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn parse_limit_env(raw: Option<String>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_documented_defaults() {
        let cfg = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.dedup.threshold, 0.55);
        assert_eq!(cfg.quota.premium_daily_limit, 15);
        assert_eq!(cfg.lanes.item_delay(), Duration::from_millis(300));
        assert_eq!(
            cfg.mode_limits(SelectionMode::FirstRun),
            ModeLimits {
                window_hours: 24,
                max_items: 200
            }
        );
        assert_eq!(cfg.mode_limits(SelectionMode::Maintenance).max_items, 50);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [quota]
            premium_daily_limit = 10
            important_gate = 0.75

            [selection.hourly_update]
            window_hours = 3
            max_items = 20

            [channels]
            deep_categories = ["politics"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.quota.premium_daily_limit, 10);
        assert_eq!(cfg.quota.important_gate, 0.75);
        assert_eq!(cfg.quota.critical, 16);
        assert_eq!(cfg.mode_limits(SelectionMode::HourlyUpdate).window_hours, 3);
        assert_eq!(cfg.mode_limits(SelectionMode::FirstRun).max_items, 200);
        assert_eq!(cfg.channels.deep_min_importance, 14);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(PipelineConfig::from_toml_str("[quota]\ncritical = 10\nimportant = 14").is_err());
        assert!(PipelineConfig::from_toml_str("[quota]\nstandard_gate = 1.5").is_err());
        assert!(PipelineConfig::from_toml_str("[lanes]\nclassify_concurrency = 0").is_err());
        assert!(PipelineConfig::from_toml_str("[dedup]\nthreshold = \"high\"").is_err());
    }

    #[test]
    fn env_parsers_clamp_and_ignore_garbage() {
        assert_eq!(parse_limit_env(Some(" 12 ".into())), Some(12));
        assert_eq!(parse_limit_env(Some("-1".into())), None);
        assert_eq!(parse_limit_env(None), None);
        assert_eq!(parse_threshold_env(Some("1.7".into())), Some(1.0));
        assert_eq!(parse_threshold_env(Some("0.7".into())), Some(0.7));
    }
}
