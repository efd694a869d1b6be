// src/config/pipeline.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::DedupRule;
use crate::types::Platform;

pub const ENV_PIPELINE_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_PIPELINE_CONFIG_TOML: &str = "config/pipeline.toml";
pub const DEFAULT_PIPELINE_CONFIG_JSON: &str = "config/pipeline.json";

pub const DEFAULT_BRAND_NAME: &str = "LeapScholar";
pub const DEFAULT_MIN_TEXT_LEN: usize = 10;
pub const DEFAULT_COURTESY_DELAY_MS: u64 = 1_000;

fn default_brand() -> String {
    DEFAULT_BRAND_NAME.to_string()
}
fn default_min_text_len() -> usize {
    DEFAULT_MIN_TEXT_LEN
}
fn default_courtesy_delay_ms() -> u64 {
    DEFAULT_COURTESY_DELAY_MS
}
fn default_true() -> bool {
    true
}

/// What to do with a record whose date is missing or unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Source has reliable timestamps: drop the record.
    #[default]
    Drop,
    /// Source has unreliable timestamps: use the processing time.
    FallbackNow,
}

/// Per-origin behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePolicy {
    /// Platform assumed when a record carries none.
    #[serde(default)]
    pub platform: Option<String>,
    /// Off for feeds fetched by an already brand-scoped query.
    #[serde(default = "default_true")]
    pub relevance_filter: bool,
    #[serde(default)]
    pub date_policy: DatePolicy,
}

impl Default for SourcePolicy {
    fn default() -> Self {
        Self {
            platform: None,
            relevance_filter: true,
            date_policy: DatePolicy::Drop,
        }
    }
}

impl SourcePolicy {
    pub fn default_platform(&self) -> Option<Platform> {
        self.platform.as_deref().and_then(Platform::parse)
    }

    pub fn for_platform(platform: &str) -> Self {
        Self {
            platform: Some(platform.to_string()),
            ..Self::default()
        }
    }

    pub fn without_relevance_filter(mut self) -> Self {
        self.relevance_filter = false;
        self
    }

    pub fn with_date_policy(mut self, policy: DatePolicy) -> Self {
        self.date_policy = policy;
        self
    }
}

/// One input collection on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub policy: SourcePolicy,
}

/// Where the pipeline writes its datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Combined canonical dataset; `.json` or anything else (CSV).
    #[serde(default = "default_combined_file")]
    pub combined_file: String,
    #[serde(default = "default_per_source_prefix")]
    pub per_source_prefix: String,
    #[serde(default = "default_per_source_ext")]
    pub per_source_ext: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dataset")
}
fn default_combined_file() -> String {
    "processed_mentions.csv".to_string()
}
fn default_per_source_prefix() -> String {
    "cleaned_".to_string()
}
fn default_per_source_ext() -> String {
    "csv".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            combined_file: default_combined_file(),
            per_source_prefix: default_per_source_prefix(),
            per_source_ext: default_per_source_ext(),
        }
    }
}

impl OutputConfig {
    pub fn combined_path(&self) -> PathBuf {
        self.dir.join(&self.combined_file)
    }

    pub fn source_path(&self, source_name: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}",
            self.per_source_prefix, source_name, self.per_source_ext
        ))
    }
}

/// Everything a pipeline run needs; passed by value, never read from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_brand")]
    pub brand_name: String,
    #[serde(default)]
    pub brand_aliases: Vec<String>,
    /// Texts must be strictly longer than this (in chars) after normalization.
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,
    #[serde(default = "DedupRule::default_chain")]
    pub dedup: Vec<DedupRule>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    /// Pause between collector requests.
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
    /// Keep `no`/`nor`/`not` through sentiment cleanup.
    #[serde(default)]
    pub sentiment_negation: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            brand_name: default_brand(),
            brand_aliases: Vec::new(),
            min_text_len: default_min_text_len(),
            dedup: DedupRule::default_chain(),
            output: OutputConfig::default(),
            sources: default_sources(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
            sentiment_negation: false,
        }
    }
}

/// Raw collector dumps as laid out under `dataset/`.
fn default_sources() -> Vec<SourceConfig> {
    let src = |name: &str, file: &str, policy: SourcePolicy| SourceConfig {
        name: name.to_string(),
        path: default_output_dir().join(file),
        policy,
    };
    vec![
        src("all_mentions", "all_mentions.csv", SourcePolicy::default()),
        src(
            "reddit_mentions",
            "reddit_mentions.csv",
            SourcePolicy::for_platform("Reddit"),
        ),
        // Google News is queried by brand already and its dates are fuzzy ("2 hours ago").
        src(
            "news_mentions",
            "news_mentions.csv",
            SourcePolicy::for_platform("News")
                .without_relevance_filter()
                .with_date_policy(DatePolicy::FallbackNow),
        ),
        src(
            "twitter_mentions",
            "twitter_mentions.csv",
            SourcePolicy::for_platform("Twitter"),
        ),
    ]
}

impl PipelineConfig {
    /// Basic sanity checks; returns the config back on success.
    pub fn validated(self) -> Result<Self> {
        if self.brand_name.trim().is_empty() {
            bail!("brand_name must not be empty");
        }
        let mut names = std::collections::BTreeSet::new();
        for s in &self.sources {
            if s.name.trim().is_empty() {
                bail!("source with empty name (path {})", s.path.display());
            }
            if !names.insert(s.name.as_str()) {
                bail!("duplicate source name `{}`", s.name);
            }
        }
        for rule in &self.dedup {
            if let DedupRule::NearText { threshold } = rule {
                if !(0.0..=1.0).contains(threshold) {
                    bail!("near_text threshold {threshold} outside 0..=1");
                }
            }
        }
        Ok(self)
    }

    /// Override the brand (e.g. from `BRAND_NAME` at the entry point).
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand_name = brand.into();
        self
    }
}

/// Load from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing pipeline config {}", path.display()))?
        .validated()
}

/// Load using env var + fallbacks:
/// 1) $PIPELINE_CONFIG_PATH
/// 2) config/pipeline.toml
/// 3) config/pipeline.json
/// 4) built-in defaults
pub fn load_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_PIPELINE_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!(
                "{ENV_PIPELINE_CONFIG_PATH} points to non-existent path {}",
                pb.display()
            ));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_TOML);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_PIPELINE_CONFIG_JSON);
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(PipelineConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    // JSON when hinted or when it plainly looks like an object
    let try_json_first = hint_ext == "json" || s.trim_start().starts_with('{');
    if try_json_first {
        if let Ok(v) = serde_json::from_str::<PipelineConfig>(s) {
            return Ok(v);
        }
    }
    match toml::from_str::<PipelineConfig>(s) {
        Ok(v) => Ok(v),
        Err(toml_err) => {
            if !try_json_first {
                if let Ok(v) = serde_json::from_str::<PipelineConfig>(s) {
                    return Ok(v);
                }
            }
            Err(anyhow!("unsupported pipeline config format: {toml_err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = parse_config("", "toml").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert!(!cfg.sentiment_negation);
        assert_eq!(cfg.sources.len(), 4);
        let news = cfg.sources.iter().find(|s| s.name == "news_mentions").unwrap();
        assert!(!news.policy.relevance_filter);
        assert_eq!(news.policy.date_policy, DatePolicy::FallbackNow);
    }

    #[test]
    fn toml_sources_with_flattened_policy() {
        let s = r#"
brand_name = "Acme"
min_text_len = 5
sentiment_negation = true
dedup = [ { rule = "exact_text" }, { rule = "content_hash" } ]

[output]
dir = "out"
combined_file = "all.json"

[[sources]]
name = "feed"
path = "in/feed.json"
platform = "News"
relevance_filter = false
date_policy = "fallback_now"
"#;
        let cfg = parse_config(s, "toml").unwrap().validated().unwrap();
        assert_eq!(cfg.brand_name, "Acme");
        assert!(cfg.sentiment_negation);
        assert_eq!(cfg.dedup, vec![DedupRule::ExactText, DedupRule::ContentHash]);
        assert_eq!(cfg.output.combined_path(), PathBuf::from("out/all.json"));
        assert_eq!(cfg.output.per_source_prefix, "cleaned_");
        assert_eq!(cfg.sources.len(), 1);
        let p = &cfg.sources[0].policy;
        assert_eq!(p.default_platform(), Some(Platform::News));
        assert!(!p.relevance_filter);
        assert_eq!(p.date_policy, DatePolicy::FallbackNow);
    }

    #[test]
    fn json_is_accepted_too() {
        let s = r#"{"brand_name":"Acme","sources":[{"name":"t","path":"t.csv"}]}"#;
        let cfg = parse_config(s, "").unwrap();
        assert_eq!(cfg.sources[0].policy, SourcePolicy::default());
    }

    #[test]
    fn validation_rejects_duplicates_and_blank_brand() {
        let mut cfg = PipelineConfig::default();
        cfg.sources.push(cfg.sources[0].clone());
        assert!(cfg.validated().is_err());
        assert!(PipelineConfig::default().with_brand(" ").validated().is_err());
    }

    #[test]
    fn source_output_path_uses_prefix() {
        let out = OutputConfig::default();
        assert_eq!(
            out.source_path("reddit_mentions"),
            PathBuf::from("dataset/cleaned_reddit_mentions.csv")
        );
    }
}
