// src/types.rs
//! Record types shared by the pipeline, the store and the API.
//!
//! `RawMention` is whatever a collector produced (ordered columns, loosely typed).
//! `CanonicalMention` is the cleaned, dated, scored unit the dataset is made of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Compound score at or above this is `positive`.
pub const POSITIVE_THRESHOLD: f64 = 0.2;
/// Compound score at or below this is `negative`.
pub const NEGATIVE_THRESHOLD: f64 = -0.2;

/// Canonical column order of the persisted dataset.
pub const CANONICAL_COLUMNS: [&str; 8] = [
    "platform",
    "source",
    "text",
    "date",
    "url",
    "sentiment",
    "compound",
    "analyzed_at",
];

/* ----------------------------
Raw records
---------------------------- */

/// A loosely-typed record as produced by a collector or read from a file.
///
/// Columns keep their input order and may repeat (merged CSV exports do that).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMention {
    fields: Vec<(String, Value)>,
}

impl RawMention {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Build from a JSON object; non-object values yield an empty record.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                fields: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }

    /// Builder-style push.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((column.into(), value.into()));
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.fields.push((column.into(), value));
    }

    /// First value stored under exactly `column` (no canonicalization).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/* ----------------------------
Platform
---------------------------- */

/// Origin platform of a mention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Platform {
    Twitter,
    Reddit,
    News,
    Other(String),
}

impl Platform {
    pub fn as_str(&self) -> &str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::Reddit => "Reddit",
            Platform::News => "News",
            Platform::Other(s) => s.as_str(),
        }
    }

    /// Parse a platform label; blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        let p = match t.to_ascii_lowercase().as_str() {
            "twitter" | "x" | "tweet" | "tweets" => Platform::Twitter,
            "reddit" => Platform::Reddit,
            "news" | "google news" | "googlenews" => Platform::News,
            _ => Platform::Other(t.to_string()),
        };
        Some(p)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Platform {
    fn from(s: String) -> Self {
        Platform::parse(&s).unwrap_or(Platform::Other(s))
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.as_str().to_string()
    }
}

/* ----------------------------
Sentiment
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    /// The only mapping from compound score to label.
    pub fn from_compound(compound: f64) -> Self {
        if compound >= POSITIVE_THRESHOLD {
            Sentiment::Positive
        } else if compound <= NEGATIVE_THRESHOLD {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => anyhow::bail!("unknown sentiment label `{other}`"),
        }
    }
}

/// Lexicon scorer output, proportions sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Subscores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

impl Subscores {
    pub const NEUTRAL: Subscores = Subscores {
        neg: 0.0,
        neu: 1.0,
        pos: 0.0,
        compound: 0.0,
    };
}

/// Result of classifying one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentScore {
    pub label: Sentiment,
    pub compound: f64,
    pub subscores: Subscores,
}

impl SentimentScore {
    pub fn neutral() -> Self {
        Self {
            label: Sentiment::Neutral,
            compound: 0.0,
            subscores: Subscores::NEUTRAL,
        }
    }

    pub fn from_subscores(subscores: Subscores) -> Self {
        Self {
            label: Sentiment::from_compound(subscores.compound),
            compound: subscores.compound,
            subscores,
        }
    }
}

/* ----------------------------
Canonical records
---------------------------- */

/// One cleaned mention of the canonical dataset.
///
/// `sentiment` and `compound` are private: the label is always derived from
/// the compound score, never assigned on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMention {
    pub platform: Platform,
    pub source: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub url: Option<String>,
    sentiment: Option<Sentiment>,
    compound: f64,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl CanonicalMention {
    pub fn new(
        platform: Platform,
        source: impl Into<String>,
        text: impl Into<String>,
        date: DateTime<Utc>,
        url: Option<String>,
    ) -> Self {
        Self {
            platform,
            source: source.into(),
            text: text.into(),
            date,
            url,
            sentiment: None,
            compound: 0.0,
            analyzed_at: None,
        }
    }

    /// Attach a classifier result.
    pub fn apply_score(&mut self, score: &SentimentScore, analyzed_at: DateTime<Utc>) {
        self.set_compound(score.compound, Some(analyzed_at));
    }

    /// Restore a previously persisted score; the label is re-derived.
    pub(crate) fn set_compound(&mut self, compound: f64, analyzed_at: Option<DateTime<Utc>>) {
        let c = if compound.is_finite() {
            compound.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self.compound = c;
        self.sentiment = Some(Sentiment::from_compound(c));
        self.analyzed_at = analyzed_at;
    }

    pub fn sentiment(&self) -> Option<Sentiment> {
        self.sentiment
    }

    pub fn compound(&self) -> f64 {
        self.compound
    }

    pub fn is_scored(&self) -> bool {
        self.sentiment.is_some()
    }
}

/* ----------------------------
Record-level outcomes
---------------------------- */

/// Why a record left the pipeline. Counted, never logged one by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    EmptyText,
    MissingPlatform,
    Irrelevant,
    Duplicate,
    InvalidDate,
    TooShort,
    InvalidScore,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyText => "empty_text",
            SkipReason::MissingPlatform => "missing_platform",
            SkipReason::Irrelevant => "irrelevant",
            SkipReason::Duplicate => "duplicate",
            SkipReason::InvalidDate => "invalid_date",
            SkipReason::TooShort => "too_short",
            SkipReason::InvalidScore => "invalid_score",
        }
    }
}

/// Per-reason skip counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipTally {
    pub empty_text: usize,
    pub missing_platform: usize,
    pub irrelevant: usize,
    pub duplicate: usize,
    pub invalid_date: usize,
    pub too_short: usize,
    pub invalid_score: usize,
}

impl SkipTally {
    pub fn record(&mut self, reason: SkipReason) {
        self.add(reason, 1);
    }

    pub fn add(&mut self, reason: SkipReason, n: usize) {
        let slot = match reason {
            SkipReason::EmptyText => &mut self.empty_text,
            SkipReason::MissingPlatform => &mut self.missing_platform,
            SkipReason::Irrelevant => &mut self.irrelevant,
            SkipReason::Duplicate => &mut self.duplicate,
            SkipReason::InvalidDate => &mut self.invalid_date,
            SkipReason::TooShort => &mut self.too_short,
            SkipReason::InvalidScore => &mut self.invalid_score,
        };
        *slot += n;
    }

    pub fn get(&self, reason: SkipReason) -> usize {
        match reason {
            SkipReason::EmptyText => self.empty_text,
            SkipReason::MissingPlatform => self.missing_platform,
            SkipReason::Irrelevant => self.irrelevant,
            SkipReason::Duplicate => self.duplicate,
            SkipReason::InvalidDate => self.invalid_date,
            SkipReason::TooShort => self.too_short,
            SkipReason::InvalidScore => self.invalid_score,
        }
    }

    pub fn total(&self) -> usize {
        self.empty_text
            + self.missing_platform
            + self.irrelevant
            + self.duplicate
            + self.invalid_date
            + self.too_short
            + self.invalid_score
    }

    pub fn merge(&mut self, other: &SkipTally) {
        self.empty_text += other.empty_text;
        self.missing_platform += other.missing_platform;
        self.irrelevant += other.irrelevant;
        self.duplicate += other.duplicate;
        self.invalid_date += other.invalid_date;
        self.too_short += other.too_short;
        self.invalid_score += other.invalid_score;
    }
}
