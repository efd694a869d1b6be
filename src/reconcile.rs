// src/reconcile.rs
//! Schema reconciliation: heterogeneous per-platform rows → canonical shape.
//!
//! - Column names are canonicalized (case, pandas `.1` suffixes, known aliases).
//! - Repeated columns collapse to the last populated value.
//! - Dates are parsed permissively; failures become `DateField::Invalid`.
//! - The per-source `DatePolicy` decides between dropping and "now".

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::config::{DatePolicy, SourcePolicy};
use crate::dedup::{DedupView, Dedupable};
use crate::types::{CanonicalMention, Platform, RawMention, Sentiment, SkipReason, SkipTally};

/// Column aliases seen in collector dumps and older exports.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("content", "text"),
    ("body", "text"),
    ("message", "text"),
    ("created_at", "date"),
    ("created", "date"),
    ("timestamp", "date"),
    ("published", "date"),
    ("published_at", "date"),
    ("pubdate", "date"),
    ("datetime", "date"),
    ("link", "url"),
    ("permalink", "url"),
    ("media", "source"),
    ("outlet", "source"),
    ("author", "source"),
    ("subreddit", "source"),
    ("user", "source"),
    ("username", "source"),
];

static RE_PANDAS_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<base>.+)\.(?P<n>\d+)$").expect("pandas suffix regex"));

/// Outcome of date parsing before the source policy is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DateField {
    Valid(DateTime<Utc>),
    Invalid(String),
    Missing,
}

/// A reconciled record whose date has not been resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MentionCandidate {
    pub platform: Platform,
    pub source: String,
    pub text: String,
    pub date: DateField,
    pub url: Option<String>,
}

impl Dedupable for MentionCandidate {
    fn dedup_view(&self) -> DedupView<'_> {
        DedupView {
            text: &self.text,
            platform: self.platform.as_str(),
            source: &self.source,
        }
    }
}

/* ----------------------------
Columns
---------------------------- */

/// Canonical name for a raw column header.
pub fn canonical_column(name: &str) -> String {
    let mut n = name.trim().to_ascii_lowercase();
    if let Some(caps) = RE_PANDAS_SUFFIX.captures(&n) {
        n = caps["base"].to_string();
    }
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == n)
        .map(|(_, canon)| canon.to_string())
        .unwrap_or(n)
}

fn is_populated(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Collapse repeated columns: the last populated value wins, otherwise `Null`.
pub fn collapse_columns(raw: &RawMention) -> HashMap<String, Value> {
    let mut out: HashMap<String, Value> = HashMap::new();
    for (col, val) in raw.fields() {
        let key = canonical_column(col);
        if is_populated(val) {
            out.insert(key, val.clone());
        } else {
            out.entry(key).or_insert(Value::Null);
        }
    }
    out
}

fn string_field(cols: &HashMap<String, Value>, key: &str) -> Option<String> {
    match cols.get(key)? {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/* ----------------------------
Dates
---------------------------- */

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_CUTOFF: f64 = 1e11;

/// Digit strings shorter than this are never read as epoch timestamps.
const EPOCH_MIN_DIGITS: usize = 9;

/// `YYYY` or `YYYY-MM`, anchored at the first day of the period.
fn parse_partial_date(s: &str) -> Option<NaiveDate> {
    let (year, month) = match s.split_once('-') {
        Some((y, m)) if m.len() == 2 => (y, m.parse::<u32>().ok()?),
        Some(_) => return None,
        None => (s, 1),
    };
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)
}

fn looks_like_epoch(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let int_part = unsigned.split('.').next().unwrap_or_default();
    int_part.len() >= EPOCH_MIN_DIGITS
        && int_part.chars().all(|c| c.is_ascii_digit())
        && unsigned.chars().filter(|c| *c == '.').count() <= 1
}

fn from_epoch(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = if secs.abs() > EPOCH_MILLIS_CUTOFF {
        secs
    } else {
        secs * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Parse a date string in any of the formats the collectors produce.
pub fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for f in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for f in NAIVE_DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(ndt.and_utc());
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
        }
    }
    if let Some(d) = parse_partial_date(s) {
        return d.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
    }
    if looks_like_epoch(s) {
        return s.parse::<f64>().ok().and_then(from_epoch);
    }
    None
}

/// Loosely-typed date parsing.
pub fn parse_date_value(value: Option<&Value>) -> DateField {
    match value {
        None | Some(Value::Null) => DateField::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => DateField::Missing,
        Some(Value::String(s)) => match parse_date_str(s) {
            Some(dt) => DateField::Valid(dt),
            None => DateField::Invalid(s.clone()),
        },
        Some(Value::Number(n)) => match n.as_f64().and_then(from_epoch) {
            Some(dt) => DateField::Valid(dt),
            None => DateField::Invalid(n.to_string()),
        },
        Some(other) => DateField::Invalid(other.to_string()),
    }
}

/* ----------------------------
Records
---------------------------- */

/// Map one raw row into a candidate. The raw text is kept as-is (non-strings
/// become `""`); normalization happens in the next pipeline stage.
pub fn reconcile_record(
    raw: &RawMention,
    policy: &SourcePolicy,
) -> Result<MentionCandidate, SkipReason> {
    let cols = collapse_columns(raw);

    let platform = string_field(&cols, "platform")
        .and_then(|p| Platform::parse(&p))
        .or_else(|| policy.default_platform())
        .ok_or(SkipReason::MissingPlatform)?;

    let text = match cols.get("text") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };

    Ok(MentionCandidate {
        platform,
        source: string_field(&cols, "source").unwrap_or_default(),
        text,
        date: parse_date_value(cols.get("date")),
        url: string_field(&cols, "url"),
    })
}

/// Reconcile a whole collection, counting skipped rows.
pub fn reconcile(
    raw_records: &[RawMention],
    policy: &SourcePolicy,
) -> (Vec<MentionCandidate>, SkipTally) {
    let mut tally = SkipTally::default();
    let mut out = Vec::with_capacity(raw_records.len());
    for raw in raw_records {
        match reconcile_record(raw, policy) {
            Ok(c) => out.push(c),
            Err(reason) => tally.record(reason),
        }
    }
    (out, tally)
}

/// Apply the source's date policy and produce an unscored canonical record.
pub fn resolve_date(
    candidate: MentionCandidate,
    date_policy: DatePolicy,
    now: DateTime<Utc>,
) -> Result<CanonicalMention, SkipReason> {
    let date = match candidate.date {
        DateField::Valid(dt) => dt,
        DateField::Invalid(_) | DateField::Missing => match date_policy {
            DatePolicy::Drop => return Err(SkipReason::InvalidDate),
            DatePolicy::FallbackNow => now,
        },
    };
    Ok(CanonicalMention::new(
        candidate.platform,
        candidate.source,
        candidate.text,
        date,
        candidate.url,
    ))
}

/// Read back a persisted canonical row.
///
/// Rows carrying a sentiment label must also carry a numeric compound;
/// the label itself is re-derived from the compound. Rows without a label
/// load unscored.
pub fn canonical_from_raw(raw: &RawMention) -> Result<CanonicalMention, SkipReason> {
    let cols = collapse_columns(raw);

    let platform = string_field(&cols, "platform")
        .and_then(|p| Platform::parse(&p))
        .ok_or(SkipReason::MissingPlatform)?;
    let text = string_field(&cols, "text").ok_or(SkipReason::EmptyText)?;
    let date = match parse_date_value(cols.get("date")) {
        DateField::Valid(dt) => dt,
        _ => return Err(SkipReason::InvalidDate),
    };

    let mut m = CanonicalMention::new(
        platform,
        string_field(&cols, "source").unwrap_or_default(),
        text,
        date,
        string_field(&cols, "url"),
    );

    let label = string_field(&cols, "sentiment");
    if let Some(label) = label {
        label
            .parse::<Sentiment>()
            .map_err(|_| SkipReason::InvalidScore)?;
        let compound = match cols.get("compound") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|c| c.is_finite())
        .ok_or(SkipReason::InvalidScore)?;
        let analyzed_at = match parse_date_value(cols.get("analyzed_at")) {
            DateField::Valid(dt) => Some(dt),
            _ => None,
        };
        m.set_compound(compound, analyzed_at);
    }
    Ok(m)
}
