// src/aggregate.rs
//! Read-side aggregations over the canonical dataset. Pure functions; the
//! caller supplies `now` so windows are reproducible.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{CanonicalMention, Platform, Sentiment};

pub const DEFAULT_DAYS: i64 = 30;
pub const DEFAULT_TOP_LIMIT: usize = 3;

/// Filters accepted by the mentions listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MentionFilter {
    pub days: Option<i64>,
    pub platform: Option<String>,
    pub sentiment: Option<Sentiment>,
}

/// Start of a `days`-long window ending at `now`. Windows reaching past the
/// representable range cover everything.
pub fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days.max(0))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Records dated at or after `now - days`.
pub fn in_window(
    records: &[CanonicalMention],
    now: DateTime<Utc>,
    days: i64,
) -> Vec<&CanonicalMention> {
    let start = window_start(now, days);
    records.iter().filter(|m| m.date >= start).collect()
}

pub fn filter_mentions<'a>(
    records: &'a [CanonicalMention],
    filter: &MentionFilter,
    now: DateTime<Utc>,
) -> Vec<&'a CanonicalMention> {
    let platform = filter.platform.as_deref().map(str::to_lowercase);
    in_window(records, now, filter.days.unwrap_or(DEFAULT_DAYS))
        .into_iter()
        .filter(|m| {
            platform
                .as_deref()
                .map_or(true, |p| m.platform.as_str().to_lowercase() == p)
        })
        .filter(|m| filter.sentiment.map_or(true, |s| m.sentiment() == Some(s)))
        .collect()
}

/* ----------------------------
Summary
---------------------------- */

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    /// Mean compound over scored records, rounded to 4 decimals.
    pub average_compound: f64,
}

pub fn summarize<'a, I>(records: I) -> Summary
where
    I: IntoIterator<Item = &'a CanonicalMention>,
{
    let mut s = Summary::default();
    let mut sum = 0.0;
    let mut scored = 0usize;
    for m in records {
        s.total += 1;
        match m.sentiment() {
            Some(Sentiment::Positive) => s.positive += 1,
            Some(Sentiment::Neutral) => s.neutral += 1,
            Some(Sentiment::Negative) => s.negative += 1,
            None => continue,
        }
        sum += m.compound();
        scored += 1;
    }
    if scored > 0 {
        s.average_compound = ((sum / scored as f64) * 10_000.0).round() / 10_000.0;
    }
    s
}

/* ----------------------------
Top mentions
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopMention {
    pub platform: String,
    pub source: String,
    pub text: String,
    pub compound: f64,
    pub date: DateTime<Utc>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TopMentions {
    pub top_positive: Vec<TopMention>,
    pub top_negative: Vec<TopMention>,
}

fn status_url(id: &str) -> String {
    format!("https://twitter.com/i/web/status/{id}")
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Turn stored URL fragments into clickable links: bare tweet ids, partial
/// status paths, `@handles`, site-relative paths, scheme-less hosts.
pub fn resolve_url(url: Option<&str>, platform: &Platform) -> Option<String> {
    let url = url.map(str::trim).filter(|u| !u.is_empty())?;

    if *platform == Platform::Twitter || url.to_lowercase().contains("twitter") {
        if is_digits(url) {
            return Some(status_url(url));
        }
        if let Some((_, tail)) = url.rsplit_once("/status/") {
            let id = tail.split(['/', '?']).next().unwrap_or_default();
            if is_digits(id) {
                return Some(status_url(id));
            }
        }
        if let Some(handle) = url.strip_prefix('@') {
            return Some(format!("https://twitter.com/{handle}"));
        }
        if url.starts_with('/') {
            return Some(format!("https://twitter.com{url}"));
        }
    }

    let head = url.split('/').next().unwrap_or_default();
    if !url.starts_with('/') && !head.contains(':') {
        return Some(format!("https://{url}"));
    }
    Some(url.to_string())
}

fn to_top(m: &CanonicalMention) -> TopMention {
    TopMention {
        platform: m.platform.to_string(),
        source: m.source.clone(),
        text: m.text.clone(),
        compound: m.compound(),
        date: m.date,
        url: resolve_url(m.url.as_deref(), &m.platform),
    }
}

/// Strongest `limit` positive and negative records.
pub fn top_mentions(records: &[&CanonicalMention], limit: usize) -> TopMentions {
    let mut pos: Vec<&CanonicalMention> = records
        .iter()
        .copied()
        .filter(|m| m.sentiment() == Some(Sentiment::Positive))
        .collect();
    pos.sort_by(|a, b| b.compound().total_cmp(&a.compound()));

    let mut neg: Vec<&CanonicalMention> = records
        .iter()
        .copied()
        .filter(|m| m.sentiment() == Some(Sentiment::Negative))
        .collect();
    neg.sort_by(|a, b| a.compound().total_cmp(&b.compound()));

    TopMentions {
        top_positive: pos.into_iter().take(limit).map(to_top).collect(),
        top_negative: neg.into_iter().take(limit).map(to_top).collect(),
    }
}

/* ----------------------------
Timeline
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Date,
    /// Weeks start on Monday.
    Week,
}

impl GroupBy {
    /// Unknown values group by date.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("week") {
            GroupBy::Week
        } else {
            GroupBy::Date
        }
    }

    fn period(&self, date: DateTime<Utc>) -> NaiveDate {
        let d = date.date_naive();
        match self {
            GroupBy::Date => d,
            GroupBy::Week => d - Duration::days(d.weekday().num_days_from_monday() as i64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimelinePoint {
    pub period: String,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

/// Per-period sentiment counts, oldest period first. Unscored records are
/// not counted.
pub fn timeline(records: &[&CanonicalMention], group_by: GroupBy) -> Vec<TimelinePoint> {
    let mut buckets: BTreeMap<NaiveDate, TimelinePoint> = BTreeMap::new();
    for m in records {
        let Some(sentiment) = m.sentiment() else {
            continue;
        };
        let period = group_by.period(m.date);
        let point = buckets.entry(period).or_insert_with(|| TimelinePoint {
            period: period.format("%Y-%m-%d").to_string(),
            ..TimelinePoint::default()
        });
        match sentiment {
            Sentiment::Positive => point.positive += 1,
            Sentiment::Neutral => point.neutral += 1,
            Sentiment::Negative => point.negative += 1,
        }
    }
    buckets.into_values().collect()
}

/* ----------------------------
Platforms
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformStats {
    pub platform: String,
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Per-platform totals, busiest platform first (ties by name).
pub fn platform_stats(records: &[&CanonicalMention]) -> Vec<PlatformStats> {
    let mut by_platform: BTreeMap<String, PlatformStats> = BTreeMap::new();
    for m in records {
        let name = m.platform.to_string();
        let st = by_platform
            .entry(name.clone())
            .or_insert_with(|| PlatformStats {
                platform: name,
                total: 0,
                positive: 0,
                negative: 0,
                neutral: 0,
            });
        st.total += 1;
        match m.sentiment() {
            Some(Sentiment::Positive) => st.positive += 1,
            Some(Sentiment::Negative) => st.negative += 1,
            Some(Sentiment::Neutral) => st.neutral += 1,
            None => {}
        }
    }
    let mut out: Vec<PlatformStats> = by_platform.into_values().collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.platform.cmp(&b.platform)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn mention(p: Platform, text: &str, date: DateTime<Utc>, compound: Option<f64>) -> CanonicalMention {
        let mut m = CanonicalMention::new(p, "src", text, date, None);
        if let Some(c) = compound {
            m.set_compound(c, Some(date));
        }
        m
    }

    fn dataset() -> Vec<CanonicalMention> {
        vec![
            mention(Platform::Twitter, "a", at(2024, 6, 10), Some(0.9)),
            mention(Platform::Twitter, "b", at(2024, 6, 9), Some(-0.5)),
            mention(Platform::Reddit, "c", at(2024, 6, 4), Some(0.1)),
            mention(Platform::News, "d", at(2024, 6, 3), Some(0.3)),
            mention(Platform::News, "old", at(2024, 3, 1), Some(-0.9)),
        ]
    }

    #[test]
    fn window_and_filters() {
        let data = dataset();
        let now = at(2024, 6, 11);
        assert_eq!(in_window(&data, now, 30).len(), 4);
        let f = MentionFilter {
            days: Some(30),
            platform: Some("twitter".into()),
            sentiment: Some(Sentiment::Negative),
        };
        let out = filter_mentions(&data, &f, now);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "b");
    }

    #[test]
    fn huge_window_covers_everything() {
        let data = dataset();
        let now = at(2024, 6, 11);
        assert_eq!(in_window(&data, now, 1_000_000_000).len(), 5);
        assert_eq!(in_window(&data, now, i64::MAX).len(), 5);
        assert_eq!(window_start(now, -5), now);
    }

    #[test]
    fn summary_counts_and_average() {
        let data = dataset();
        let s = summarize(in_window(&data, at(2024, 6, 11), 30));
        assert_eq!(s.total, 4);
        assert_eq!((s.positive, s.neutral, s.negative), (2, 1, 1));
        assert!((s.average_compound - 0.2).abs() < 1e-9);
        assert_eq!(summarize(Vec::<&CanonicalMention>::new()), Summary::default());
    }

    #[test]
    fn top_orders_by_compound() {
        let data = dataset();
        let refs: Vec<&CanonicalMention> = data.iter().collect();
        let top = top_mentions(&refs, 1);
        assert_eq!(top.top_positive.len(), 1);
        assert_eq!(top.top_positive[0].text, "a");
        assert_eq!(top.top_negative[0].text, "old");
        assert_eq!(top_mentions(&refs, 10).top_positive.len(), 2);
    }

    #[test]
    fn url_resolution() {
        let tw = Platform::Twitter;
        assert_eq!(
            resolve_url(Some("1790000000000000000"), &tw).as_deref(),
            Some("https://twitter.com/i/web/status/1790000000000000000")
        );
        assert_eq!(
            resolve_url(Some("x.com/user/status/42?s=20"), &tw).as_deref(),
            Some("https://twitter.com/i/web/status/42")
        );
        assert_eq!(
            resolve_url(Some("@leapscholar"), &tw).as_deref(),
            Some("https://twitter.com/leapscholar")
        );
        assert_eq!(
            resolve_url(Some("/leapscholar"), &tw).as_deref(),
            Some("https://twitter.com/leapscholar")
        );
        let news = Platform::News;
        assert_eq!(
            resolve_url(Some("example.com/a"), &news).as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(
            resolve_url(Some("https://example.com/a"), &news).as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(resolve_url(Some("  "), &news), None);
        assert_eq!(resolve_url(None, &news), None);
    }

    #[test]
    fn timeline_by_date_and_week() {
        let data = dataset();
        let refs = in_window(&data, at(2024, 6, 11), 30);
        let daily = timeline(&refs, GroupBy::Date);
        assert_eq!(daily.len(), 4);
        assert_eq!(daily[0].period, "2024-06-03");

        // 2024-06-03 is a Monday; 06-09 is the Sunday of the same week.
        let weekly = timeline(&refs, GroupBy::parse("WEEK"));
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].period, "2024-06-03");
        assert_eq!(
            (weekly[0].positive, weekly[0].neutral, weekly[0].negative),
            (1, 1, 1)
        );
        assert_eq!(weekly[1].period, "2024-06-10");
        assert_eq!(GroupBy::parse("month"), GroupBy::Date);
    }

    #[test]
    fn platforms_sorted_by_total() {
        let data = dataset();
        let refs: Vec<&CanonicalMention> = data.iter().collect();
        let stats = platform_stats(&refs);
        assert_eq!(stats[0].total, 2);
        assert_eq!(stats[0].platform, "News");
        assert_eq!(stats[1].platform, "Twitter");
        assert_eq!(stats[2].platform, "Reddit");
        assert_eq!(stats[0].negative, 1);
    }
}
