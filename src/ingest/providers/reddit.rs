// src/ingest/providers/reddit.rs
//! Reddit search: matching submissions (title + selftext) plus the first few
//! comments of each thread, via the public `search.json` listing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::ingest::types::MentionCollector;
use crate::types::RawMention;

pub const DEFAULT_SUBMISSION_LIMIT: usize = 50;
/// Comments taken from the top of each thread.
pub const COMMENTS_PER_THREAD: usize = 5;
/// Pause after each submission's thread fetch.
pub const DEFAULT_THREAD_DELAY: Duration = Duration::from_secs(1);

const SEARCH_URL: &str = "https://www.reddit.com/search.json";
const BASE_URL: &str = "https://reddit.com";
const USER_AGENT: &str = concat!("brand-sentiment-monitor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}
#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: ThingData,
}
#[derive(Debug, Default, Deserialize)]
struct ThingData {
    subreddit: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    body: Option<String>,
    author: Option<String>,
    created_utc: Option<f64>,
    permalink: Option<String>,
}

fn epoch_to_rfc3339(secs: Option<f64>) -> Value {
    secs.and_then(|s| DateTime::from_timestamp(s as i64, 0))
        .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or(Value::Null)
}

fn thread_url(permalink: Option<&str>) -> Value {
    permalink
        .filter(|p| !p.is_empty())
        .map(|p| Value::String(format!("{BASE_URL}{p}")))
        .unwrap_or(Value::Null)
}

fn submission_record(d: &ThingData) -> Option<RawMention> {
    let title = d.title.as_deref().unwrap_or_default().trim();
    let body = d.selftext.as_deref().unwrap_or_default().trim();
    let text = match (title.is_empty(), body.is_empty()) {
        (true, true) => return None,
        (false, true) => title.to_string(),
        (true, false) => body.to_string(),
        (false, false) => format!("{title}. {body}"),
    };
    let subreddit = d.subreddit.as_deref().unwrap_or("all");
    Some(
        RawMention::new()
            .with("platform", "Reddit")
            .with("source", format!("r/{subreddit}"))
            .with("text", text)
            .with("date", epoch_to_rfc3339(d.created_utc))
            .with("url", thread_url(d.permalink.as_deref())),
    )
}

fn comment_record(d: &ThingData) -> Option<RawMention> {
    let body = d.body.as_deref().map(str::trim).filter(|b| !b.is_empty())?;
    let author = match d.author.as_deref() {
        None | Some("[deleted]") | Some("") => "deleted",
        Some(a) => a,
    };
    Some(
        RawMention::new()
            .with("platform", "Reddit")
            .with("source", format!("u/{author}"))
            .with("text", body)
            .with("date", epoch_to_rfc3339(d.created_utc))
            .with("url", thread_url(d.permalink.as_deref())),
    )
}

/// Submissions (`t3`) of a search listing.
fn parse_search(s: &str) -> Result<Vec<ThingData>> {
    let listing: Listing = serde_json::from_str(s).context("parsing reddit search listing")?;
    Ok(listing
        .data
        .children
        .into_iter()
        .filter(|t| t.kind == "t3")
        .map(|t| t.data)
        .collect())
}

/// Comments (`t1`) of a thread document: `[submission listing, comment listing]`.
fn parse_thread_comments(s: &str) -> Result<Vec<ThingData>> {
    let listings: Vec<Listing> = serde_json::from_str(s).context("parsing reddit thread")?;
    Ok(listings
        .into_iter()
        .nth(1)
        .map(|l| l.data.children)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| t.kind == "t1")
        .map(|t| t.data)
        .collect())
}

pub struct RedditCollector {
    name: String,
    mode: Mode,
    limit: usize,
    thread_delay: Duration,
}

enum Mode {
    /// Search listing plus thread documents keyed by permalink.
    Fixture {
        search: String,
        threads: HashMap<String, String>,
    },
    Http { query: String, client: reqwest::Client },
}

impl RedditCollector {
    pub fn from_fixture_str(search: &str) -> Self {
        Self {
            name: "reddit".to_string(),
            mode: Mode::Fixture {
                search: search.to_string(),
                threads: HashMap::new(),
            },
            limit: DEFAULT_SUBMISSION_LIMIT,
            thread_delay: Duration::ZERO,
        }
    }

    /// Thread document served for `permalink` in fixture mode.
    pub fn with_thread_fixture(mut self, permalink: &str, thread: &str) -> Self {
        if let Mode::Fixture { threads, .. } = &mut self.mode {
            threads.insert(permalink.to_string(), thread.to_string());
        }
        self
    }

    /// Search all of Reddit for `query` (relevance order, past month).
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            name: "reddit".to_string(),
            mode: Mode::Http {
                query: query.into(),
                client: reqwest::Client::new(),
            },
            limit: DEFAULT_SUBMISSION_LIMIT,
            thread_delay: DEFAULT_THREAD_DELAY,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Max submissions; comments stop once the total reaches twice this.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_thread_delay(mut self, delay: Duration) -> Self {
        self.thread_delay = delay;
        self
    }

    async fn get_text(client: &reqwest::Client, url: &str, query: &[(&str, String)]) -> Result<String> {
        let resp = client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("reddit http get {url}"))?;
        resp.text().await.context("reddit http .text()")
    }

    async fn search_body(&self) -> Result<String> {
        match &self.mode {
            Mode::Fixture { search, .. } => Ok(search.clone()),
            Mode::Http { query, client } => {
                let params = [
                    ("q", query.clone()),
                    ("sort", "relevance".to_string()),
                    ("t", "month".to_string()),
                    ("limit", self.limit.min(100).to_string()),
                ];
                Self::get_text(client, SEARCH_URL, &params).await
            }
        }
    }

    async fn thread_body(&self, permalink: &str) -> Result<Option<String>> {
        match &self.mode {
            Mode::Fixture { threads, .. } => Ok(threads.get(permalink).cloned()),
            Mode::Http { client, .. } => {
                let url = format!("{BASE_URL}{}.json", permalink.trim_end_matches('/'));
                let params = [
                    ("limit", COMMENTS_PER_THREAD.to_string()),
                    ("sort", "top".to_string()),
                ];
                Self::get_text(client, &url, &params).await.map(Some)
            }
        }
    }

    async fn thread_comments(&self, permalink: &str) -> Vec<ThingData> {
        let parsed = match self.thread_body(permalink).await {
            Ok(Some(body)) => parse_thread_comments(&body),
            Ok(None) => return Vec::new(),
            Err(e) => Err(e),
        };
        parsed.unwrap_or_else(|e| {
            tracing::warn!(target: "ingest", error = ?e, provider = %self.name, permalink, "reddit thread skipped");
            counter!("ingest_provider_errors_total").increment(1);
            Vec::new()
        })
    }
}

#[async_trait]
impl MentionCollector for RedditCollector {
    async fn fetch(&self) -> Result<Vec<RawMention>> {
        let body = self.search_body().await.inspect_err(|e| {
            tracing::warn!(target: "ingest", error = ?e, provider = %self.name, "provider http error");
        })?;

        let t0 = std::time::Instant::now();
        let submissions = parse_search(&body)?;
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let cap = self.limit.saturating_mul(2);
        let mut out = Vec::new();
        for (i, sub) in submissions.iter().take(self.limit).enumerate() {
            if i > 0 && !self.thread_delay.is_zero() {
                tokio::time::sleep(self.thread_delay).await;
            }
            out.extend(submission_record(sub));

            let Some(permalink) = sub.permalink.as_deref() else {
                continue;
            };
            for c in self.thread_comments(permalink).await.iter().take(COMMENTS_PER_THREAD) {
                if out.len() >= cap {
                    break;
                }
                out.extend(comment_record(c));
            }
        }

        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"{"kind":"Listing","data":{"after":null,"children":[
      {"kind":"t3","data":{"subreddit":"Indians_StudyAbroad","title":"LeapScholar review?","selftext":"","created_utc":1736752500.0,"permalink":"/r/Indians_StudyAbroad/comments/abc/leapscholar_review/"}},
      {"kind":"t5","data":{"display_name":"ignored"}}
    ]}}"#;

    const THREAD: &str = r#"[
      {"kind":"Listing","data":{"children":[{"kind":"t3","data":{"title":"LeapScholar review?"}}]}},
      {"kind":"Listing","data":{"children":[
        {"kind":"t1","data":{"author":"[deleted]","body":"They were fine","created_utc":1736756100,"permalink":"/r/x/comments/abc/c1/","replies":""}},
        {"kind":"more","data":{"count":4,"children":["c9"]}}
      ]}}
    ]"#;

    #[test]
    fn title_only_submission_and_deleted_author() {
        let subs = parse_search(SEARCH).unwrap();
        assert_eq!(subs.len(), 1);
        let rec = submission_record(&subs[0]).unwrap();
        assert_eq!(rec.get("text"), Some(&Value::from("LeapScholar review?")));
        assert_eq!(rec.get("date"), Some(&Value::from("2025-01-13T07:15:00Z")));

        let comments = parse_thread_comments(THREAD).unwrap();
        assert_eq!(comments.len(), 1, "`more` stubs are not comments");
        let c = comment_record(&comments[0]).unwrap();
        assert_eq!(c.get("source"), Some(&Value::from("u/deleted")));
        assert_eq!(
            c.get("url"),
            Some(&Value::from("https://reddit.com/r/x/comments/abc/c1/"))
        );
    }

    #[tokio::test]
    async fn missing_thread_fixture_yields_submission_only() {
        let items = RedditCollector::from_fixture_str(SEARCH).fetch().await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_thread_is_skipped() {
        let c = RedditCollector::from_fixture_str(SEARCH)
            .with_thread_fixture("/r/Indians_StudyAbroad/comments/abc/leapscholar_review/", "{oops");
        assert_eq!(c.fetch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_search_is_an_error() {
        assert!(RedditCollector::from_fixture_str("[]").fetch().await.is_err());
    }
}
