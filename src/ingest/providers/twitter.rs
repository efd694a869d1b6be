// src/ingest/providers/twitter.rs
//! Twitter API v2 recent search (`/2/tweets/search/recent`), bearer-token auth.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::ingest::types::MentionCollector;
use crate::types::RawMention;

pub const DEFAULT_TWEET_LIMIT: usize = 50;
pub const BEARER_TOKEN_ENV: &str = "TWITTER_BEARER_TOKEN";

const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
/// Bounds the endpoint accepts for `max_results`.
const MAX_RESULTS_RANGE: (usize, usize) = (10, 100);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}
#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: Option<String>,
    author_id: Option<String>,
    created_at: Option<String>,
}
#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}
#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
}

fn status_url(username: Option<&str>, id: &str) -> String {
    match username {
        Some(u) => format!("https://twitter.com/{u}/status/{id}"),
        None => format!("https://twitter.com/i/web/status/{id}"),
    }
}

fn parse_response(s: &str, limit: usize) -> Result<Vec<RawMention>> {
    let resp: SearchResponse = serde_json::from_str(s).context("parsing twitter search response")?;
    let handles: HashMap<&str, &str> = resp
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u.username.as_str()))
        .collect();

    Ok(resp
        .data
        .iter()
        .take(limit)
        .map(|t| {
            let username = t.author_id.as_deref().and_then(|a| handles.get(a).copied());
            let source = match (username, t.author_id.as_deref()) {
                (Some(u), _) => format!("@{u}"),
                (None, Some(a)) => format!("@user_{a}"),
                (None, None) => "@unknown".to_string(),
            };
            RawMention::new()
                .with("platform", "Twitter")
                .with("source", source)
                .with("text", t.text.clone().unwrap_or_default())
                .with("date", t.created_at.clone().map(Value::String).unwrap_or(Value::Null))
                .with("url", status_url(username, &t.id))
        })
        .collect())
}

pub struct TwitterCollector {
    name: String,
    mode: Mode,
    limit: usize,
}

enum Mode {
    Fixture(String),
    Http {
        query: String,
        bearer_token: String,
        client: reqwest::Client,
    },
}

impl TwitterCollector {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            name: "twitter".to_string(),
            mode: Mode::Fixture(s.to_string()),
            limit: DEFAULT_TWEET_LIMIT,
        }
    }

    pub fn recent_search(query: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            name: "twitter".to_string(),
            mode: Mode::Http {
                query: query.into(),
                bearer_token: bearer_token.into(),
                client: reqwest::Client::new(),
            },
            limit: DEFAULT_TWEET_LIMIT,
        }
    }

    /// `recent_search` with the token from `$TWITTER_BEARER_TOKEN`.
    pub fn from_env(query: impl Into<String>) -> Result<Self> {
        match std::env::var(BEARER_TOKEN_ENV) {
            Ok(t) if !t.trim().is_empty() => Ok(Self::recent_search(query, t.trim())),
            _ => bail!("{BEARER_TOKEN_ENV} is not set"),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn max_results(&self) -> usize {
        self.limit.clamp(MAX_RESULTS_RANGE.0, MAX_RESULTS_RANGE.1)
    }

    fn parse_timed(&self, s: &str) -> Result<Vec<RawMention>> {
        let t0 = std::time::Instant::now();
        let out = parse_response(s, self.limit)?;
        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl MentionCollector for TwitterCollector {
    async fn fetch(&self) -> Result<Vec<RawMention>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_timed(s),
            Mode::Http {
                query,
                bearer_token,
                client,
            } => {
                let params = [
                    ("query", query.clone()),
                    ("max_results", self.max_results().to_string()),
                    ("tweet.fields", "created_at,author_id,text".to_string()),
                    ("user.fields", "username,name".to_string()),
                    ("expansions", "author_id".to_string()),
                ];
                let resp = client
                    .get(SEARCH_URL)
                    .bearer_auth(bearer_token)
                    .query(&params)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status());
                let body = match resp {
                    Ok(r) => r.text().await.context("twitter http .text()")?,
                    Err(e) => {
                        tracing::warn!(target: "ingest", error = ?e, provider = %self.name, "provider http error");
                        return Err(e).context("twitter http get()");
                    }
                };
                self.parse_timed(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_authors_fall_back_to_id() {
        let s = r#"{"data":[{"id":"42","text":"LeapScholar hi","author_id":"7"},{"id":"43","text":"x"}]}"#;
        let out = parse_response(s, 10).unwrap();
        assert_eq!(out[0].get("source"), Some(&Value::from("@user_7")));
        assert_eq!(
            out[0].get("url"),
            Some(&Value::from("https://twitter.com/i/web/status/42"))
        );
        assert_eq!(out[0].get("date"), Some(&Value::Null));
        assert_eq!(out[1].get("source"), Some(&Value::from("@unknown")));
    }

    #[test]
    fn empty_result_has_no_data_key() {
        let s = r#"{"meta":{"result_count":0}}"#;
        assert!(parse_response(s, 10).unwrap().is_empty());
    }

    #[test]
    fn max_results_stays_in_api_bounds() {
        let c = TwitterCollector::from_fixture_str("{}");
        assert_eq!(c.with_limit(3).max_results(), 10);
        let c = TwitterCollector::from_fixture_str("{}");
        assert_eq!(c.with_limit(500).max_results(), 100);
    }

    #[tokio::test]
    async fn error_body_is_an_error() {
        let c = TwitterCollector::from_fixture_str("not json");
        assert!(c.fetch().await.is_err());
    }
}
