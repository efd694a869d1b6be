// src/ingest/providers/news_rss.rs
//! News search feeds (RSS 2.0, e.g. Google News `rss/search?q=<brand>`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::ingest::types::MentionCollector;
use crate::types::RawMention;

pub const DEFAULT_ITEM_LIMIT: usize = 100;
const FALLBACK_SOURCE: &str = "Google News";

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<ItemSource>,
}
#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text")]
    name: Option<String>,
}

/// RFC 2822 `pubDate` → RFC 3339. Unparsable dates are passed through so the
/// reconciler can apply the source's date policy.
fn pub_date_to_rfc3339(ts: &str) -> String {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| ts.to_string())
}

/// Plain text from an HTML fragment: tags dropped, entities decoded.
fn html_to_text(s: &str) -> String {
    let no_tags = RE_TAGS.replace_all(s, " ");
    let decoded = html_escape::decode_html_entities(&no_tags);
    RE_WS.replace_all(decoded.trim(), " ").to_string()
}

/// Google News titles end in " - Publisher"; split it off.
fn split_publisher(title: &str) -> (&str, Option<&str>) {
    match title.rsplit_once(" - ") {
        Some((head, publisher)) if !head.is_empty() && !publisher.trim().is_empty() => {
            (head, Some(publisher.trim()))
        }
        _ => (title, None),
    }
}

pub struct NewsRssCollector {
    name: String,
    mode: Mode,
    limit: usize,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl NewsRssCollector {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            name: "news_rss".to_string(),
            mode: Mode::Fixture(s.to_string()),
            limit: DEFAULT_ITEM_LIMIT,
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            name: "news_rss".to_string(),
            mode: Mode::Http {
                url: url.into(),
                client: reqwest::Client::new(),
            },
            limit: DEFAULT_ITEM_LIMIT,
        }
    }

    /// Google News search feed for `query`.
    pub fn google_news(query: &str) -> Self {
        let q: String = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("+");
        Self::from_url(format!(
            "https://news.google.com/rss/search?q={q}&hl=en-IN&gl=IN&ceid=IN:en"
        ))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawMention>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(self.limit));
        for it in rss.channel.item.into_iter().take(self.limit) {
            let title_full = html_to_text(it.title.as_deref().unwrap_or_default());
            let (title, title_publisher) = split_publisher(&title_full);
            let desc = html_to_text(it.description.as_deref().unwrap_or_default());

            // Google News descriptions repeat the headline plus the publisher.
            let desc_redundant = desc.is_empty() || (!title.is_empty() && desc.starts_with(title));
            let text = match (title.is_empty(), desc_redundant) {
                (true, true) => continue,
                (false, true) => title.to_string(),
                (true, false) => desc,
                (false, false) => format!("{title}. {desc}"),
            };

            let source = it
                .source
                .and_then(|s| s.name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| title_publisher.map(str::to_string))
                .unwrap_or_else(|| FALLBACK_SOURCE.to_string());

            let date = it
                .pub_date
                .as_deref()
                .map(|d| Value::String(pub_date_to_rfc3339(d)))
                .unwrap_or(Value::Null);

            out.push(
                RawMention::new()
                    .with("platform", "News")
                    .with("source", source)
                    .with("text", text)
                    .with("date", date)
                    .with("url", it.link.map(Value::String).unwrap_or(Value::Null)),
            );
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl MentionCollector for NewsRssCollector {
    async fn fetch(&self) -> Result<Vec<RawMention>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status());
                let body = match resp {
                    Ok(r) => r.text().await.context("news http .text()")?,
                    Err(e) => {
                        tracing::warn!(target: "ingest", error = ?e, provider = %self.name, "provider http error");
                        return Err(e).context("news http get()");
                    }
                };
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
