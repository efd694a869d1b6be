// src/ingest/providers/file.rs
//! Rows exported by external scrapers (CSV or JSON dumps on disk).

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use std::path::PathBuf;

use crate::ingest::types::MentionCollector;
use crate::store;
use crate::types::RawMention;

pub struct FileCollector {
    name: String,
    path: PathBuf,
    platform: Option<String>,
}

impl FileCollector {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            platform: None,
        }
    }

    /// Stamp rows that carry no platform column.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }
}

#[async_trait]
impl MentionCollector for FileCollector {
    async fn fetch(&self) -> Result<Vec<RawMention>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let mut rows = store::parse_records(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        if let Some(p) = &self.platform {
            for r in rows.iter_mut() {
                if r.get("platform").is_none() {
                    r.push("platform", Value::String(p.clone()));
                }
            }
        }
        counter!("ingest_events_total").increment(rows.len() as u64);
        Ok(rows)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
