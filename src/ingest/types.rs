// src/ingest/types.rs
use anyhow::Result;

use crate::types::RawMention;

/// A platform collector. Produces raw rows; cleaning is the pipeline's job.
#[async_trait::async_trait]
pub trait MentionCollector: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawMention>>;
    fn name(&self) -> &str;
}
