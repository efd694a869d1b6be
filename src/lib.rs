// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod types;

// Cleaning core
pub mod dedup;
pub mod normalize;
pub mod reconcile;
pub mod relevance;
pub mod sentiment;

// Batch orchestration and persistence
pub mod config;
pub mod pipeline;
pub mod store;

// Collectors
pub mod ingest;

// Serving
pub mod aggregate;
pub mod api;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::PipelineConfig;
pub use crate::pipeline::{Pipeline, RunReport, SourceCollection};
pub use crate::sentiment::SentimentClassifier;
pub use crate::types::{CanonicalMention, Platform, RawMention, Sentiment};
