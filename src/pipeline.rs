// src/pipeline.rs
//! Batch orchestration: per-source cleaning, scoring, merge, persistence.
//!
//! Per source: load → reconcile → normalize → relevance (optional) → local
//! dedupe → date policy → length gate → classify → per-source sink.
//! Then: concatenate, global dedupe, sort by date descending, combined sink.

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::aggregate::{summarize, Summary};
use crate::config::{OutputConfig, PipelineConfig, SourceConfig, SourcePolicy};
use crate::dedup::Deduplicator;
use crate::normalize::normalize;
use crate::reconcile::{reconcile, resolve_date, MentionCandidate};
use crate::relevance::BrandMatcher;
use crate::sentiment::SentimentClassifier;
use crate::store;
use crate::types::{CanonicalMention, RawMention, SkipReason, SkipTally};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_records_loaded_total",
            "Raw records read from sources."
        );
        describe_counter!(
            "pipeline_records_kept_total",
            "Records that reached a per-source dataset."
        );
        describe_counter!(
            "pipeline_records_skipped_total",
            "Records dropped, labeled by reason."
        );
        describe_counter!(
            "pipeline_source_errors_total",
            "Sources that failed to load or persist."
        );
        describe_histogram!("pipeline_source_ms", "Per-source processing time in milliseconds.");
    });
}

/* ----------------------------
Inputs
---------------------------- */

#[derive(Debug, Clone)]
pub enum SourceInput {
    Records(Vec<RawMention>),
    File(PathBuf),
}

/// One named input collection with its policy.
#[derive(Debug, Clone)]
pub struct SourceCollection {
    pub name: String,
    pub policy: SourcePolicy,
    pub input: SourceInput,
}

impl SourceCollection {
    pub fn from_records(
        name: impl Into<String>,
        policy: SourcePolicy,
        records: Vec<RawMention>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            input: SourceInput::Records(records),
        }
    }

    pub fn from_file(name: impl Into<String>, policy: SourcePolicy, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            policy,
            input: SourceInput::File(path.into()),
        }
    }

    pub fn from_config(cfg: &SourceConfig) -> Self {
        Self::from_file(cfg.name.clone(), cfg.policy.clone(), cfg.path.clone())
    }

    fn load(&self) -> Result<Vec<RawMention>> {
        match &self.input {
            SourceInput::Records(v) => Ok(v.clone()),
            SourceInput::File(p) => store::load_records(p),
        }
    }
}

/* ----------------------------
Sinks
---------------------------- */

/// Where cleaned datasets go.
pub trait DatasetSink: Send + Sync {
    fn write_source(&self, name: &str, records: &[CanonicalMention]) -> Result<()>;
    fn write_combined(&self, records: &[CanonicalMention]) -> Result<()>;
}

/// Writes `<dir>/<prefix><name>.<ext>` per source and the combined file.
#[derive(Debug, Clone)]
pub struct FileSink {
    output: OutputConfig,
}

impl FileSink {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }
}

impl DatasetSink for FileSink {
    fn write_source(&self, name: &str, records: &[CanonicalMention]) -> Result<()> {
        store::write_dataset(&self.output.source_path(name), records)
    }

    fn write_combined(&self, records: &[CanonicalMention]) -> Result<()> {
        store::write_dataset(&self.output.combined_path(), records)
    }
}

#[derive(Debug, Default)]
struct MemorySinkState {
    sources: BTreeMap<String, Vec<CanonicalMention>>,
    combined: Option<Vec<CanonicalMention>>,
}

/// Keeps everything in memory; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, name: &str) -> Option<Vec<CanonicalMention>> {
        self.state.lock().ok()?.sources.get(name).cloned()
    }

    pub fn combined(&self) -> Option<Vec<CanonicalMention>> {
        self.state.lock().ok()?.combined.clone()
    }
}

impl DatasetSink for MemorySink {
    fn write_source(&self, name: &str, records: &[CanonicalMention]) -> Result<()> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?;
        st.sources.insert(name.to_string(), records.to_vec());
        Ok(())
    }

    fn write_combined(&self, records: &[CanonicalMention]) -> Result<()> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?;
        st.combined = Some(records.to_vec());
        Ok(())
    }
}

/* ----------------------------
Reports
---------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Produced(usize),
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub name: String,
    pub loaded: usize,
    pub kept: usize,
    pub skipped: SkipTally,
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    /// Size of the combined dataset.
    pub combined: usize,
    /// Records removed by the global dedupe across sources.
    pub cross_source_duplicates: usize,
    pub summary: Summary,
    pub combined_error: Option<String>,
    /// At least one source produced a non-empty dataset.
    pub success: bool,
}

impl RunReport {
    pub fn skipped(&self) -> SkipTally {
        let mut t = SkipTally::default();
        for s in &self.sources {
            t.merge(&s.skipped);
        }
        t
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed(_)))
    }
}

/* ----------------------------
Pipeline
---------------------------- */

pub struct Pipeline {
    config: PipelineConfig,
    classifier: Arc<SentimentClassifier>,
    matcher: BrandMatcher,
    dedup: Deduplicator,
    sink: Box<dyn DatasetSink>,
}

impl Pipeline {
    /// Pipeline writing to the files named in `config.output`.
    pub fn new(config: PipelineConfig, classifier: Arc<SentimentClassifier>) -> Self {
        let matcher = BrandMatcher::with_aliases(&config.brand_name, &config.brand_aliases);
        let dedup = Deduplicator::from_rules(&config.dedup);
        let sink = Box::new(FileSink::new(config.output.clone()));
        Self {
            config,
            classifier,
            matcher,
            dedup,
            sink,
        }
    }

    pub fn with_sink(mut self, sink: impl DatasetSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The configured file sources.
    pub fn configured_sources(&self) -> Vec<SourceCollection> {
        self.config
            .sources
            .iter()
            .map(SourceCollection::from_config)
            .collect()
    }

    pub fn run(&self, sources: Vec<SourceCollection>) -> RunReport {
        self.run_at(sources, Utc::now())
    }

    /// `run` with an explicit processing time (date fallback, `analyzed_at`).
    pub fn run_at(&self, sources: Vec<SourceCollection>, now: DateTime<Utc>) -> RunReport {
        ensure_metrics_described();

        let mut reports = Vec::with_capacity(sources.len());
        let mut merged: Vec<CanonicalMention> = Vec::new();

        for src in &sources {
            let started = Instant::now();
            let (records, report) = self.process_source(src, now);
            histogram!("pipeline_source_ms").record(started.elapsed().as_secs_f64() * 1000.0);
            merged.extend(records);
            reports.push(report);
        }

        let success = reports
            .iter()
            .any(|r| matches!(r.outcome, SourceOutcome::Produced(_)));

        let (mut combined, cross_source_duplicates) = self.dedup.dedupe(merged);
        sort_by_date_desc(&mut combined);
        let summary = summarize(&combined);

        let combined_error = if success {
            match self.sink.write_combined(&combined) {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(target: "pipeline", error = ?e, "combined dataset not written");
                    Some(format!("{e:#}"))
                }
            }
        } else {
            tracing::error!(target: "pipeline", "no source produced any records");
            None
        };

        tracing::info!(
            target: "pipeline",
            sources = reports.len(),
            combined = combined.len(),
            cross_source_duplicates,
            positive = summary.positive,
            neutral = summary.neutral,
            negative = summary.negative,
            average_compound = summary.average_compound,
            "pipeline run finished"
        );

        RunReport {
            sources: reports,
            combined: combined.len(),
            cross_source_duplicates,
            summary,
            combined_error,
            success,
        }
    }

    fn process_source(
        &self,
        src: &SourceCollection,
        now: DateTime<Utc>,
    ) -> (Vec<CanonicalMention>, SourceReport) {
        let failed = |msg: String, loaded: usize, skipped: SkipTally| {
            counter!("pipeline_source_errors_total").increment(1);
            SourceReport {
                name: src.name.clone(),
                loaded,
                kept: 0,
                skipped,
                outcome: SourceOutcome::Failed(msg),
            }
        };

        let raw = match src.load() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "pipeline", source = %src.name, error = ?e, "source not loaded");
                return (Vec::new(), failed(format!("{e:#}"), 0, SkipTally::default()));
            }
        };
        let loaded = raw.len();
        counter!("pipeline_records_loaded_total", "source" => src.name.clone())
            .increment(loaded as u64);

        let (records, skipped) = self.clean_source(&raw, &src.policy, now);
        for reason in SKIP_REASONS {
            let n = skipped.get(reason);
            if n > 0 {
                counter!("pipeline_records_skipped_total", "reason" => reason.as_str())
                    .increment(n as u64);
            }
        }

        if let Err(e) = self.sink.write_source(&src.name, &records) {
            tracing::warn!(target: "pipeline", source = %src.name, error = ?e, "source dataset not written");
            return (Vec::new(), failed(format!("{e:#}"), loaded, skipped));
        }

        counter!("pipeline_records_kept_total", "source" => src.name.clone())
            .increment(records.len() as u64);
        tracing::info!(
            target: "pipeline",
            source = %src.name,
            loaded,
            kept = records.len(),
            skipped = skipped.total(),
            duplicates = skipped.duplicate,
            irrelevant = skipped.irrelevant,
            "source cleaned"
        );

        let outcome = if records.is_empty() {
            SourceOutcome::Empty
        } else {
            SourceOutcome::Produced(records.len())
        };
        let report = SourceReport {
            name: src.name.clone(),
            loaded,
            kept: records.len(),
            skipped,
            outcome,
        };
        (records, report)
    }

    /// Clean and score one collection. Pure apart from the classifier.
    pub fn clean_source(
        &self,
        raw: &[RawMention],
        policy: &SourcePolicy,
        now: DateTime<Utc>,
    ) -> (Vec<CanonicalMention>, SkipTally) {
        let (candidates, mut tally) = reconcile(raw, policy);

        let mut candidates: Vec<MentionCandidate> = candidates
            .into_iter()
            .map(|mut c| {
                c.text = normalize(&c.text);
                c
            })
            .collect();

        if policy.relevance_filter {
            candidates.retain(|c| {
                if c.text.is_empty() {
                    tally.record(SkipReason::EmptyText);
                    false
                } else if self.matcher.is_relevant(&c.text) {
                    true
                } else {
                    tally.record(SkipReason::Irrelevant);
                    false
                }
            });
        }

        let (candidates, removed) = self.dedup.dedupe(candidates);
        tally.add(SkipReason::Duplicate, removed);

        let mut out = Vec::with_capacity(candidates.len());
        for c in candidates {
            let mut m = match resolve_date(c, policy.date_policy, now) {
                Ok(m) => m,
                Err(reason) => {
                    tally.record(reason);
                    continue;
                }
            };
            if let Err(reason) = self.length_gate(&m.text) {
                tally.record(reason);
                continue;
            }
            self.classifier.score_mention(&mut m, now);
            out.push(m);
        }
        (out, tally)
    }

    fn length_gate(&self, text: &str) -> Result<(), SkipReason> {
        match text.chars().count() {
            0 => Err(SkipReason::EmptyText),
            n if n <= self.config.min_text_len => Err(SkipReason::TooShort),
            _ => Ok(()),
        }
    }

    /// Re-classify every record (e.g. after a lexicon change) and re-sort.
    pub fn rescore(
        &self,
        mut records: Vec<CanonicalMention>,
        now: DateTime<Utc>,
    ) -> Vec<CanonicalMention> {
        for m in records.iter_mut() {
            self.classifier.score_mention(m, now);
        }
        sort_by_date_desc(&mut records);
        tracing::info!(target: "pipeline", records = records.len(), "dataset rescored");
        records
    }
}

const SKIP_REASONS: [SkipReason; 7] = [
    SkipReason::EmptyText,
    SkipReason::MissingPlatform,
    SkipReason::Irrelevant,
    SkipReason::Duplicate,
    SkipReason::InvalidDate,
    SkipReason::TooShort,
    SkipReason::InvalidScore,
];

/// Stable sort, newest first.
pub fn sort_by_date_desc(records: &mut [CanonicalMention]) {
    records.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Keep scored records only, newest first. Returns the number dropped.
pub fn repair(mut records: Vec<CanonicalMention>) -> (Vec<CanonicalMention>, usize) {
    let before = records.len();
    records.retain(CanonicalMention::is_scored);
    sort_by_date_desc(&mut records);
    let dropped = before - records.len();
    (records, dropped)
}
