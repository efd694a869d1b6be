// src/dedup.rs
//! Order-preserving, first-occurrence-wins deduplication.
//!
//! A `Deduplicator` runs a chain of `DedupStrategy` passes. The default chain is
//! `exact_text` then `identity_pair`. Note that `identity_pair` keeps a single
//! record per (platform, source), even when the texts differ; existing datasets
//! depend on that, so it stays the default. Swap the second pass for
//! `content_hash` or `near_text` to keep every distinct text of a prolific source.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use strsim::normalized_levenshtein;

use crate::types::CanonicalMention;

/// Borrowed view of the fields dedup rules look at.
#[derive(Debug, Clone, Copy)]
pub struct DedupView<'a> {
    pub text: &'a str,
    pub platform: &'a str,
    pub source: &'a str,
}

/// Anything that can be deduplicated.
pub trait Dedupable {
    fn dedup_view(&self) -> DedupView<'_>;
}

impl Dedupable for CanonicalMention {
    fn dedup_view(&self) -> DedupView<'_> {
        DedupView {
            text: &self.text,
            platform: self.platform.as_str(),
            source: &self.source,
        }
    }
}

/// One dedup pass. Returns a keep-mask aligned with `items`.
pub trait DedupStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn keep_mask(&self, items: &[DedupView<'_>]) -> Vec<bool>;
}

/// Generic first-wins pass over a derived key.
fn first_wins<K, F>(items: &[DedupView<'_>], key: F) -> Vec<bool>
where
    K: std::hash::Hash + Eq,
    F: Fn(&DedupView<'_>) -> K,
{
    let mut seen: HashSet<K> = HashSet::with_capacity(items.len());
    items.iter().map(|it| seen.insert(key(it))).collect()
}

/// Pass 1: identical `text` values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactText;

impl DedupStrategy for ExactText {
    fn name(&self) -> &'static str {
        "exact_text"
    }
    fn keep_mask(&self, items: &[DedupView<'_>]) -> Vec<bool> {
        first_wins(items, |it| it.text.to_string())
    }
}

/// Pass 2: identical (platform, source) pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPair;

impl DedupStrategy for IdentityPair {
    fn name(&self) -> &'static str {
        "identity_pair"
    }
    fn keep_mask(&self, items: &[DedupView<'_>]) -> Vec<bool> {
        first_wins(items, |it| (it.platform.to_string(), it.source.to_string()))
    }
}

/// SHA-256 over case-folded, whitespace-collapsed text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHash;

impl ContentHash {
    pub fn digest(text: &str) -> [u8; 32] {
        let folded = text
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let mut hasher = Sha256::new();
        hasher.update(folded.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }
}

impl DedupStrategy for ContentHash {
    fn name(&self) -> &'static str {
        "content_hash"
    }
    fn keep_mask(&self, items: &[DedupView<'_>]) -> Vec<bool> {
        first_wins(items, |it| Self::digest(it.text))
    }
}

/// Near-duplicate text: normalized Levenshtein similarity against every kept
/// text. Quadratic; meant for per-source batches, not the whole archive.
#[derive(Debug, Clone, Copy)]
pub struct NearText {
    pub threshold: f64,
}

impl DedupStrategy for NearText {
    fn name(&self) -> &'static str {
        "near_text"
    }
    fn keep_mask(&self, items: &[DedupView<'_>]) -> Vec<bool> {
        let threshold = self.threshold.clamp(0.0, 1.0);
        let mut kept: Vec<String> = Vec::new();
        let mut mask = Vec::with_capacity(items.len());
        for it in items {
            let t = it.text.to_lowercase();
            let dup = kept
                .iter()
                .any(|k| normalized_levenshtein(k, &t) >= threshold);
            if !dup {
                kept.push(t);
            }
            mask.push(!dup);
        }
        mask
    }
}

/// Serializable description of a pass, used by the pipeline config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DedupRule {
    ExactText,
    ContentHash,
    IdentityPair,
    NearText {
        #[serde(default = "default_near_threshold")]
        threshold: f64,
    },
}

fn default_near_threshold() -> f64 {
    0.9
}

impl DedupRule {
    pub fn default_chain() -> Vec<DedupRule> {
        vec![DedupRule::ExactText, DedupRule::IdentityPair]
    }

    pub fn build(&self) -> Box<dyn DedupStrategy> {
        match self {
            DedupRule::ExactText => Box::new(ExactText),
            DedupRule::ContentHash => Box::new(ContentHash),
            DedupRule::IdentityPair => Box::new(IdentityPair),
            DedupRule::NearText { threshold } => Box::new(NearText {
                threshold: *threshold,
            }),
        }
    }
}

/// Ordered chain of passes.
#[derive(Debug)]
pub struct Deduplicator {
    passes: Vec<Box<dyn DedupStrategy>>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::from_rules(&DedupRule::default_chain())
    }
}

impl Deduplicator {
    pub fn new(passes: Vec<Box<dyn DedupStrategy>>) -> Self {
        Self { passes }
    }

    pub fn from_rules(rules: &[DedupRule]) -> Self {
        Self::new(rules.iter().map(DedupRule::build).collect())
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass in order. Returns survivors (input order) and the number removed.
    pub fn dedupe<T: Dedupable>(&self, records: Vec<T>) -> (Vec<T>, usize) {
        let before = records.len();
        let mut current = records;
        for pass in &self.passes {
            let mask = {
                let views: Vec<DedupView<'_>> = current.iter().map(|r| r.dedup_view()).collect();
                pass.keep_mask(&views)
            };
            current = current
                .into_iter()
                .zip(mask)
                .filter_map(|(r, keep)| keep.then_some(r))
                .collect();
        }
        let removed = before - current.len();
        (current, removed)
    }
}

/// Default two-pass dedupe.
pub fn dedupe<T: Dedupable>(records: Vec<T>) -> Vec<T> {
    Deduplicator::default().dedupe(records).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(&'static str, &'static str, &'static str);

    impl Dedupable for Row {
        fn dedup_view(&self) -> DedupView<'_> {
            DedupView {
                text: self.2,
                platform: self.0,
                source: self.1,
            }
        }
    }

    #[test]
    fn exact_text_first_wins() {
        let rows = vec![
            Row("Twitter", "@a", "same"),
            Row("Reddit", "r/x", "same"),
            Row("News", "BBC", "other"),
        ];
        let (out, removed) = Deduplicator::new(vec![Box::new(ExactText)]).dedupe(rows);
        assert_eq!(removed, 1);
        assert_eq!(out[0], Row("Twitter", "@a", "same"));
        assert_eq!(out[1].2, "other");
    }

    #[test]
    fn identity_pair_caps_one_per_source() {
        let rows = vec![
            Row("Reddit", "r/study", "first post"),
            Row("Reddit", "r/study", "second, different post"),
            Row("Twitter", "r/study", "same source name, other platform"),
        ];
        let out = dedupe(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].2, "first post");
        assert_eq!(out[1].0, "Twitter");
    }

    #[test]
    fn content_hash_folds_case_and_spacing() {
        let rows = vec![Row("a", "1", "Hello   World"), Row("b", "2", "hello world")];
        let (out, removed) = Deduplicator::from_rules(&[DedupRule::ContentHash]).dedupe(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(removed, 1);
    }

    #[test]
    fn near_text_catches_small_edits() {
        let rows = vec![
            Row("a", "1", "LeapScholar helped me get my visa"),
            Row("a", "2", "LeapScholar helped me get my visa!"),
            Row("a", "3", "Totally unrelated sentence about food"),
        ];
        let (out, _) =
            Deduplicator::from_rules(&[DedupRule::NearText { threshold: 0.9 }]).dedupe(rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].1, "3");
    }

    #[test]
    fn rules_deserialize_from_toml() {
        #[derive(serde::Deserialize)]
        struct Wrap {
            dedup: Vec<DedupRule>,
        }
        let w: Wrap = toml::from_str(
            r#"
dedup = [ { rule = "exact_text" }, { rule = "near_text", threshold = 0.8 } ]
"#,
        )
        .unwrap();
        assert_eq!(
            w.dedup,
            vec![DedupRule::ExactText, DedupRule::NearText { threshold: 0.8 }]
        );
        let d = Deduplicator::from_rules(&w.dedup);
        assert_eq!(d.pass_names(), vec!["exact_text", "near_text"]);
    }

    #[test]
    fn empty_input_is_fine() {
        let out: Vec<Row> = dedupe(Vec::new());
        assert!(out.is_empty());
    }
}
