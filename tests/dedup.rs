// tests/dedup.rs
use brand_sentiment_monitor::dedup::{
    dedupe, ContentHash, DedupRule, DedupStrategy, DedupView, Dedupable, Deduplicator, ExactText,
};
use brand_sentiment_monitor::{CanonicalMention, Platform};
use chrono::{TimeZone, Utc};

fn m(platform: Platform, source: &str, text: &str) -> CanonicalMention {
    CanonicalMention::new(
        platform,
        source,
        text,
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        None,
    )
}

fn texts(v: &[CanonicalMention]) -> Vec<&str> {
    v.iter().map(|m| m.text.as_str()).collect()
}

#[test]
fn default_chain_is_exact_text_then_identity_pair() {
    let d = Deduplicator::default();
    assert_eq!(d.pass_names(), vec!["exact_text", "identity_pair"]);

    let input = vec![
        m(Platform::Reddit, "u/a", "first post"),
        m(Platform::Reddit, "u/b", "first post"),
        m(Platform::Reddit, "u/a", "second post by the same author"),
        m(Platform::Twitter, "u/a", "same handle, other platform"),
    ];
    let (out, removed) = d.dedupe(input);
    assert_eq!(removed, 2);
    assert_eq!(
        texts(&out),
        vec!["first post", "same handle, other platform"],
        "first occurrence wins in both passes"
    );
}

#[test]
fn blank_sources_collapse_under_identity_pair() {
    let out = dedupe(vec![
        m(Platform::News, "", "headline one"),
        m(Platform::News, "", "headline two"),
    ]);
    assert_eq!(texts(&out), vec!["headline one"]);
}

#[test]
fn content_hash_chain_keeps_prolific_authors() {
    let d = Deduplicator::from_rules(&[DedupRule::ExactText, DedupRule::ContentHash]);
    let (out, removed) = d.dedupe(vec![
        m(Platform::Reddit, "u/a", "LeapScholar review"),
        m(Platform::Reddit, "u/a", "leapscholar   REVIEW"),
        m(Platform::Reddit, "u/a", "another take on LeapScholar"),
    ]);
    assert_eq!(removed, 1);
    assert_eq!(
        texts(&out),
        vec!["LeapScholar review", "another take on LeapScholar"]
    );
}

#[test]
fn near_text_threshold() {
    let d = Deduplicator::from_rules(&[DedupRule::NearText { threshold: 0.9 }]);
    let (out, _) = d.dedupe(vec![
        m(Platform::Twitter, "@a", "LeapScholar helped me get my visa"),
        m(Platform::Twitter, "@b", "LeapScholar helped me get my visa!"),
        m(Platform::Twitter, "@c", "Completely different complaint"),
    ]);
    assert_eq!(out.len(), 2);
}

#[derive(Debug)]
struct KeepNone;

impl DedupStrategy for KeepNone {
    fn name(&self) -> &'static str {
        "keep_none"
    }
    fn keep_mask(&self, items: &[DedupView<'_>]) -> Vec<bool> {
        vec![false; items.len()]
    }
}

#[test]
fn custom_strategies_plug_in() {
    let d = Deduplicator::new(vec![Box::new(ExactText), Box::new(KeepNone)]);
    let (out, removed) = d.dedupe(vec![m(Platform::News, "x", "a"), m(Platform::News, "y", "b")]);
    assert!(out.is_empty());
    assert_eq!(removed, 2);
}

#[test]
fn views_expose_platform_and_source() {
    let rec = m(Platform::Other("Quora".into()), "asker", "text");
    let v = rec.dedup_view();
    assert_eq!((v.platform, v.source, v.text), ("Quora", "asker", "text"));
    assert_eq!(
        ContentHash::digest("A  b"),
        ContentHash::digest("a b"),
        "whitespace and case folded"
    );
}
