// src/sentiment/mod.rs
//! Sentiment classification of mention texts.
//!
//! `SentimentClassifier` is built once per process (it owns the parsed
//! lexicon) and shared immutably, e.g. behind an `Arc`.

pub mod lexicon;
pub mod preprocess;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{CanonicalMention, SentimentScore};
pub use lexicon::Lexicon;

/// Inputs shorter than this (trimmed, in chars) are not scored.
pub const MIN_SCORABLE_CHARS: usize = 3;

#[derive(Debug, Clone)]
pub struct SentimentClassifier {
    lexicon: Lexicon,
    keep_negators: bool,
}

impl SentimentClassifier {
    /// Classifier over the built-in lexicon.
    pub fn new() -> Result<Self> {
        let lexicon = Lexicon::builtin().context("loading built-in sentiment lexicon")?;
        Ok(Self::with_lexicon(lexicon))
    }

    /// Classifier over a custom `word: valence` JSON lexicon.
    pub fn from_lexicon_str(raw: &str) -> Result<Self> {
        Ok(Self::with_lexicon(Lexicon::from_json_str(raw)?))
    }

    pub fn with_lexicon(lexicon: Lexicon) -> Self {
        Self {
            lexicon,
            keep_negators: false,
        }
    }

    /// Keep `no`/`nor`/`not` through cleanup so negated phrases flip polarity.
    /// Off by default: stock cleanup drops them with the other stopwords.
    pub fn with_negation(mut self, keep_negators: bool) -> Self {
        self.keep_negators = keep_negators;
        self
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Label, compound and proportions for one text. Never fails: blank,
    /// tiny, or all-noise inputs come back neutral with compound 0.0.
    pub fn classify(&self, text: &str) -> SentimentScore {
        if text.trim().chars().count() < MIN_SCORABLE_CHARS {
            return SentimentScore::neutral();
        }
        let tokens = preprocess::clean_for_scoring_with(text, self.keep_negators);
        if tokens.is_empty() {
            return SentimentScore::neutral();
        }
        SentimentScore::from_subscores(self.lexicon.polarity_scores(&tokens))
    }

    /// Loosely-typed `classify`; non-strings are neutral.
    pub fn classify_value(&self, value: &Value) -> SentimentScore {
        match value {
            Value::String(s) => self.classify(s),
            _ => SentimentScore::neutral(),
        }
    }

    /// Score a canonical record in place.
    pub fn score_mention(&self, mention: &mut CanonicalMention, analyzed_at: DateTime<Utc>) {
        let score = self.classify(&mention.text);
        mention.apply_score(&score, analyzed_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sentiment, Subscores};
    use serde_json::json;

    fn clf() -> SentimentClassifier {
        SentimentClassifier::new().unwrap()
    }

    #[test]
    fn short_input_is_neutral_zero() {
        for t in ["", "  ", "ok", " hi "] {
            let s = clf().classify(t);
            assert_eq!(s.label, Sentiment::Neutral);
            assert_eq!(s.compound, 0.0);
            assert_eq!(s.subscores, Subscores::NEUTRAL);
        }
    }

    #[test]
    fn noise_only_input_is_neutral_zero() {
        let s = clf().classify("RT @someone https://t.co/x #tag");
        assert_eq!(s, SentimentScore::neutral());
    }

    #[test]
    fn clear_positive_and_negative() {
        let pos = clf().classify("I love LeapScholar, best decision ever!!!");
        assert_eq!(pos.label, Sentiment::Positive);
        assert!(pos.compound > 0.8);

        let neg = clf().classify("worst service ever, total scam");
        assert_eq!(neg.label, Sentiment::Negative);
        assert!(neg.compound < -0.2);
    }

    #[test]
    fn negator_is_a_stopword_by_default() {
        let s = clf().classify("LeapScholar was not good");
        assert_eq!(s.label, Sentiment::Positive);
        assert_eq!(s, clf().classify("LeapScholar was good"));
    }

    #[test]
    fn negation_mode_flips_negated_praise() {
        let s = clf().with_negation(true).classify("LeapScholar was not good");
        assert_eq!(s.label, Sentiment::Negative);
    }

    #[test]
    fn label_always_matches_compound() {
        for t in [
            "fine",
            "okay I guess",
            "counselling session was helpful",
            "slightly annoying onboarding",
            "application portal has an issue",
        ] {
            let s = clf().classify(t);
            assert_eq!(s.label, Sentiment::from_compound(s.compound), "{t}");
        }
    }

    #[test]
    fn non_string_values_are_neutral() {
        assert_eq!(clf().classify_value(&json!(42)), SentimentScore::neutral());
        assert_eq!(clf().classify_value(&Value::Null), SentimentScore::neutral());
    }

    #[test]
    fn custom_lexicon() {
        let c = SentimentClassifier::from_lexicon_str(r#"{"stellar": -3.0}"#).unwrap();
        assert_eq!(c.classify("stellar stuff").label, Sentiment::Negative);
        assert_eq!(c.lexicon().len(), 1);
    }

    #[test]
    fn classifier_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SentimentClassifier>();
    }
}
