// src/sentiment/lexicon.rs
//! Lexicon and rule-based polarity scoring.
//!
//! Per token: lexicon valence, nudged by boosters in the three preceding
//! tokens (damped by distance) and flipped by preceding negators. The summed
//! valence is squashed into the compound score `s / sqrt(s² + 15)`.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::types::Subscores;

/// Word → valence map shipped with the crate.
pub const BUILTIN_LEXICON: &str = include_str!("../../sentiment_lexicon.json");

const B_INCR: f64 = 0.293;
const B_DECR: f64 = -0.293;
const N_SCALAR: f64 = -0.74;
const ALPHA: f64 = 15.0;
/// Damping for boosters one and two tokens further back.
const DISTANCE_DAMPING: [f64; 3] = [1.0, 0.95, 0.9];
const MAX_VALENCE: f64 = 4.0;

static BOOSTERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let incr = [
        "absolutely", "amazingly", "awfully", "completely", "considerably", "decidedly",
        "deeply", "enormously", "entirely", "especially", "exceptionally", "extremely",
        "fabulously", "fully", "greatly", "hella", "highly", "hugely", "incredibly",
        "intensely", "majorly", "particularly", "purely", "quite", "really", "remarkably",
        "substantially", "thoroughly", "totally", "tremendously", "uber", "unbelievably",
        "unusually", "utterly",
    ];
    let decr = [
        "almost", "barely", "hardly", "kinda", "kindof", "less", "little", "marginally",
        "occasionally", "partly", "scarcely", "slightly", "somewhat", "sorta", "sortof",
    ];
    incr.into_iter()
        .map(|w| (w, B_INCR))
        .chain(decr.into_iter().map(|w| (w, B_DECR)))
        .collect()
});

/// Negators as they look after punctuation stripping (`don't` → `dont`).
const NEGATORS: &[&str] = &[
    "aint", "arent", "cannot", "cant", "couldnt", "darent", "didnt", "doesnt", "dont",
    "hadnt", "hasnt", "havent", "isnt", "mightnt", "mustnt", "neither", "neednt", "never",
    "none", "nope", "nor", "not", "nothing", "nowhere", "oughtnt", "shant", "shouldnt",
    "wasnt", "werent", "without", "wont", "wouldnt", "rarely", "seldom", "despite", "no",
];

pub fn is_negator(token: &str) -> bool {
    NEGATORS.contains(&token)
}

pub fn booster_scalar(token: &str) -> Option<f64> {
    BOOSTERS.get(token).copied()
}

#[derive(Debug, Clone)]
pub struct Lexicon {
    valences: HashMap<String, f64>,
}

impl Lexicon {
    /// Parse a JSON object of `word: valence`; valences must lie in [-4, 4].
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, f64> =
            serde_json::from_str(raw).context("sentiment lexicon is not a JSON object of numbers")?;
        let mut valences = HashMap::with_capacity(parsed.len());
        for (word, v) in parsed {
            if !v.is_finite() || v.abs() > MAX_VALENCE {
                bail!("lexicon valence for `{word}` out of range: {v}");
            }
            valences.insert(word.trim().to_lowercase(), v);
        }
        if valences.is_empty() {
            bail!("sentiment lexicon is empty");
        }
        Ok(Self { valences })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_LEXICON)
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.valences.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.valences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valences.is_empty()
    }

    /// Valence of `tokens[i]` after booster and negation rules.
    fn token_valence<S: AsRef<str>>(&self, tokens: &[S], i: usize) -> f64 {
        let word = tokens[i].as_ref();
        if booster_scalar(word).is_some() {
            return 0.0;
        }
        if word == "kind" && tokens.get(i + 1).map(|t| t.as_ref()) == Some("of") {
            return 0.0;
        }
        let Some(mut valence) = self.valence(word) else {
            return 0.0;
        };

        for (dist, damping) in DISTANCE_DAMPING.iter().enumerate() {
            if i <= dist {
                break;
            }
            let prev = tokens[i - dist - 1].as_ref();
            if self.valence(prev).is_some() {
                continue;
            }
            if let Some(scalar) = booster_scalar(prev) {
                let s = if valence < 0.0 { -scalar } else { scalar };
                valence += s * damping;
            }
            if is_negator(prev) {
                valence *= N_SCALAR;
            }
        }
        valence
    }

    /// Score a cleaned token list.
    pub fn polarity_scores<S: AsRef<str>>(&self, tokens: &[S]) -> Subscores {
        if tokens.is_empty() {
            return Subscores::NEUTRAL;
        }
        let sentiments: Vec<f64> = (0..tokens.len())
            .map(|i| self.token_valence(tokens, i))
            .collect();

        let sum: f64 = sentiments.iter().sum();
        let compound = normalize_sum(sum);

        let (mut pos_sum, mut neg_sum, mut neu_count) = (0.0_f64, 0.0_f64, 0usize);
        for s in &sentiments {
            if *s > 0.0 {
                pos_sum += s + 1.0;
            } else if *s < 0.0 {
                neg_sum += s - 1.0;
            } else {
                neu_count += 1;
            }
        }
        let total = pos_sum + neg_sum.abs() + neu_count as f64;
        if total == 0.0 {
            return Subscores::NEUTRAL;
        }
        Subscores {
            neg: round_to((neg_sum / total).abs(), 3),
            neu: round_to(neu_count as f64 / total, 3),
            pos: round_to((pos_sum / total).abs(), 3),
            compound: round_to(compound, 4),
        }
    }
}

fn normalize_sum(score: f64) -> f64 {
    let norm = score / (score * score + ALPHA).sqrt();
    norm.clamp(-1.0, 1.0)
}

fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}
