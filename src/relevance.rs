// src/relevance.rs
//! Brand relevance gate: tolerant, case-insensitive brand-name matching.
//!
//! A brand like `LeapScholar` is split into words (`leap`, `scholar`) and the
//! matcher accepts every joined form: `leapscholar`, `leap scholar`,
//! `leap-scholar`, `leap_scholar`. Extra aliases can be configured.

use serde_json::Value;

/// Separators used to join brand words into spelling variants.
const JOINERS: [&str; 4] = ["", " ", "-", "_"];

/// Precompiled set of lowercase brand variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandMatcher {
    brand: String,
    variants: Vec<String>,
}

impl BrandMatcher {
    pub fn new(brand_name: &str) -> Self {
        Self::with_aliases::<&str>(brand_name, &[])
    }

    /// Build from the brand name plus configured aliases (each alias also gets
    /// its joined forms).
    pub fn with_aliases<S: AsRef<str>>(brand_name: &str, aliases: &[S]) -> Self {
        let mut variants: Vec<String> = Vec::new();
        let mut push = |v: String| {
            if !v.is_empty() && !variants.contains(&v) {
                variants.push(v);
            }
        };

        let brand = brand_name.trim().to_lowercase();
        push(brand.clone());
        for name in std::iter::once(brand_name).chain(aliases.iter().map(|a| a.as_ref())) {
            push(name.trim().to_lowercase());
            let words = split_words(name);
            if words.len() > 1 {
                for j in JOINERS {
                    push(words.join(j));
                }
            }
        }

        Self { brand, variants }
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// True if `text` mentions the brand in any known spelling.
    pub fn is_relevant(&self, text: &str) -> bool {
        if self.variants.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.variants.iter().any(|v| lower.contains(v.as_str()))
    }

    /// Loosely-typed variant; non-strings are never relevant.
    pub fn is_relevant_value(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.is_relevant(s),
            _ => false,
        }
    }
}

/// One-shot convenience; prefer a reused `BrandMatcher` inside loops.
pub fn is_relevant(text: &str, brand_name: &str) -> bool {
    BrandMatcher::new(brand_name).is_relevant(text)
}

/// Loosely-typed `is_relevant`.
pub fn is_relevant_value(value: &Value, brand_name: &str) -> bool {
    BrandMatcher::new(brand_name).is_relevant_value(value)
}

/// Split a brand name into lowercase words on separators and camel-case humps.
/// `LeapScholar` → [leap, scholar]; `leap-scholar` → [leap, scholar].
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in name.split(|c: char| c.is_whitespace() || c == '-' || c == '_') {
        let mut cur = String::new();
        let mut prev_lower = false;
        for ch in chunk.chars() {
            if ch.is_uppercase() && prev_lower && !cur.is_empty() {
                words.push(cur.to_lowercase());
                cur.clear();
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            cur.push(ch);
        }
        if !cur.is_empty() {
            words.push(cur.to_lowercase());
        }
    }
    words
}
