// src/normalize.rs
//! Mention text normalizer: whitespace folding, URL removal, symbol stripping.
//!
//! Pure and idempotent. Anything that is not a string normalizes to `""`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

// scheme + URL-safe chars; `$-_` is a range, `%XX` covers percent-encoding
static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*(),]|%[0-9a-fA-F]{2})+")
        .expect("url regex")
});

static RE_SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s.,!?\-']").expect("symbol regex"));

/// Normalize mention text.
pub fn normalize(text: &str) -> String {
    // 1) Collapse whitespace
    let out = collapse_ws(text);

    // 2) Drop URLs
    let out = RE_URL.replace_all(&out, "");

    // 3) Strip everything outside word chars, whitespace and . , ! ? - '
    let out = RE_SYMBOLS.replace_all(&out, "");

    // 4) Removals above can leave double spaces behind
    collapse_ws(&out)
}

/// `normalize` for loosely-typed input; non-strings become `""`.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => normalize(s),
        _ => String::new(),
    }
}

fn collapse_ws(s: &str) -> String {
    RE_WS.replace_all(s.trim(), " ").trim().to_string()
}
