// src/sentiment/preprocess.rs
//! Scoring-side text cleanup. Stricter than `crate::normalize`: the output
//! is a token list for the lexicon scorer, never shown to users.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("url regex"));
static RE_HANDLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+|#\w+").expect("handle regex"));
static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));

/// Tokens this short are dropped.
const MIN_TOKEN_CHARS: usize = 3;

/// NLTK English stopwords plus feed noise.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're",
        "you've", "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he",
        "him", "his", "himself", "she", "she's", "her", "hers", "herself", "it", "it's",
        "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "that'll", "these", "those", "am", "is", "are",
        "was", "were", "be", "been", "being", "have", "has", "had", "having", "do",
        "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or", "because",
        "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
        "between", "into", "through", "during", "before", "after", "above", "below",
        "to", "from", "up", "down", "in", "out", "on", "off", "over", "under", "again",
        "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
        "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t",
        "can", "will", "just", "don", "don't", "should", "should've", "now", "d", "ll",
        "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't",
        "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't",
        "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn",
        "mustn't", "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn",
        "wasn't", "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
        // feed noise
        "rt", "http", "https", "amp",
    ]
    .into_iter()
    .collect()
});

/// Stopwords kept when negation-aware cleaning is requested.
const NEGATOR_STOPWORDS: [&str; 3] = ["no", "nor", "not"];

/// Plural-looking words that are already their base form.
const LEMMA_KEEP: &[&str] = &[
    "news", "series", "species", "thanks", "congrats", "yes", "always", "perhaps",
    "sometimes", "unless", "whereas", "towards", "afterwards", "besides", "kudos",
    "ielts", "gre", "gmat", "toefl", "ads",
];

const LEMMA_KEEP_SUFFIXES: &[&str] = &["ss", "us", "is", "ous", "ics", "sis"];

const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Noun base form for a lowercase token (plural → singular); anything else is
/// returned unchanged.
pub fn lemmatize(token: &str) -> String {
    if let Some((_, base)) = IRREGULAR_PLURALS.iter().find(|(p, _)| *p == token) {
        return (*base).to_string();
    }
    let n = token.chars().count();
    if n <= 3
        || LEMMA_KEEP.contains(&token)
        || LEMMA_KEEP_SUFFIXES.iter().any(|s| token.ends_with(s))
        || !token.ends_with('s')
    {
        return token.to_string();
    }
    if let Some(stem) = token.strip_suffix("ies") {
        if n > 4 {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "xes", "zes", "ches", "shes"] {
        if token.ends_with(suffix) {
            return token[..token.len() - 2].to_string();
        }
    }
    token[..token.len() - 1].to_string()
}

/// Lowercase, strip URLs, handles, hashtags and punctuation, drop stopwords
/// and short tokens, lemmatize.
pub fn clean_for_scoring(text: &str) -> Vec<String> {
    clean_for_scoring_with(text, false)
}

/// `clean_for_scoring`, optionally keeping `no`/`nor`/`not` so the scorer can
/// apply negation.
pub fn clean_for_scoring_with(text: &str, keep_negators: bool) -> Vec<String> {
    let dropped =
        |t: &str| is_stopword(t) && !(keep_negators && NEGATOR_STOPWORDS.contains(&t));
    let lower = text.to_lowercase();
    let no_urls = RE_URL.replace_all(&lower, "");
    let no_handles = RE_HANDLE.replace_all(&no_urls, "");
    let words_only = RE_NON_WORD.replace_all(&no_handles, "");
    words_only
        .split_whitespace()
        .filter(|t| !dropped(*t) && t.chars().count() >= MIN_TOKEN_CHARS)
        .map(lemmatize)
        .collect()
}

/// Space-joined `clean_for_scoring`.
pub fn clean_text(text: &str) -> String {
    clean_for_scoring(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_noise_and_stopwords() {
        let out = clean_text("RT @leap_user: I LOVE #LeapScholar!!! https://t.co/abc www.x.com so good");
        assert_eq!(out, "love good");
    }

    #[test]
    fn negator_stopwords_dropped_by_default() {
        assert_eq!(clean_text("LeapScholar was not good"), "leapscholar good");
        assert_eq!(clean_for_scoring("nor helpful"), vec!["helpful"]);
        assert_eq!(clean_for_scoring("don't like it"), vec!["dont", "like"]);
    }

    #[test]
    fn negators_survive_when_requested() {
        assert_eq!(clean_for_scoring_with("It is not good", true), vec!["not", "good"]);
        assert_eq!(clean_for_scoring_with("nor helpful", true), vec!["nor", "helpful"]);
        assert_eq!(clean_for_scoring_with("it is the best", true), vec!["best"]);
    }

    #[test]
    fn short_tokens_dropped() {
        assert!(clean_for_scoring("ok go up").is_empty());
    }

    #[test]
    fn lemmatizer_singularizes_nouns_only() {
        assert_eq!(lemmatize("scholarships"), "scholarship");
        assert_eq!(lemmatize("studies"), "study");
        assert_eq!(lemmatize("classes"), "class");
        assert_eq!(lemmatize("boxes"), "box");
        assert_eq!(lemmatize("courses"), "course");
        assert_eq!(lemmatize("women"), "woman");
        assert_eq!(lemmatize("news"), "news");
        assert_eq!(lemmatize("thanks"), "thanks");
        assert_eq!(lemmatize("famous"), "famous");
        assert_eq!(lemmatize("crisis"), "crisis");
        assert_eq!(lemmatize("loved"), "loved");
        assert_eq!(lemmatize("bus"), "bus");
    }
}
