//! Synthetic relevance suite: brand spellings embedded in filler text with
//! random casing, against near-misses that only share the brand's words.

use brand_sentiment_monitor::relevance::BrandMatcher;
use rand::{rngs::StdRng, Rng, SeedableRng};

const SPELLINGS: &[&str] = &["LeapScholar", "leap scholar", "Leap-Scholar", "leap_scholar"];
const FILLER: &[&str] = &[
    "just", "got", "my", "visa", "through", "honestly", "the", "app", "is", "slow", "today",
    "counsellor", "called", "again", "IELTS", "prep", "#studyabroad",
];
const NEAR_MISSES: &[&str] = &[
    "a leap of faith for every scholar",
    "scholar leap",
    "leapscholastic results",
    "leap  scholar",
    "leap.scholar",
];

fn scramble_case(rng: &mut StdRng, s: &str) -> String {
    s.chars()
        .map(|c| {
            if rng.random_range(0..2) == 0 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

fn sentence(rng: &mut StdRng, middle: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for _ in 0..rng.random_range(0..6) {
        words.push(FILLER[rng.random_range(0..FILLER.len())].to_string());
    }
    words.push(middle.to_string());
    for _ in 0..rng.random_range(0..6) {
        words.push(FILLER[rng.random_range(0..FILLER.len())].to_string());
    }
    words.join(" ")
}

#[test]
fn every_spelling_in_any_case_is_relevant() {
    let m = BrandMatcher::new("LeapScholar");
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let spelling = SPELLINGS[rng.random_range(0..SPELLINGS.len())];
        let spelled = scramble_case(&mut rng, spelling);
        let text = sentence(&mut rng, &spelled);
        assert!(m.is_relevant(&text), "should match: {text:?}");
    }
}

#[test]
fn filler_and_near_misses_are_not_relevant() {
    let m = BrandMatcher::new("LeapScholar");
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..300 {
        let miss = NEAR_MISSES[rng.random_range(0..NEAR_MISSES.len())];
        let text = sentence(&mut rng, miss);
        assert!(!m.is_relevant(&text), "should not match: {text:?}");
    }
}

#[test]
fn multi_word_brand_and_aliases() {
    let m = BrandMatcher::with_aliases("Leap Finance", &["LeapScholar"]);
    assert!(m.is_relevant("loan approved by LEAPFINANCE"));
    assert!(m.is_relevant("leap_finance support"));
    assert!(m.is_relevant("applied on leap-scholar"));
    assert!(!m.is_relevant("finance leap"));
}
