// tests/reconcile_dates.rs
use brand_sentiment_monitor::config::{DatePolicy, SourcePolicy};
use brand_sentiment_monitor::reconcile::{
    parse_date_str, parse_date_value, reconcile, resolve_date, DateField,
};
use brand_sentiment_monitor::types::SkipReason;
use brand_sentiment_monitor::{Platform, RawMention};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn collector_date_formats() {
    let cases = [
        ("2025-01-13T07:15:00Z", utc(2025, 1, 13, 7, 15, 0)),
        ("2025-01-13T12:45:00+05:30", utc(2025, 1, 13, 7, 15, 0)),
        ("Mon, 13 Jan 2025 07:15:00 GMT", utc(2025, 1, 13, 7, 15, 0)),
        ("2025-01-13 07:15:00", utc(2025, 1, 13, 7, 15, 0)),
        ("2025-01-13 07:15:00.250", utc(2025, 1, 13, 7, 15, 0)),
        ("2025-01-13", utc(2025, 1, 13, 0, 0, 0)),
        ("01/13/2025", utc(2025, 1, 13, 0, 0, 0)),
        ("Jan 13, 2025", utc(2025, 1, 13, 0, 0, 0)),
        ("13 January 2025", utc(2025, 1, 13, 0, 0, 0)),
        ("1736752500", utc(2025, 1, 13, 7, 15, 0)),
        ("1736752500000", utc(2025, 1, 13, 7, 15, 0)),
        ("2024", utc(2024, 1, 1, 0, 0, 0)),
        ("2024-03", utc(2024, 3, 1, 0, 0, 0)),
    ];
    for (raw, want) in cases {
        let got = parse_date_str(raw).unwrap_or_else(|| panic!("unparsed {raw:?}"));
        assert_eq!(got.timestamp(), want.timestamp(), "{raw}");
    }
    for raw in ["", "2 hours ago", "yesterday", "2025-13-45", "2024-13", "12345", "20-25"] {
        assert!(parse_date_str(raw).is_none(), "{raw:?} should not parse");
    }
}

#[test]
fn loosely_typed_dates() {
    assert_eq!(parse_date_value(None), DateField::Missing);
    assert_eq!(parse_date_value(Some(&Value::Null)), DateField::Missing);
    assert_eq!(parse_date_value(Some(&json!("  "))), DateField::Missing);
    assert_eq!(
        parse_date_value(Some(&json!("soon"))),
        DateField::Invalid("soon".into())
    );
    // epoch milliseconds
    assert_eq!(
        parse_date_value(Some(&json!(1_736_752_500_000_i64))),
        DateField::Valid(utc(2025, 1, 13, 7, 15, 0))
    );
}

#[test]
fn date_policy_drop_vs_fallback() {
    let now = utc(2025, 2, 1, 0, 0, 0);
    let raw = vec![
        RawMention::new().with("text", "LeapScholar a").with("date", "whenever"),
        RawMention::new().with("text", "LeapScholar b"),
    ];

    let (cands, _) = reconcile(&raw, &SourcePolicy::for_platform("Reddit"));
    for c in cands {
        assert_eq!(resolve_date(c, DatePolicy::Drop, now), Err(SkipReason::InvalidDate));
    }

    let (cands, _) = reconcile(&raw, &SourcePolicy::for_platform("News"));
    for c in cands {
        let m = resolve_date(c, DatePolicy::FallbackNow, now).expect("fallback");
        assert_eq!(m.date, now);
        assert_eq!(m.platform, Platform::News);
        assert!(!m.is_scored());
    }
}

#[test]
fn merged_exports_with_aliased_and_repeated_columns() {
    // Column layout of a merged CSV export: aliases plus pandas-style ".1" copies.
    let raw = RawMention::from_pairs(vec![
        ("Platform", json!("twitter")),
        ("username", json!("@leapfan")),
        ("content", json!("LeapScholar webinar was useful")),
        ("created_at", Value::Null),
        ("created_at.1", json!("2025-01-20 09:30:00")),
        ("link", json!("1880000000000000000")),
    ]);
    let (cands, tally) = reconcile(&[raw], &SourcePolicy::default());
    assert_eq!(tally.total(), 0);
    let c = &cands[0];
    assert_eq!(c.platform, Platform::Twitter);
    assert_eq!(c.source, "@leapfan");
    assert_eq!(c.text, "LeapScholar webinar was useful");
    assert_eq!(c.date, DateField::Valid(utc(2025, 1, 20, 9, 30, 0)));
    assert_eq!(c.url.as_deref(), Some("1880000000000000000"));
}

#[test]
fn rows_without_any_platform_are_skipped() {
    let raw = vec![
        RawMention::new().with("text", "LeapScholar"),
        RawMention::new().with("text", "LeapScholar").with("platform", "Reddit"),
    ];
    let (cands, tally) = reconcile(&raw, &SourcePolicy::default());
    assert_eq!(cands.len(), 1);
    assert_eq!(tally.get(SkipReason::MissingPlatform), 1);
}
