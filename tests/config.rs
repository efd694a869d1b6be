// tests/config.rs
use brand_sentiment_monitor::config::{load_default, load_from, DatePolicy, PipelineConfig};
use brand_sentiment_monitor::dedup::DedupRule;
use std::{env, fs};

#[test]
fn parse_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("pipeline.toml");
    fs::write(
        &p_toml,
        r#"
brand_name = "Acme Study"
brand_aliases = ["acmestudy.io"]
min_text_len = 4
dedup = [ { rule = "exact_text" }, { rule = "near_text", threshold = 0.95 } ]

[[sources]]
name = "news"
path = "raw/news.csv"
platform = "News"
relevance_filter = false
date_policy = "fallback_now"
"#,
    )
    .unwrap();
    let cfg = load_from(&p_toml).unwrap();
    assert_eq!(cfg.brand_name, "Acme Study");
    assert_eq!(cfg.brand_aliases, vec!["acmestudy.io".to_string()]);
    assert_eq!(
        cfg.dedup,
        vec![
            DedupRule::ExactText,
            DedupRule::NearText { threshold: 0.95 }
        ]
    );
    assert_eq!(cfg.sources[0].policy.date_policy, DatePolicy::FallbackNow);
    assert_eq!(cfg.courtesy_delay_ms, 1_000);

    let p_json = dir.path().join("pipeline.json");
    fs::write(&p_json, r#"{"brand_name":"Other","min_text_len":0}"#).unwrap();
    let cj = load_from(&p_json).unwrap();
    assert_eq!(cj.brand_name, "Other");
    assert_eq!(cj.sources.len(), 4, "missing sources fall back to defaults");
}

#[test]
fn invalid_configs_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.toml");

    fs::write(&p, r#"dedup = [ { rule = "near_text", threshold = 1.5 } ]"#).unwrap();
    assert!(load_from(&p).is_err());

    fs::write(&p, "brand_name = [1, 2").unwrap();
    assert!(load_from(&p).is_err());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    env::remove_var("PIPELINE_CONFIG_PATH");

    // 1) Nothing on disk: built-in defaults
    let cfg = load_default().unwrap();
    assert_eq!(cfg, PipelineConfig::default());

    // 2) Fallback TOML in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("pipeline.toml"), r#"brand_name = "FromToml""#).unwrap();
    assert_eq!(load_default().unwrap().brand_name, "FromToml");

    // 3) ENV wins
    let p_env = tmp.path().join("custom.json");
    fs::write(&p_env, r#"{"brand_name":"FromEnv"}"#).unwrap();
    env::set_var("PIPELINE_CONFIG_PATH", &p_env);
    assert_eq!(load_default().unwrap().brand_name, "FromEnv");

    // 4) ENV pointing nowhere is an error, not a silent fallback
    env::set_var("PIPELINE_CONFIG_PATH", tmp.path().join("missing.toml"));
    assert!(load_default().is_err());

    env::remove_var("PIPELINE_CONFIG_PATH");
    env::set_current_dir(old).unwrap();
}
