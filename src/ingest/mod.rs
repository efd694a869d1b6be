// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::MentionCollector;
use crate::types::RawMention;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::time::Duration;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total rows produced by collectors.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Collector fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Outcome of one collection round.
#[derive(Debug, Default)]
pub struct Collected {
    pub records: Vec<RawMention>,
    /// Names of collectors that failed.
    pub failed: Vec<String>,
}

/// Run collectors one after another, pausing `courtesy_delay` between them.
/// Failures are logged and counted; the remaining collectors still run.
pub async fn collect_all(
    collectors: &[Box<dyn MentionCollector>],
    courtesy_delay: Duration,
) -> Collected {
    ensure_metrics_described();

    let mut out = Collected::default();
    for (i, c) in collectors.iter().enumerate() {
        if i > 0 && !courtesy_delay.is_zero() {
            tokio::time::sleep(courtesy_delay).await;
        }
        match c.fetch().await {
            Ok(mut v) => {
                tracing::info!(target: "ingest", collector = c.name(), rows = v.len(), "collected");
                out.records.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, collector = c.name(), "collector error");
                counter!("ingest_provider_errors_total").increment(1);
                out.failed.push(c.name().to_string());
            }
        }
    }
    out
}
