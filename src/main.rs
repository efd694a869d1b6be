//! Brand Perception Monitor: server entrypoint.
//! Serves the canonical dataset produced by `mention-pipeline run`.

use brand_sentiment_monitor::api::{self, AppState, DatasetHandle};
use brand_sentiment_monitor::config;
use brand_sentiment_monitor::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_BRAND_NAME: &str = "BRAND_NAME";
const ENV_PROCESSED_DATA_FILE: &str = "PROCESSED_DATA_FILE";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("api=info,store=info,warn"));

    // Shuttle may have installed a subscriber already.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut cfg = config::load_default()?;
    if let Ok(brand) = std::env::var(ENV_BRAND_NAME) {
        cfg = cfg.with_brand(brand);
    }
    let data_path = std::env::var(ENV_PROCESSED_DATA_FILE)
        .map(PathBuf::from)
        .unwrap_or_else(|_| cfg.output.combined_path());

    let dataset = DatasetHandle::load(&data_path);
    tracing::info!(
        target: "api",
        brand = %cfg.brand_name,
        path = %data_path.display(),
        records = dataset.len(),
        "dataset ready"
    );

    let mut router = api::router(AppState::new(dataset.clone(), cfg.brand_name));
    match Metrics::init(dataset.len()) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(target: "api", error = ?e, "metrics endpoint disabled"),
    }

    Ok(router.into())
}
