// src/api.rs
//! Read-only HTTP surface over the canonical dataset.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Deserialize;
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::{
    filter_mentions, in_window, platform_stats, summarize, timeline, top_mentions, GroupBy,
    MentionFilter, PlatformStats, Summary, TimelinePoint, TopMentions, DEFAULT_DAYS,
    DEFAULT_TOP_LIMIT,
};
use crate::store;
use crate::types::{CanonicalMention, Sentiment};

/// Shared, reloadable dataset. Clones share the same records.
#[derive(Clone, Default)]
pub struct DatasetHandle {
    path: Option<PathBuf>,
    records: Arc<RwLock<Vec<CanonicalMention>>>,
}

impl DatasetHandle {
    pub fn from_records(records: Vec<CanonicalMention>) -> Self {
        gauge!("api_dataset_records").set(records.len() as f64);
        Self {
            path: None,
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Load from `path`. A missing or unreadable file serves an empty dataset
    /// until the next successful reload.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match read_dataset(&path) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "api", path = %path.display(), error = ?e, "dataset not loaded, serving empty");
                Vec::new()
            }
        };
        gauge!("api_dataset_records").set(records.len() as f64);
        Self {
            path: Some(path),
            records: Arc::new(RwLock::new(records)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the backing file; on error the current records stay.
    pub fn reload(&self) -> Result<usize> {
        let path = self
            .path
            .as_ref()
            .context("dataset has no backing file")?;
        let fresh = read_dataset(path)?;
        let n = fresh.len();
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
        gauge!("api_dataset_records").set(n as f64);
        tracing::info!(target: "api", path = %path.display(), records = n, "dataset reloaded");
        Ok(n)
    }

    /// Run `f` over the current records.
    pub fn with_records<R>(&self, f: impl FnOnce(&[CanonicalMention]) -> R) -> R {
        let guard = self.records.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    pub fn len(&self) -> usize {
        self.with_records(|r| r.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_dataset(path: &Path) -> Result<Vec<CanonicalMention>> {
    let (records, _) = store::load_canonical(path)?;
    Ok(records)
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub dataset: DatasetHandle,
    brand: String,
    clock: Clock,
}

impl AppState {
    pub fn new(dataset: DatasetHandle, brand: impl Into<String>) -> Self {
        Self {
            dataset,
            brand: brand.into(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Freeze "now" (window filters are relative to it).
    pub fn with_fixed_now(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Arc::new(move || now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
        .route("/mentions", get(mentions))
        .route("/summary", get(summary))
        .route("/top", get(top))
        .route("/timeline", get(timeline_handler))
        .route("/platforms", get(platforms))
        .route("/admin/reload", post(admin_reload))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "detail": self.1 }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct WindowQuery {
    days: Option<i64>,
}

impl WindowQuery {
    fn days(&self) -> i64 {
        self.days.unwrap_or(DEFAULT_DAYS)
    }
}

#[derive(Debug, Default, Deserialize)]
struct MentionsQuery {
    days: Option<i64>,
    platform: Option<String>,
    sentiment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TopQuery {
    days: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TimelineQuery {
    days: Option<i64>,
    group_by: Option<String>,
}

async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ep = |path: &str, method: &str, description: &str| {
        json!({ "path": path, "method": method, "description": description })
    };
    Json(json!({
        "name": format!("{} Brand Perception Monitor", state.brand),
        "version": env!("CARGO_PKG_VERSION"),
        "records": state.dataset.len(),
        "endpoints": [
            ep("/mentions", "GET", "Mentions in the window, filterable by platform and sentiment"),
            ep("/summary", "GET", "Sentiment counts and average compound"),
            ep("/top", "GET", "Strongest positive and negative mentions"),
            ep("/timeline", "GET", "Sentiment counts per day or week"),
            ep("/platforms", "GET", "Mention counts per platform"),
        ],
    }))
}

async fn mentions(
    State(state): State<AppState>,
    Query(q): Query<MentionsQuery>,
) -> Result<Json<Vec<CanonicalMention>>, ApiError> {
    let sentiment = match q.sentiment.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<Sentiment>()
                .map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.to_string()))?,
        ),
        None => None,
    };
    let filter = MentionFilter {
        days: q.days,
        platform: q.platform.filter(|p| !p.trim().is_empty()),
        sentiment,
    };
    let now = state.now();
    let out = state.dataset.with_records(|records| {
        filter_mentions(records, &filter, now)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
    });
    Ok(Json(out))
}

async fn summary(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Json<Summary> {
    let now = state.now();
    Json(
        state
            .dataset
            .with_records(|records| summarize(in_window(records, now, q.days()))),
    )
}

async fn top(State(state): State<AppState>, Query(q): Query<TopQuery>) -> Json<TopMentions> {
    let now = state.now();
    let limit = q.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    let days = q.days.unwrap_or(DEFAULT_DAYS);
    Json(
        state
            .dataset
            .with_records(|records| top_mentions(&in_window(records, now, days), limit)),
    )
}

async fn timeline_handler(
    State(state): State<AppState>,
    Query(q): Query<TimelineQuery>,
) -> Json<Vec<TimelinePoint>> {
    let now = state.now();
    let group_by = q.group_by.as_deref().map(GroupBy::parse).unwrap_or_default();
    let days = q.days.unwrap_or(DEFAULT_DAYS);
    Json(
        state
            .dataset
            .with_records(|records| timeline(&in_window(records, now, days), group_by)),
    )
}

async fn platforms(
    State(state): State<AppState>,
    Query(q): Query<WindowQuery>,
) -> Json<Vec<PlatformStats>> {
    let now = state.now();
    Json(
        state
            .dataset
            .with_records(|records| platform_stats(&in_window(records, now, q.days()))),
    )
}

async fn admin_reload(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.dataset.reload() {
        Ok(n) => Ok(Json(json!({ "reloaded": n }))),
        Err(e) => {
            tracing::warn!(target: "api", error = ?e, "dataset reload failed");
            Err(ApiError(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{e:#}"),
            ))
        }
    }
}
