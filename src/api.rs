use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::crawl::scheduler::{BucketSummary, FrequencyScheduler};
use crate::crawl::{CrawlOrchestrator, ManualCrawlResult};
use crate::model::{CrawlFrequency, Source, SourceCrawl, SourceSpec};
use crate::store::ContentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub orchestrator: Arc<CrawlOrchestrator>,
    pub scheduler: Arc<FrequencyScheduler>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/crawl/frequency/{minutes}", post(trigger_frequency))
        .route("/crawl/source/{id}", post(trigger_source))
        .route("/sources", post(register_source))
        .route("/sources/{id}", get(source_status))
        .route("/debug/crawls", get(debug_crawls))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

/// Trigger one bucket run; returns the scheduler's aggregate verbatim. A
/// tick that overlaps a running one comes back as an all-zero summary.
async fn trigger_frequency(
    State(state): State<AppState>,
    Path(minutes): Path<u32>,
) -> Result<Json<BucketSummary>, ApiError> {
    let Some(frequency) = CrawlFrequency::from_minutes(minutes) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("unsupported crawl frequency: {minutes} minutes"),
        ));
    };
    Ok(Json(state.scheduler.run_bucket(frequency).await))
}

/// Ad-hoc re-crawl of one source, bypassing the bucket guard.
async fn trigger_source(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ManualCrawlResult>, ApiError> {
    let source = state.store.get_source(id).await.map_err(internal)?;
    let Some(source) = source else {
        return Err((StatusCode::NOT_FOUND, format!("unknown source: {id}")));
    };
    Ok(Json(state.orchestrator.crawl_source_manual(&source).await))
}

async fn register_source(
    State(state): State<AppState>,
    Json(spec): Json<SourceSpec>,
) -> Result<Json<Source>, ApiError> {
    let source = state
        .store
        .find_or_create_source(spec)
        .await
        .map_err(internal)?;
    Ok(Json(source))
}

#[derive(serde::Serialize)]
struct SourceStatus {
    #[serde(flatten)]
    source: Source,
    article_count: u64,
}

async fn source_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SourceStatus>, ApiError> {
    let source = state.store.get_source(id).await.map_err(internal)?;
    let Some(source) = source else {
        return Err((StatusCode::NOT_FOUND, format!("unknown source: {id}")));
    };
    let article_count = state
        .store
        .count_articles_for_source(source.org_id, source.id)
        .await
        .map_err(internal)?;
    Ok(Json(SourceStatus {
        source,
        article_count,
    }))
}

async fn debug_crawls(
    State(state): State<AppState>,
) -> Result<Json<Vec<SourceCrawl>>, ApiError> {
    let rows = state.store.recent_crawls(20).await.map_err(internal)?;
    Ok(Json(rows))
}
