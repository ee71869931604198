//! Usage, duplicate, and cleanup handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::services::{
    AggregateProgress, AggregateView, Classification, CredentialService, DeleteReport,
    DuplicateGroup,
};

/// Query parameters for the usage endpoint.
#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    /// Re-fetch instead of serving the cached view (default: true)
    #[serde(default = "default_refresh")]
    pub refresh: bool,
}

fn default_refresh() -> bool {
    true
}

/// Aggregate view plus its classification.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    #[serde(flatten)]
    pub view: AggregateView,
    pub classification: Classification,
    /// Whether the view came from the cache
    pub cached: bool,
}

/// Response for the duplicate scan.
#[derive(Debug, Serialize)]
pub struct DuplicatesResponse {
    pub groups: Vec<DuplicateGroup>,
    /// Keys that a resolve would delete
    pub redundant: usize,
}

/// Response for cleanup of exhausted and invalid keys.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    #[serde(flatten)]
    pub report: DeleteReport,
    pub exhausted: usize,
    pub invalid: usize,
}

/// Aggregate usage across all keys.
///
/// `GET /api/usage?refresh=false` serves the cached view when there is one.
pub async fn get_usage(
    State(service): State<CredentialService>,
    Query(query): Query<UsageQuery>,
) -> AppResult<Json<UsageResponse>> {
    let cached = if query.refresh {
        None
    } else {
        service.cached_aggregate().await
    };

    let (view, cached) = match cached {
        Some(view) => (view, true),
        None => (service.aggregate().await?, false),
    };

    Ok(Json(UsageResponse {
        classification: view.classify(),
        view,
        cached,
    }))
}

/// Progress of the running (or last) aggregation.
///
/// `GET /api/usage/progress`
pub async fn progress(State(service): State<CredentialService>) -> Json<AggregateProgress> {
    Json(service.aggregator().progress())
}

/// List groups of keys stored more than once.
///
/// `GET /api/duplicates`
pub async fn duplicates(
    State(service): State<CredentialService>,
) -> AppResult<Json<DuplicatesResponse>> {
    let groups = service.find_duplicates().await?;
    let redundant = groups.iter().map(|g| g.count - 1).sum();
    Ok(Json(DuplicatesResponse { groups, redundant }))
}

/// Keep the earliest key of each duplicate group, delete the rest.
///
/// `POST /api/duplicates/resolve`
pub async fn resolve_duplicates(
    State(service): State<CredentialService>,
) -> AppResult<Json<DeleteReport>> {
    let groups = service.find_duplicates().await?;
    Ok(Json(service.resolve_duplicates(&groups).await))
}

/// Delete exhausted and unreachable keys.
///
/// `POST /api/cleanup`
///
/// Uses the cached view when present, otherwise aggregates first.
pub async fn cleanup(State(service): State<CredentialService>) -> AppResult<Json<CleanupResponse>> {
    let view = match service.cached_aggregate().await {
        Some(view) => view,
        None => service.aggregate().await?,
    };

    let classification = view.classify();
    let report = service.cleanup_invalid_and_zero(&view).await;

    Ok(Json(CleanupResponse {
        report,
        exhausted: classification.exhausted.len(),
        invalid: classification.invalid.len(),
    }))
}
