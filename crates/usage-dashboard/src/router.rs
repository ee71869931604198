//! Route table.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_admin;
use crate::handlers;
use crate::state::AppState;

/// Build the application router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health))
        .with_state(state.clone());

    // Key management routes
    let key_routes = Router::new()
        .route(
            "/api/keys",
            get(handlers::credentials::list).post(handlers::credentials::create),
        )
        .route("/api/keys/import", post(handlers::credentials::import))
        .route(
            "/api/keys/batch-delete",
            post(handlers::credentials::batch_delete),
        )
        .route("/api/keys/export", get(handlers::credentials::export))
        .route(
            "/api/keys/{id}",
            get(handlers::credentials::get).delete(handlers::credentials::delete),
        )
        .route("/api/keys/{id}/reveal", get(handlers::credentials::reveal))
        .route("/api/keys/{id}/note", put(handlers::credentials::update_note))
        .with_state(state.credentials.clone());

    // Usage, duplicate, and cleanup routes
    let usage_routes = Router::new()
        .route("/api/usage", get(handlers::usage::get_usage))
        .route("/api/usage/progress", get(handlers::usage::progress))
        .route("/api/duplicates", get(handlers::usage::duplicates))
        .route(
            "/api/duplicates/resolve",
            post(handlers::usage::resolve_duplicates),
        )
        .route("/api/cleanup", post(handlers::usage::cleanup))
        .with_state(state.credentials.clone());

    // Auto-refresh routes
    let refresh_routes = Router::new()
        .route("/api/refresh/status", get(handlers::refresh::status))
        .route("/api/refresh/start", post(handlers::refresh::start))
        .route("/api/refresh/stop", post(handlers::refresh::stop))
        .route("/api/refresh/reset", post(handlers::refresh::reset))
        .with_state(state.clone());

    let protected = Router::new()
        .merge(key_routes)
        .merge(usage_routes)
        .merge(refresh_routes)
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .merge(health_routes)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::scheduler::RefreshScheduler;
    use crate::services::aggregator::tests::{credential, FakeSource};
    use crate::services::{Aggregator, CredentialService};
    use crate::store::{CredentialStore, MemoryStore};
    use crate::usage::FetchError;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with_store(config: AppConfig) -> (Router, MemoryStore) {
        let source = FakeSource::new()
            .with_usage("fk-key-a-000000", 1000, 400)
            .with_usage("fk-key-b-000000", 500, 500)
            .with_error("fk-key-c-000000", FetchError::Status(401));
        let store = MemoryStore::new();
        let service = CredentialService::new(
            Arc::new(store.clone()),
            Aggregator::new(Arc::new(source), config.fetch_concurrency()),
        );
        let scheduler = Arc::new(RefreshScheduler::new(
            service.clone(),
            Duration::from_secs(60),
        ));
        let router = build_router(AppState::new(service, scheduler, config, None));
        (router, store)
    }

    fn app(config: AppConfig) -> Router {
        app_with_store(config).0
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_usage_without_keys_is_not_found() {
        let app = app(AppConfig::default());
        let (status, body) = send(&app, "GET", "/api/usage", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no credentials found, import keys first");
    }

    #[tokio::test]
    async fn test_import_then_aggregate_and_cleanup() {
        let app = app(AppConfig::default());

        let (status, body) = send(
            &app,
            "POST",
            "/api/keys/import",
            Some(json!({"text": "fk-key-a-000000\nfk-key-b-000000\n\nfk-key-c-000000\nfk-key-a-000000"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], 3);
        assert_eq!(body["duplicates"], 1);

        let (status, body) = send(&app, "GET", "/api/usage", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_allowance"], 1500);
        assert_eq!(body["total_used"], 900);
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["cached"], false);
        assert_eq!(body["snapshots"][2]["error"], "401");
        assert_eq!(body["classification"]["valid"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "GET", "/api/usage?refresh=false", None).await;
        assert_eq!(body["cached"], true);

        let (status, body) = send(&app, "POST", "/api/cleanup", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 2);
        assert_eq!(body["exhausted"], 1);
        assert_eq!(body["invalid"], 1);

        let (_, body) = send(&app, "GET", "/api/keys", None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["masked_key"], "fk-k...0000");
        assert!(body["items"][0].get("key").is_none());
    }

    #[tokio::test]
    async fn test_key_lifecycle() {
        let app = app(AppConfig::default());

        let (status, created) = send(
            &app,
            "POST",
            "/api/keys",
            Some(json!({"key": "fk-single-key-42", "name": "ci"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "POST", "/api/keys", Some(json!({"key": "fk-single-key-42"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, noted) = send(
            &app,
            "PUT",
            &format!("/api/keys/{}/note", id),
            Some(json!({"note": "shared with staging"})),
        )
        .await;
        assert_eq!(noted["note"], "shared with staging");

        let (_, revealed) = send(&app, "GET", &format!("/api/keys/{}/reveal", id), None).await;
        assert_eq!(revealed["key"], "fk-single-key-42");

        let (status, _) = send(&app, "DELETE", &format!("/api/keys/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", &format!("/api/keys/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicates_endpoints() {
        let (app, store) = app_with_store(AppConfig::default());
        for (id, key, created_at) in [
            ("D", "fk-shared-key-1234", 1),
            ("X", "fk-other-key-5678", 2),
            ("E", "fk-shared-key-1234", 3),
        ] {
            store
                .put(credential(id, key, created_at))
                .await
                .unwrap();
        }

        let (_, body) = send(&app, "GET", "/api/duplicates", None).await;
        assert_eq!(body["redundant"], 1);
        assert_eq!(body["groups"][0]["ids"], json!(["D", "E"]));
        assert_eq!(body["groups"][0]["masked_key"], "fk-s...1234");

        let (status, body) = send(&app, "POST", "/api/duplicates/resolve", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["D", "X"]);
    }

    #[tokio::test]
    async fn test_batch_delete_requires_ids() {
        let app = app(AppConfig::default());
        let (status, _) = send(&app, "POST", "/api/keys/batch-delete", Some(json!({"ids": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/keys/batch-delete",
            Some(json!({"ids": ["missing"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 0);
        assert_eq!(body["failed_ids"], json!([]));
    }

    #[tokio::test]
    async fn test_admin_password_gate() {
        let config = AppConfig {
            admin_password: Some("hunter2".to_string()),
            ..AppConfig::default()
        };
        let app = app(config);

        let (status, _) = send(&app, "GET", "/api/keys", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .uri("/api/keys")
            .header("authorization", "Bearer hunter2")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/api/keys")
            .header("x-admin-password", "wrong")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_controls() {
        let app = app(AppConfig::default());

        let (_, body) = send(&app, "POST", "/api/refresh/start", None).await;
        assert_eq!(body["running"], true);
        assert_eq!(body["interval_secs"], 60);

        let (_, body) = send(&app, "POST", "/api/refresh/stop", None).await;
        assert_eq!(body["running"], false);
        assert!(body.get("next_refresh_in_secs").is_none());
    }
}
