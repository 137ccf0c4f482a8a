//! HTTP routes for the stats widget
//!
//! - `GET /stats/:username` serves a cached snapshot, fetching through on a miss
//! - `POST /save-stats` stores a snapshot supplied by the client
//! - `GET /proxy-api?username=` passes the upstream profile through uncached
//! - `GET /health` liveness probe
//!
//! Unmatched paths fall back to the public static directory.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::Username;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::resolver::{ResolveError, Resolver};
use crate::snapshot::Snapshot;
use crate::upstream::UpstreamError;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

/// Body of `POST /save-stats`
#[derive(Debug, Deserialize, Serialize)]
pub struct SaveStatsRequest {
    pub username: String,
    pub stats: Value,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub username: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Serves the stored snapshot for `username`, fetching it on a miss
pub async fn get_stats(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    let username = Username::parse(username)?;
    match state.resolver.resolve(&username).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(ResolveError::Upstream(UpstreamError::Status { status: 404, .. })) => {
            Err(ApiError::NotFound(username.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

/// Unconditionally stores the snapshot sent by the client
pub async fn save_stats(
    State(state): State<AppState>,
    Json(request): Json<SaveStatsRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = Username::parse(request.username)?;
    state
        .resolver
        .store()
        .write(&username, &Snapshot::new(request.stats))
        .await?;

    info!(%username, "saved stats from client");
    Ok(Json(json!({ "message": "Stats saved", "username": username })))
}

/// Returns the upstream profile without touching the store
pub async fn proxy_api(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Json<Snapshot>, ApiError> {
    let raw = query
        .username
        .ok_or(ApiError::MissingParameter("username"))?;
    let username = Username::parse(raw)?;
    let snapshot = state.resolver.source().fetch_profile(&username).await?;
    Ok(Json(snapshot))
}

fn build_cors(server: &ServerConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(server.allowed_origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the full application router
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let static_files = ServeDir::new(&server.public_dir);

    Router::new()
        .route("/health", get(health))
        .route("/stats/:username", get(get_stats))
        .route("/save-stats", post(save_stats))
        .route("/proxy-api", get(proxy_api))
        .with_state(state)
        .fallback_service(static_files)
        .layer(build_cors(server))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SnapshotStore;
    use crate::test_support::FakeSource;
    use axum::http::HeaderValue;
    use std::net::SocketAddr;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    struct TestServer {
        base_url: String,
        source: Arc<FakeSource>,
        store: Arc<SnapshotStore>,
        _temp_dir: TempDir,
    }

    impl TestServer {
        async fn start() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let public_dir = temp_dir.path().join("public");
            std::fs::create_dir(&public_dir).unwrap();
            std::fs::write(public_dir.join("index.html"), "<h1>widget</h1>").unwrap();

            let store = Arc::new(SnapshotStore::with_dir(temp_dir.path().join("stats")));
            let source = Arc::new(FakeSource::new());
            let resolver = Arc::new(Resolver::new(Arc::clone(&store), source.clone()));
            let server = ServerConfig {
                addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                allowed_origins: vec![HeaderValue::from_static("http://localhost:3000")],
                public_dir,
            };
            let app = build_router(AppState { resolver }, &server);

            let listener = TcpListener::bind(server.addr).await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            Self {
                base_url: format!("http://{}", addr),
                source,
                store,
                _temp_dir: temp_dir,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }
    }

    #[tokio::test]
    async fn test_stats_fetches_through_then_serves_cache() {
        let server = TestServer::start().await;
        server.source.respond("alice", json!({ "game_stats": { "elo": 1550 } }));

        for _ in 0..2 {
            let response = reqwest::get(server.url("/stats/alice")).await.unwrap();
            assert_eq!(response.status(), 200);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["game_stats"]["elo"], 1550);
        }
        assert_eq!(server.source.calls(), 1);
    }

    #[tokio::test]
    async fn test_stats_unknown_user_is_404() {
        let server = TestServer::start().await;

        let response = reqwest::get(server.url("/stats/nobody")).await.unwrap();

        assert_eq!(response.status(), 404);
        assert!(server.store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_upstream_failure_is_500() {
        let server = TestServer::start().await;
        server
            .source
            .fail("flaky", UpstreamError::Status { status: 503, message: "busy".into() });

        let response = reqwest::get(server.url("/stats/flaky")).await.unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_stats_invalid_username_is_400() {
        let server = TestServer::start().await;

        let response = reqwest::get(server.url("/stats/..%2Fsecret")).await.unwrap();

        assert_eq!(response.status(), 400);
        assert_eq!(server.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_save_stats_then_read_back() {
        let server = TestServer::start().await;
        let client = reqwest::Client::new();

        let response = client
            .post(server.url("/save-stats"))
            .json(&json!({ "username": "bob", "stats": { "cs_fields": { "kills": 7 } } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: Value = reqwest::get(server.url("/stats/bob")).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({ "cs_fields": { "kills": 7 } }));
        assert_eq!(server.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_save_stats_rejects_bad_username() {
        let server = TestServer::start().await;

        let response = reqwest::Client::new()
            .post(server.url("/save-stats"))
            .json(&json!({ "username": "../../etc", "stats": {} }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_proxy_api_passes_through_without_caching() {
        let server = TestServer::start().await;
        server.source.respond("carol", json!({ "v": 1 }));

        let response = reqwest::get(server.url("/proxy-api?username=carol")).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "v": 1 }));

        reqwest::get(server.url("/proxy-api?username=carol")).await.unwrap();
        assert_eq!(server.source.calls(), 2);
        assert!(!server.store.exists(&Username::parse("carol").unwrap()).await);
    }

    #[tokio::test]
    async fn test_proxy_api_errors() {
        let server = TestServer::start().await;

        let missing = reqwest::get(server.url("/proxy-api")).await.unwrap();
        assert_eq!(missing.status(), 400);

        let unknown = reqwest::get(server.url("/proxy-api?username=nobody")).await.unwrap();
        assert_eq!(unknown.status(), 500);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin_only() {
        let server = TestServer::start().await;
        let client = reqwest::Client::new();

        let allowed = client
            .get(server.url("/health"))
            .header("Origin", "http://localhost:3000")
            .send()
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let denied = client
            .get(server.url("/health"))
            .header("Origin", "http://evil.example")
            .send()
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_static_files_are_served_but_not_stats() {
        let server = TestServer::start().await;
        server
            .store
            .write(&Username::parse("dana").unwrap(), &Snapshot::new(json!({})))
            .await
            .unwrap();

        let index = reqwest::get(server.url("/index.html")).await.unwrap();
        assert_eq!(index.status(), 200);
        assert!(index.text().await.unwrap().contains("widget"));

        let private = reqwest::get(server.url("/stats/dana.json")).await.unwrap();
        assert_ne!(private.status(), 200);
    }
}
