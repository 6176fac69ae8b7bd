//! HTTP surface: routing, shared state, auth gate, liveness
//!
//! The auth middleware wraps only the `/api/v1` routes and runs before any
//! body handling, so an auth failure always wins over a malformed or
//! oversized body.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum::ServiceExt as AxumServiceExt;
use serde_json::json;
use tokio::signal;
use tower::{
    util::{MapRequest, MapRequestLayer},
    Layer,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{self, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::download::RemoteFetcher;
use crate::error::Error;
use crate::removal::{BackgroundRemover, MattingRemover};
use crate::storage::{ObjectStorage, S3Storage};

mod remove_bg;

const X_API_KEY: &str = "X-API-Key";

/// Read-only state shared by all requests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn ObjectStorage>,
    pub remover: Arc<dyn BackgroundRemover>,
    pub fetcher: RemoteFetcher,
}

impl AppState {
    /// Wire up the production collaborators from the configuration.
    ///
    /// # Errors
    /// Fails when the storage client or HTTP client cannot be constructed.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let storage = Arc::new(S3Storage::new(&config)?);
        let remover = Arc::new(MattingRemover::new(config.max_concurrent_removals));
        let fetcher = RemoteFetcher::new()?;
        Ok(Self {
            config: Arc::new(config),
            storage,
            remover,
            fetcher,
        })
    }
}

/// Compare two byte strings without early exit on the first mismatch
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

async fn auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(X_API_KEY)
        .and_then(|header| header.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.trim().as_bytes(), state.config.api_key.as_bytes()) => {
            next.run(req).await
        },
        _ => Error::Auth.into_response(),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Background Removal API",
        "health": "/health",
        "endpoints": {
            "remove_bg_binary": "POST /api/v1/remove-bg/binary",
            "remove_bg_url": "POST /api/v1/remove-bg/url",
        },
    }))
}

/// Collapse repeated slashes so `//api/v1/...` matches `/api/v1/...`
fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        collapsed.push('/');
        collapsed.push_str(segment);
    }
    if collapsed.is_empty() {
        collapsed.push('/');
    }
    collapsed
}

fn normalize_path(mut req: Request) -> Request {
    if req.uri().path().contains("//") {
        let collapsed = collapse_slashes(req.uri().path());
        let rewritten = match req.uri().query() {
            Some(query) => format!("{collapsed}?{query}"),
            None => collapsed,
        };
        if let Ok(uri) = rewritten.parse() {
            *req.uri_mut() = uri;
        }
    }
    req
}

/// The routed service with path normalization applied outside the router
pub type AppService = MapRequest<Router, fn(Request) -> Request>;

/// Build the service over the given state.
///
/// The URI rewrite wraps the router rather than being a router layer:
/// `Router::layer` middleware runs after route matching, so a rewrite there
/// could never affect which route is hit.
pub fn router(state: AppState) -> AppService {
    let protected = Router::new()
        .route(
            "/api/v1/remove-bg/binary",
            post(remove_bg::remove_bg_binary)
                // The handler enforces the 10 MiB ceiling while streaming the
                // multipart field, so the framework-level limit is lifted.
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/api/v1/remove-bg/url", post(remove_bg::remove_bg_url))
        .layer(middleware::from_fn_with_state(state.clone(), auth));

    let router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer((
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
            TimeoutLayer::new(Duration::from_secs(120)),
            CatchPanicLayer::new(),
            CorsLayer::permissive(),
        ));

    MapRequestLayer::new(normalize_path as fn(Request) -> Request).layer(router)
}

/// Bind and serve until SIGINT/SIGTERM
pub async fn serve(service: AppService, listen: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, service.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_collapse_slashes() {
        assert_eq!(collapse_slashes("//api/v1//remove-bg"), "/api/v1/remove-bg");
        assert_eq!(collapse_slashes("/health"), "/health");
        assert_eq!(collapse_slashes("//"), "/");
    }

    #[test]
    fn test_normalize_path_rewrites_uri_before_routing() {
        let req = Request::builder()
            .uri("/api/v1//remove-bg/url?x=1")
            .body(axum::body::Body::empty())
            .unwrap();
        let req = normalize_path(req);
        assert_eq!(req.uri(), "/api/v1/remove-bg/url?x=1");

        let req = Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap();
        let req = normalize_path(req);
        assert_eq!(req.uri(), "/health");
    }
}
