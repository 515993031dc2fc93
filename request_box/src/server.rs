//! HTTP server exposing token management and request capture endpoints.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, OriginalUri, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use serde::{Deserialize, Serialize};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::{net::TcpListener, sync::Notify};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::CaptureError,
    metrics::Metrics,
    middleware::{create_body_limit_layer, create_cors_layer, error_logging_middleware},
    registry::TokenRegistry,
    request::{CapturedRequest, HeaderMultimap, IncomingRequest, RequestBody},
    service::CaptureService,
    settings::Settings,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: CaptureService,
    pub metrics: Metrics,
    pub settings: Arc<Settings>,
    started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        let registry = Arc::new(TokenRegistry::with_capacity(settings.inbox.capacity));
        Ok(Self {
            service: CaptureService::new(registry),
            metrics: Metrics::new()?,
            settings: Arc::new(settings),
            started_at: Instant::now(),
        })
    }

    fn registry(&self) -> &TokenRegistry {
        self.service.registry()
    }

    /// Drop the token's gauge if it was deleted while a capture or clear
    /// was updating it. Must run after the gauge update.
    fn retire_gauge_if_deleted(&self, token: &str) {
        if !self.registry().contains(token) {
            self.metrics.token_deleted(token);
        }
    }
}

/// Token resolution on capture and read endpoints reports an empty token
/// as not found; only `/DeleteToken` distinguishes it.
fn unknown_token(error: CaptureError) -> ApiError {
    match error {
        CaptureError::EmptyToken => ApiError::Capture(CaptureError::not_found("")),
        other => ApiError::Capture(other),
    }
}

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to unmarshal JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Capture(CaptureError::EmptyToken) => StatusCode::BAD_REQUEST,
            ApiError::Capture(CaptureError::TokenNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Capture(CaptureError::IdentitySourceExhausted) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// `?token=` query parameter; missing is treated as empty.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Live tokens, serialized under the `users` key existing clients read.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenList {
    #[serde(rename = "users")]
    pub tokens: Vec<TokenResponse>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    token_count: usize,
}

/// Create the HTTP router with all endpoints and middleware
pub fn create_router(state: AppState) -> Router {
    let cors_layer = create_cors_layer(&state.settings.http);
    let body_limit_layer = create_body_limit_layer(state.settings.max_body_bytes());

    Router::new()
        .route("/CreateToken", any(create_token))
        .route("/DeleteToken", any(delete_token))
        .route("/ListToken", any(list_tokens))
        .route("/PostRequest", any(capture_request))
        .route("/GetRequest", any(recent_requests))
        .route("/CleanRequest", any(clear_requests))
        .route("/metrics", get(metrics))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(middleware::from_fn(error_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .layer(DefaultBodyLimit::disable())
        .layer(body_limit_layer)
}

#[instrument(skip(state))]
async fn create_token(State(state): State<AppState>) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.registry().create()?;
    state.metrics.token_created(&token);

    info!(
        "Token created: {} (live tokens: {})",
        token,
        state.registry().len()
    );
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
async fn delete_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    state.registry().delete(&query.token)?;
    state.metrics.token_deleted(&query.token);

    info!(
        "Token deleted: {} (live tokens: {})",
        query.token,
        state.registry().len()
    );
    Ok(Json(TokenResponse { token: query.token }))
}

#[instrument(skip(state))]
async fn list_tokens(State(state): State<AppState>) -> Json<TokenList> {
    let tokens = state
        .registry()
        .list_tokens()
        .into_iter()
        .map(|token| TokenResponse { token })
        .collect();
    Json(TokenList { tokens })
}

/// Capture any method on `/PostRequest?token=...`.
#[instrument(skip_all)]
async fn capture_request(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let body = RequestBody::decode(content_type, &body)?;

    let incoming = IncomingRequest {
        method: method.as_str().to_string(),
        url: uri.to_string(),
        headers: header_multimap(&headers),
        body,
    };

    let captured = state
        .service
        .capture(&query.token, incoming)
        .map_err(unknown_token)?;
    state.metrics.request_captured(&query.token);
    state.retire_gauge_if_deleted(&query.token);
    log_capture(&query.token, &captured);

    Ok(StatusCode::OK)
}

#[instrument(skip(state))]
async fn recent_requests(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<CapturedRequest>>, ApiError> {
    let recent = state.service.recent(&query.token).map_err(unknown_token)?;
    Ok(Json(recent))
}

#[instrument(skip(state))]
async fn clear_requests(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    state
        .service
        .clear_token(&query.token)
        .map_err(unknown_token)?;
    state.metrics.token_cleared(&query.token);
    state.retire_gauge_if_deleted(&query.token);

    info!("Inbox cleared for token {}", query.token);
    Ok(Json(TokenResponse { token: query.token }))
}

/// Prometheus text exposition
#[instrument(skip(state))]
async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    if !state.settings.observability.enable_metrics {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    match state.metrics.render()? {
        Some(text) => Ok((
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

#[instrument(skip(state))]
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        token_count: state.registry().len(),
    })
}

fn header_multimap(headers: &HeaderMap) -> HeaderMultimap {
    let mut multimap = HeaderMultimap::new();
    for (name, value) in headers {
        multimap
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    multimap
}

fn log_capture(token: &str, captured: &CapturedRequest) {
    match serde_json::to_string(captured) {
        Ok(json) => debug!("Request caught for token {}: {}", token, json),
        Err(e) => warn!("Failed to serialize captured request for logging: {}", e),
    }
}

/// Start the HTTP server and wait for shutdown signal
///
/// Once a signal arrives, in-flight requests get `server.shutdown_grace_seconds`
/// to finish before they are dropped.
pub async fn serve(settings: Settings) -> Result<()> {
    let addr = settings.listen_addr()?;
    let grace = Duration::from_secs(settings.server.shutdown_grace_seconds);
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    let signalled = Arc::new(Notify::new());
    let trigger = signalled.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown().await;
            trigger.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        _ = signalled.notified() => match tokio::time::timeout(grace, &mut server).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "In-flight requests still running after {}s, shutting down anyway",
                    grace.as_secs()
                );
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        error!("HTTP server error: {}", e);
        return Err(e.into());
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or, on unix, SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_multimap_keeps_repeats_in_order() {
        let mut headers = HeaderMap::new();
        headers.append("x-trace", HeaderValue::from_static("one"));
        headers.append("x-trace", HeaderValue::from_static("two"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        let multimap = header_multimap(&headers);
        assert_eq!(multimap["x-trace"], vec!["one", "two"]);
        assert_eq!(multimap["accept"], vec!["*/*"]);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ApiError::from(CaptureError::EmptyToken), StatusCode::BAD_REQUEST),
            (ApiError::from(CaptureError::not_found("t")), StatusCode::NOT_FOUND),
            (
                ApiError::from(CaptureError::IdentitySourceExhausted),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_unresolvable_tokens_map_to_not_found() {
        for error in [CaptureError::EmptyToken, CaptureError::not_found("gone")] {
            assert_eq!(unknown_token(error).into_response().status(), StatusCode::NOT_FOUND);
        }
        assert_eq!(
            unknown_token(CaptureError::IdentitySourceExhausted)
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
