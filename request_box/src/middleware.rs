//! HTTP middleware: body size limits, CORS and error-response logging.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::warn;

use crate::settings::HttpConfig;

/// Create CORS layer from HTTP configuration
pub fn create_cors_layer(config: &HttpConfig) -> CorsLayer {
    if !config.enable_cors {
        return CorsLayer::new();
    }

    // Captures accept any method, so preflights must too.
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create request body size limit layer
pub fn create_body_limit_layer(max_bytes: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(max_bytes)
}

/// Log client and server error responses
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    if response.status().is_client_error() || response.status().is_server_error() {
        warn!("Error response: {} {} - Status: {}", method, uri, response.status());
    }

    response
}
