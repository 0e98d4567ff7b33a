//! Request access log.
//!
//! One event per request with method, path, status, latency and user agent.
//! The level follows the status: `error` for 5xx, `warn` for 4xx, `info` otherwise.

use axum::{
    Router,
    extract::{Request, State},
    http::header::USER_AGENT,
    middleware::{self, Next},
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Paths excluded from the access log, such as health checks.
pub type SkipPaths = Arc<HashSet<String>>;

pub async fn access_log(State(skip): State<SkipPaths>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if skip.contains(&path) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if response.status().is_server_error() {
        tracing::error!(%method, path = %path, status, latency_ms, user_agent = %user_agent, "request");
    } else if response.status().is_client_error() {
        tracing::warn!(%method, path = %path, status, latency_ms, user_agent = %user_agent, "request");
    } else {
        tracing::info!(%method, path = %path, status, latency_ms, user_agent = %user_agent, "request");
    }
    response
}

/// Wrap `router` with [`access_log`].
pub fn with_access_log(router: Router, skip_paths: &[String]) -> Router {
    let skip: SkipPaths = Arc::new(skip_paths.iter().cloned().collect());
    router.layer(middleware::from_fn_with_state(skip, access_log))
}
