use crate::metrics::AUTH_FAILURES_TOTAL;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use mongogate_core::Authenticator;
use std::sync::Arc;
use tracing::debug;

pub const CHALLENGE: &str = "Basic realm=\"mongogate\"";

/// Gate for every route. Nothing behind it runs unless the Basic
/// credentials match the configured pair.
pub async fn require_basic_auth(
    State(auth): State<Arc<Authenticator>>,
    req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if auth.verify(header) {
        return next.run(req).await;
    }
    AUTH_FAILURES_TOTAL.inc();
    debug!(method = %req.method(), path = %req.uri().path(), "rejected credentials");
    unauthorized()
}

pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, CHALLENGE)],
        "Unauthorized",
    )
        .into_response()
}
