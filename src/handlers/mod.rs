pub mod links;
pub mod redirect;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::oplog::{LogLevel, LogPackage, LogStack};
use crate::AppState;

/// Map a service error onto an HTTP response with a JSON error body.
/// Every error kind keeps its own status so callers can tell them apart.
pub(crate) fn error_response(err: ServiceError) -> Response {
    let (status, message) = match &err {
        ServiceError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ServiceError::CodeTaken(_) => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::CodeSpaceExhausted => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        ServiceError::NotFound => (StatusCode::NOT_FOUND, "short url not found".into()),
        ServiceError::Expired => (StatusCode::GONE, "short url expired".into()),
        ServiceError::StorageUnavailable(source) => {
            tracing::error!("storage failure: {:?}", source);
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable".into())
        }
    };

    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Report every inbound request to the operator log. Best-effort: the emit
/// never blocks or fails, so this adds nothing to request latency.
pub async fn request_oplog(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let ip = client_ip(request.headers());
    let user_agent = header_str(request.headers(), "user-agent");

    state.oplog.emit(
        LogStack::Backend,
        LogLevel::Info,
        LogPackage::Middleware,
        format!("HTTP {method} {uri}"),
        serde_json::json!({
            "method": method.as_str(),
            "url": uri.to_string(),
            "ip": ip,
            "userAgent": user_agent.unwrap_or_default(),
        }),
    );

    next.run(request).await
}

/// Determine the real client IP from proxy headers, if any.
/// X-Forwarded-For can be a comma-separated list; take the first entry.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = xff.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_owned());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return Some(real_ip.to_owned());
        }
    }

    None
}

pub(crate) fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}
