use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use std::{net::SocketAddr, sync::Arc};

use crate::handlers::{client_ip, error_response, header_str};
use crate::models::ClickContext;
use crate::oplog::{LogLevel, LogPackage, LogStack};
use crate::AppState;

/// GET /:code
///
/// Resolve the short code and answer with a 307 to the original URL. The
/// click (IP, user agent, referrer, geo country) is recorded as part of
/// resolution; a failed click write never fails the redirect.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ctx = ClickContext {
        ip: client_ip(&headers).or_else(|| Some(addr.ip().to_string())),
        user_agent: header_str(&headers, "user-agent"),
        referrer: header_str(&headers, "referer"),
    };

    match state.service.resolve(&code, ctx).await {
        Ok(original_url) => {
            state.oplog.emit(
                LogStack::Backend,
                LogLevel::Info,
                LogPackage::Route,
                format!("redirect {code} -> {original_url}"),
                serde_json::json!({ "shortCode": code }),
            );
            Redirect::temporary(&original_url).into_response()
        }
        Err(err) => error_response(err),
    }
}
