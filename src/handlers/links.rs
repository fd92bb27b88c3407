use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::error_response;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub validity: Option<i64>,
    #[serde(default)]
    pub shortcode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    #[serde(rename = "shortLink")]
    pub short_link: String,
    pub expiry: String,
}

/// POST /shorturls
///
/// Allocate a short code for the submitted URL, honoring an optional custom
/// code and validity (minutes, default 30).
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequest>,
) -> Response {
    let url = body.url.unwrap_or_default();

    match state
        .service
        .create(&url, body.validity, body.shortcode.as_deref())
        .await
    {
        Ok(created) => {
            let response = CreateResponse {
                short_link: format!("{}/{}", state.config.base_url, created.short_code),
                expiry: created.expiry_at.to_rfc3339(),
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// GET /shorturls/:code
///
/// Full stats for one link: target, timestamps, and the click history.
/// Remains available after the link has expired.
pub async fn stats(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    match state.service.stats(&code).await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => error_response(err),
    }
}
