//! HTTP request handlers

use super::types::{ActionRequest, ActionResponse, ErrorResponse, HealthResponse};
use super::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the dispatcher shared secret
pub const TOKEN_HEADER: &str = "x-dispatcher-token";

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Inbound actions from the transport adapter
        .route("/api/actions", post(post_action))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Actions
// ============================================================

async fn post_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    if let Some(expected) = &state.dispatcher_token {
        let presented = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(AppError::Unauthorized);
        }
    }

    let action = req
        .parse_action()
        .ok_or_else(|| AppError::BadRequest("Either `action` or `callback` is required".to_string()))?
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user_id = req.user_id.into_string();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("`user_id` must not be empty".to_string()));
    }

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("dispatch", %request_id, user_id = %user_id);
    let replies = state
        .dispatcher
        .dispatch(&user_id, action)
        .instrument(span)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ActionResponse { replies }))
}

// ============================================================
// Health & Version
// ============================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_version() -> &'static str {
    concat!("storefront-bot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid dispatcher token".to_string(),
            ),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Dispatch failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
