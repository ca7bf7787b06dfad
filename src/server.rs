use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::analyze::analyze;
use crate::inference::InferenceClient;
use crate::models::{AnalyzeRequest, ErrorBody, RequestError};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn InferenceClient>,
}

pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    let routes = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/analyze", post(analyze_endpoint))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state);
    with_middleware(routes)
}

/// CORS stays outermost so panic-generated 500s still carry its headers.
fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Internal(String),
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge("Image payload is too large".to_string())
        } else {
            ApiError::BadRequest(e.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorBody {
            detail: self.to_string(),
            error: error.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "inference_configured": state.client.is_configured(),
    }))
}

async fn analyze_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let image = req.image_input()?;
    let limits = req.limits()?;

    tracing::info!(
        mime_type = %image.mime_type,
        title_limit = limits.title,
        description_limit = limits.description,
        tags_limit = limits.tags,
        "analysis requested"
    );

    let result = analyze(state.client.as_ref(), &image, &limits)
        .await
        .into_result();
    Ok((StatusCode::OK, Json(result)).into_response())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(%detail, "request handler panicked");

    let mut response = ApiError::Internal(format!("Internal server error: {}", detail)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}
