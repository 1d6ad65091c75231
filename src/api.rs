/// HTTP search boundary.
///
/// Thin routing and validation layer over the store: checks query parameters,
/// delegates to the full-text search, and maps failures to transport codes.
/// Internal error detail never reaches the client.
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as TokioMutex;
use tracing::error;

use crate::config::SearchConfig;
use crate::db::Db;
use crate::db::models::Message;

/// Shared state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<TokioMutex<Db>>,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Search query text
    q: Option<String>,
    /// Max number of results to return
    limit: Option<usize>,
    /// Number of results to skip
    offset: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub count: usize,
    pub results: Vec<Message>,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or out-of-bound query parameters.
    Validation(String),
    /// Any internal failure; the response carries a fixed generic message.
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(detail) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody { detail })).into_response()
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: "An internal error occurred, please try again later.".to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Check raw query parameters against the configured bounds.
fn validate_params(
    params: &SearchParams,
    cfg: &SearchConfig,
) -> Result<(String, usize, usize), ApiError> {
    let q = params.q.as_deref().unwrap_or("");
    if q.is_empty() {
        return Err(ApiError::Validation(
            "q must be a non-empty string".to_string(),
        ));
    }

    let limit = params.limit.unwrap_or(cfg.default_limit);
    if limit < 1 || limit > cfg.max_limit {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {}",
            cfg.max_limit
        )));
    }

    let offset = params.offset.unwrap_or(0);

    Ok((q.to_string(), limit, offset))
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let (q, limit, offset) = validate_params(&params, &state.search)?;

    let db = state.db.lock().await;
    let results = db.search_messages(&q, limit, offset).map_err(|e| {
        error!(error = %e, "search query failed");
        ApiError::Internal
    })?;

    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}

/// Stamp every response with its handling time.
async fn process_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;

    let elapsed = start.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.6}")) {
        response.headers_mut().insert("x-process-time", value);
    }
    response
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(search_handler))
        .layer(middleware::from_fn(process_time))
        .with_state(state)
}
