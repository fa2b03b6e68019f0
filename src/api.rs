// Snapshot Station - Query API
// Axum routes over the query service

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tower_http::cors::CorsLayer;

use crate::query::{QueryError, QueryService};

/// Error payload for 400/500 responses.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = if self.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// GET /health - liveness check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /snapshots?start=..&end=.. - valid snapshots in range
async fn get_snapshots(
    State(query): State<QueryService>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match query.valid_snapshots(&params, Utc::now()) {
        Ok(snapshots) => (StatusCode::OK, Json(snapshots)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// GET /discarded?start=..&end=..&reason=.. - discarded snapshots in range
async fn get_discarded(
    State(query): State<QueryService>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match query.discarded_snapshots(&params, Utc::now()) {
        Ok(snapshots) => (StatusCode::OK, Json(snapshots)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Build the query API router around a query service.
pub fn router(query: QueryService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/snapshots", get(get_snapshots))
        .route("/discarded", get(get_discarded))
        .with_state(query)
        .layer(CorsLayer::permissive())
}
