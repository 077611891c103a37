// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::openapi::ApiDoc;
use crate::routes::{alignments, stats, witness};
use crate::state::AppState;

/// Request errors with a dedicated status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Creates the axum application with all routes
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // OpenAPI spec endpoint (YAML format)
        .route("/openapi.yaml", get(openapi_yaml))
        // Swagger UI, which also serves /openapi.json
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .nest("/v1", api_v1_routes(state))
        .layer(cors)
        .fallback(not_found)
}

fn api_v1_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/witness", witness::routes())
        .nest("/alignments", alignments::routes())
        .merge(stats::routes())
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = crate::models::HealthResponse)
    )
)]
pub(crate) async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "witness-api"
    }))
}

async fn openapi_yaml() -> Response {
    match serde_yaml::to_string(&ApiDoc::openapi()) {
        Ok(yaml) => ([(header::CONTENT_TYPE, "application/x-yaml")], yaml).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to convert to YAML: {}", err),
        )
            .into_response(),
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested endpoint does not exist"
        })),
    )
}

/// Converts a failed request into a JSON error response.
///
/// Chain failures never reach here: they come back as `degraded` results instead.
pub fn handle_error(err: anyhow::Error) -> impl IntoResponse {
    let (status, message) = match err.downcast_ref::<ApiError>() {
        Some(ApiError::InvalidAddress(_)) => (StatusCode::BAD_REQUEST, err.to_string()),
        Some(ApiError::NotConfigured(_)) => (StatusCode::NOT_FOUND, err.to_string()),
        None => {
            tracing::error!("Request failed: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred. Please try again later.".to_string(),
            )
        }
    };

    (
        status,
        Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": message
        })),
    )
}

/// Create a cache control header value safely
pub fn cache_control(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("public, max-age=10"))
}

/// Serialize `body` with the given cache policy, or render `err` through [handle_error].
pub fn respond<T: serde::Serialize>(result: anyhow::Result<T>, cache: &str) -> Response {
    match result {
        Ok(body) => {
            let mut res = Json(body).into_response();
            res.headers_mut().insert(header::CACHE_CONTROL, cache_control(cache));
            res
        }
        Err(err) => handle_error(err).into_response(),
    }
}
