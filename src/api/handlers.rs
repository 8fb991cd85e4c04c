//! API request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::server::AppState;
use crate::catalog::{refresh_cache, Catalog};
use crate::error::DepgError;
use crate::excel::SpreadsheetProperties;
use crate::generator::Submission;
use crate::profile::ResultSet;

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// A failed request, rendered as an `ApiResponse` envelope
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<DepgError> for ApiError {
    fn from(err: DepgError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::warn!(error = %err, "request rejected");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "worker task failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("worker task failed: {}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// One dropdown as the form sees it
#[derive(Debug, Serialize)]
pub struct DropdownView {
    pub coord: String,
    pub category: String,
    pub values: Vec<String>,
    pub selected_idx: usize,
}

fn dropdown_views(catalog: &Catalog) -> Vec<DropdownView> {
    catalog
        .iter()
        .map(|(coord, entry)| DropdownView {
            coord: coord.to_string(),
            category: entry.category.clone(),
            values: entry.values.clone(),
            selected_idx: entry.selected_idx,
        })
        .collect()
}

/// Catalog response
#[derive(Serialize)]
pub struct CatalogResponse {
    pub properties: SpreadsheetProperties,
    pub dropdowns: Vec<DropdownView>,
}

/// GET / - Dropdowns for the form, nothing selected
pub async fn catalog(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.cache();
    let catalog = cache.with_selections(&HashMap::new());
    Json(ApiResponse::ok(CatalogResponse {
        properties: cache.properties.clone(),
        dropdowns: dropdown_views(&catalog),
    }))
}

/// Generate response
#[derive(Serialize)]
pub struct GenerateResponse {
    pub profile: String,
    pub notes: String,
    pub results: ResultSet,
    pub properties: SpreadsheetProperties,
    pub dropdowns: Vec<DropdownView>,
}

/// POST / - Evaluate the submitted selections and render the profile
pub async fn generate(
    State(state): State<Arc<AppState>>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<GenerateResponse> {
    let submission = Submission::from_form(form);
    let cache = state.cache();

    let worker_state = Arc::clone(&state);
    let worker_cache = Arc::clone(&cache);
    let generated = tokio::task::spawn_blocking(move || {
        worker_state.generator.generate(&worker_cache, &submission)
    })
    .await??;

    Ok(Json(ApiResponse::ok(GenerateResponse {
        profile: generated.profile,
        notes: generated.notes,
        results: generated.results,
        properties: cache.properties.clone(),
        dropdowns: dropdown_views(&generated.catalog),
    })))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub dropdowns: usize,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        dropdowns: state.cache().dropdown_data.len(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub spreadsheet: String,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        spreadsheet: state
            .generator
            .config()
            .spreadsheet_file
            .display()
            .to_string(),
    }))
}

/// Rebuild response
#[derive(Serialize)]
pub struct RebuildResponse {
    pub sheet_name: String,
    pub dropdowns: usize,
    pub cache_json: String,
}

/// POST /api/v1/cache/rebuild - Rebuild the dropdown cache and swap it in
pub async fn rebuild_cache(State(state): State<Arc<AppState>>) -> ApiResult<RebuildResponse> {
    let worker_state = Arc::clone(&state);
    let cache = tokio::task::spawn_blocking(move || {
        let generator = &worker_state.generator;
        refresh_cache(generator.config(), generator.session())
    })
    .await??;

    let response = RebuildResponse {
        sheet_name: cache.properties.sheet_name.clone(),
        dropdowns: cache.dropdown_data.len(),
        cache_json: state.generator.config().cache_json.display().to_string(),
    };
    state.replace_cache(cache);
    Ok(Json(ApiResponse::ok(response)))
}
