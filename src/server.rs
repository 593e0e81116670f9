//! HTTP transport for the scan service

use crate::error::{IrisError, Result};
use crate::models::{ScanStatus, ScanUpdate};
use crate::service::ScanService;
use crate::store::{ListFilter, PageOptions};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for IrisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        let body = ApiError {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for IrisError {
    fn from(rejection: JsonRejection) -> Self {
        IrisError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for IrisError {
    fn from(rejection: QueryRejection) -> Self {
        IrisError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for IrisError {
    fn from(rejection: PathRejection) -> Self {
        IrisError::ValidationError(rejection.body_text())
    }
}

// Extractors are taken as `Result` so malformed requests get the same JSON
// error body as every other failure.
type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;
type QueryParams<T> = std::result::Result<Query<T>, QueryRejection>;
type ScanId = std::result::Result<Path<Uuid>, PathRejection>;

#[derive(Deserialize)]
pub struct CreateScanRequest {
    #[serde(alias = "urls")]
    pub targets: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<ScanStatus>,
    pub sort_by: Option<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
}

type AppState = Arc<ScanService>;

/// Builds the router for `/scans` and `/health`
pub fn router(service: Arc<ScanService>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/scans", post(create_scan).get(list_scans))
        .route(
            "/scans/:scan_id",
            get(get_scan).put(update_scan).delete(delete_scan),
        )
        .route("/scans/:scan_id/execute", post(execute_scan))
        .route("/scans/:scan_id/export", get(export_scan))
        .with_state(service)
}

/// Serves the API until the process is stopped
pub async fn serve(service: Arc<ScanService>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") })),
    )
}

async fn create_scan(
    State(service): State<AppState>,
    body: JsonBody<CreateScanRequest>,
) -> Result<impl IntoResponse> {
    let Json(req) = body?;
    let scan = service.create(req.targets).await?;
    Ok((StatusCode::CREATED, Json(scan)))
}

async fn list_scans(
    State(service): State<AppState>,
    query: QueryParams<ListQuery>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let filter = ListFilter {
        status: query.status,
    };
    let options = PageOptions {
        sort_by: query.sort_by,
        limit: query.limit,
        page: query.page,
    };
    Ok(Json(service.query(&filter, &options).await?))
}

async fn get_scan(
    State(service): State<AppState>,
    scan_id: ScanId,
) -> Result<impl IntoResponse> {
    let Path(scan_id) = scan_id?;
    Ok(Json(service.get(scan_id).await?))
}

async fn update_scan(
    State(service): State<AppState>,
    scan_id: ScanId,
    body: JsonBody<ScanUpdate>,
) -> Result<impl IntoResponse> {
    let Path(scan_id) = scan_id?;
    let Json(update) = body?;
    Ok(Json(service.update(scan_id, update).await?))
}

async fn delete_scan(
    State(service): State<AppState>,
    scan_id: ScanId,
) -> Result<impl IntoResponse> {
    let Path(scan_id) = scan_id?;
    service.delete(scan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn execute_scan(
    State(service): State<AppState>,
    scan_id: ScanId,
) -> Result<impl IntoResponse> {
    let Path(scan_id) = scan_id?;
    Ok(Json(service.execute(scan_id).await?))
}

async fn export_scan(
    State(service): State<AppState>,
    scan_id: ScanId,
) -> Result<impl IntoResponse> {
    let Path(scan_id) = scan_id?;
    let csv = service.export_csv(scan_id).await?;
    let disposition = format!("attachment; filename=\"scan-{scan_id}-results.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
