//! Service lifecycle handlers
//!
//! Allocate and re-allocate answer `202 Accepted` and finish in a background
//! task; callers follow progress through the status endpoint. The other
//! operations run inline.

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hlofe_types::{parse_descriptor, ComponentStatusEntry, EntityId};
use serde::Serialize;
use tracing::{error, info};

/// Route prefix of the service resources
pub const SERVICES_PATH: &str = "/hlo_fe/services";

/// Body of a `202 Accepted` answer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub service_id: EntityId,
    pub status: String,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub service_id: EntityId,
    pub relocated: Vec<EntityId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeallocateResponse {
    pub service_id: EntityId,
    pub removing: Vec<EntityId>,
    pub service_updated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub service_id: EntityId,
    pub deleted: Vec<EntityId>,
    pub failed: Vec<EntityId>,
}

fn parse_service_id(raw: &str) -> ApiResult<EntityId> {
    EntityId::parse(raw).map_err(|e| ApiError::BadRequest(format!("Invalid service id: {}", e)))
}

fn accepted(service_id: EntityId, message: &str) -> Response {
    let url = format!("{}/{}", SERVICES_PATH, service_id);
    let location = HeaderValue::from_str(&url).ok();
    let body = AcceptedResponse {
        service_id,
        status: "starting".to_string(),
        message: message.to_string(),
        url,
    };

    let mut response = (StatusCode::ACCEPTED, Json(body)).into_response();
    if let Some(location) = location {
        response.headers_mut().insert(header::LOCATION, location);
    }
    response
}

/// Component statuses of a service
pub async fn get_service_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ComponentStatusEntry>>> {
    let service_id = parse_service_id(&id)?;
    let statuses = state.controller.service_status(&service_id).await?;
    Ok(Json(statuses))
}

/// Allocate a service from a YAML descriptor
pub async fn allocate_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> ApiResult<Response> {
    let service_id = parse_service_id(&id)?;
    let descriptor = parse_descriptor(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let controller = state.controller.clone();
    let task_id = service_id.clone();
    tokio::spawn(async move {
        match controller.allocate(&task_id, &descriptor).await {
            Ok(outcome) => info!(service_id = %task_id, outcome = ?outcome, "Allocation finished"),
            Err(e) => error!(service_id = %task_id, error = %e, "Allocation failed"),
        }
    });

    Ok(accepted(service_id, "Service allocation started"))
}

/// Re-allocate an existing service
pub async fn reallocate_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let service_id = parse_service_id(&id)?;
    if !state.controller.service_exists(&service_id).await? {
        return Err(ApiError::NotFound(format!("Service {} not found", service_id)));
    }

    let controller = state.controller.clone();
    let task_id = service_id.clone();
    tokio::spawn(async move {
        match controller.reallocate(&task_id).await {
            Ok(outcome) => info!(service_id = %task_id, outcome = ?outcome, "Re-allocation finished"),
            Err(e) => error!(service_id = %task_id, error = %e, "Re-allocation failed"),
        }
    });

    Ok(accepted(service_id, "Service re-allocation started"))
}

/// Mark components named by a new descriptor for relocation
pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> ApiResult<Json<UpdateResponse>> {
    let service_id = parse_service_id(&id)?;
    let report = state.controller.update(&service_id, &body).await?;
    Ok(Json(UpdateResponse {
        service_id,
        relocated: report.relocated,
    }))
}

/// Tear down a service
pub async fn deallocate_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeallocateResponse>> {
    let service_id = parse_service_id(&id)?;
    let report = state.controller.deallocate(&service_id).await?;
    Ok(Json(DeallocateResponse {
        service_id,
        removing: report.removing,
        service_updated: report.service_updated,
    }))
}

/// Delete a torn-down service and its entities
pub async fn purge_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PurgeResponse>> {
    let service_id = parse_service_id(&id)?;
    let report = state.controller.purge(&service_id).await?;
    Ok(Json(PurgeResponse {
        service_id,
        deleted: report.deleted,
        failed: report.failed,
    }))
}
