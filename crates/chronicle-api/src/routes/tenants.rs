//! Routes for the Tenancy context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use chronicle_tenancy::application::command_handlers;
use chronicle_tenancy::application::query_handlers::{self, TenantHistoryEntry, TenantView};
use chronicle_tenancy::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct RegisterTenantRequest {
    /// Identifier to register under; generated when absent.
    pub tenant_id: Option<Uuid>,
    /// Display name.
    pub name: String,
}

/// Request body for POST /{tenant_id}/rename.
#[derive(Debug, Deserialize)]
pub struct RenameTenantRequest {
    /// The new display name.
    pub name: String,
}

/// Request body for POST /{tenant_id}/features.
#[derive(Debug, Deserialize)]
pub struct ToggleFeatureRequest {
    /// Feature key.
    pub feature: String,
    /// Desired state of the flag.
    pub enabled: bool,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The tenant the command applied to.
    pub tenant_id: Uuid,
    /// Stream revision after the command; unchanged when nothing was raised.
    pub revision: Option<u64>,
    /// Correlation id stamped on the raised events.
    pub correlation_id: Uuid,
}

/// POST /
#[instrument(skip(state, request))]
async fn register_tenant(
    State(state): State<AppState>,
    Json(request): Json<RegisterTenantRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = commands::RegisterTenant {
        correlation_id: Uuid::new_v4(),
        tenant_id: request.tenant_id.unwrap_or_else(Uuid::now_v7),
        name: request.name,
    };

    info!(correlation_id = %command.correlation_id, "handling register_tenant command");

    let revision =
        command_handlers::handle_register_tenant(&command, &state.repository, &state.shutdown)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommandResponse {
            tenant_id: command.tenant_id,
            revision,
            correlation_id: command.correlation_id,
        }),
    ))
}

/// POST /{tenant_id}/rename
#[instrument(skip(state, request))]
async fn rename_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<RenameTenantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::RenameTenant {
        correlation_id: Uuid::new_v4(),
        tenant_id,
        name: request.name,
    };

    info!(correlation_id = %command.correlation_id, "handling rename_tenant command");

    let revision =
        command_handlers::handle_rename_tenant(&command, &state.repository, &state.shutdown)
            .await?;

    Ok(Json(CommandResponse {
        tenant_id,
        revision,
        correlation_id: command.correlation_id,
    }))
}

/// POST /{tenant_id}/features
#[instrument(skip(state, request))]
async fn toggle_feature(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<ToggleFeatureRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ToggleFeature {
        correlation_id: Uuid::new_v4(),
        tenant_id,
        feature: request.feature,
        enabled: request.enabled,
    };

    info!(correlation_id = %command.correlation_id, "handling toggle_feature command");

    let revision =
        command_handlers::handle_toggle_feature(&command, &state.repository, &state.shutdown)
            .await?;

    Ok(Json(CommandResponse {
        tenant_id,
        revision,
        correlation_id: command.correlation_id,
    }))
}

/// DELETE /{tenant_id}
#[instrument(skip(state))]
async fn delete_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DeleteTenant {
        correlation_id: Uuid::new_v4(),
        tenant_id,
    };

    info!(correlation_id = %command.correlation_id, "handling delete_tenant command");

    let revision =
        command_handlers::handle_delete_tenant(&command, &state.repository, &state.shutdown)
            .await?;

    Ok(Json(CommandResponse {
        tenant_id,
        revision,
        correlation_id: command.correlation_id,
    }))
}

/// GET /{tenant_id}
#[instrument(skip(state))]
async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantView>, ApiError> {
    let view = query_handlers::get_tenant(tenant_id, &state.repository, &state.shutdown).await?;
    Ok(Json(view))
}

/// GET /{tenant_id}/history
#[instrument(skip(state))]
async fn get_tenant_history(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<TenantHistoryEntry>>, ApiError> {
    let history =
        query_handlers::get_tenant_history(tenant_id, &state.repository, &state.shutdown).await?;
    Ok(Json(history))
}

/// Returns the router for the tenancy context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_tenant))
        .route("/{tenant_id}", get(get_tenant).delete(delete_tenant))
        .route("/{tenant_id}/rename", post(rename_tenant))
        .route("/{tenant_id}/features", post(toggle_feature))
        .route("/{tenant_id}/history", get(get_tenant_history))
}
