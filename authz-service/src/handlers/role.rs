//! Role catalog handlers.
//!
//! Roles bundle permissions; grants and warrants always reference a role,
//! never a permission directly.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::permission::PermissionResponse;
use crate::models::Role;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a new role.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 255))]
    pub role_label: String,
}

/// Request to attach a permission to a role.
#[derive(Debug, Deserialize)]
pub struct AttachPermissionRequest {
    pub permission_id: Uuid,
}

/// Role response.
#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role_id: Uuid,
    pub role_label: String,
    pub is_system: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            role_id: role.role_id,
            role_label: role.role_label,
            is_system: role.is_system,
            created_utc: role.created_utc,
        }
    }
}

/// Role with its permission list.
#[derive(Debug, Serialize)]
pub struct RoleDetailResponse {
    #[serde(flatten)]
    pub role: RoleResponse,
    pub permissions: Vec<PermissionResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new role.
///
/// POST /roles
pub async fn create_role(
    State(state): State<AppState>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), AppError> {
    req.validate()?;

    let role = Role::new(req.role_label);
    state.db.insert_role(&role).await?;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

/// Get role by ID, with its permission list expanded.
///
/// GET /roles/:role_id
pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<RoleDetailResponse>, AppError> {
    let role = state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    let permissions = state.db.get_role_permissions(role_id).await?;

    Ok(Json(RoleDetailResponse {
        role: RoleResponse::from(role),
        permissions: permissions.into_iter().map(PermissionResponse::from).collect(),
    }))
}

/// List all roles.
///
/// GET /roles
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleResponse>>, AppError> {
    let roles = state.db.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// Delete a role. System roles are protected.
///
/// DELETE /roles/:role_id
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let role = state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    if role.is_system {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "System roles cannot be deleted"
        )));
    }

    state.db.delete_role(role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the permissions bundled in a role.
///
/// GET /roles/:role_id/permissions
pub async fn get_role_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Vec<PermissionResponse>>, AppError> {
    state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    let permissions = state.db.get_role_permissions(role_id).await?;
    Ok(Json(
        permissions.into_iter().map(PermissionResponse::from).collect(),
    ))
}

/// Attach a permission to a role. Idempotent.
///
/// POST /roles/:role_id/permissions
pub async fn attach_permission(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(req): Json<AttachPermissionRequest>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    state
        .db
        .find_permission_by_id(req.permission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))?;

    state
        .db
        .attach_permission_to_role(role_id, req.permission_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Detach a permission from a role.
///
/// DELETE /roles/:role_id/permissions/:permission_id
pub async fn detach_permission(
    State(state): State<AppState>,
    Path((role_id, permission_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .db
        .find_role_by_id(role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    state
        .db
        .detach_permission_from_role(role_id, permission_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
