//! Permission catalog handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Permission, ScopingRule};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to define a new permission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 255))]
    pub permission_name: String,
    pub scoping_rule_code: String,
    #[serde(default)]
    pub requires_active_membership: bool,
    #[serde(default)]
    pub requires_background_check: bool,
    #[serde(default)]
    #[validate(range(min = 0, max = 150))]
    pub min_age: i32,
    #[serde(default)]
    pub requires_warrant: bool,
    #[serde(default)]
    pub is_super_user: bool,
}

/// Permission response.
#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub permission_id: Uuid,
    pub permission_name: String,
    pub scoping_rule_code: String,
    pub requires_active_membership: bool,
    pub requires_background_check: bool,
    pub min_age: i32,
    pub requires_warrant: bool,
    pub is_super_user: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Permission> for PermissionResponse {
    fn from(permission: Permission) -> Self {
        Self {
            permission_id: permission.permission_id,
            permission_name: permission.permission_name,
            scoping_rule_code: permission.scoping_rule_code,
            requires_active_membership: permission.requires_active_membership,
            requires_background_check: permission.requires_background_check,
            min_age: permission.min_age,
            requires_warrant: permission.requires_warrant,
            is_super_user: permission.is_super_user,
            created_utc: permission.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Define a new permission.
///
/// POST /permissions
pub async fn create_permission(
    State(state): State<AppState>,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<PermissionResponse>), AppError> {
    req.validate()?;

    let scoping_rule = ScopingRule::from_code(&req.scoping_rule_code).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "Unknown scoping rule '{}'",
            req.scoping_rule_code
        ))
    })?;

    let mut permission = Permission::new(req.permission_name, scoping_rule);
    permission.requires_active_membership = req.requires_active_membership;
    permission.requires_background_check = req.requires_background_check;
    permission.min_age = req.min_age;
    permission.requires_warrant = req.requires_warrant;
    permission.is_super_user = req.is_super_user;

    state.db.insert_permission(&permission).await?;

    Ok((StatusCode::CREATED, Json(PermissionResponse::from(permission))))
}

/// Get permission by ID.
///
/// GET /permissions/:permission_id
pub async fn get_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<Uuid>,
) -> Result<Json<PermissionResponse>, AppError> {
    let permission = state
        .db
        .find_permission_by_id(permission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))?;

    Ok(Json(PermissionResponse::from(permission)))
}

/// Get permission by its unique name.
///
/// GET /permissions/by-name/:permission_name
pub async fn get_permission_by_name(
    State(state): State<AppState>,
    Path(permission_name): Path<String>,
) -> Result<Json<PermissionResponse>, AppError> {
    let permission = state
        .db
        .find_permission_by_name(&permission_name)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Permission not found")))?;

    Ok(Json(PermissionResponse::from(permission)))
}

/// List all permissions.
///
/// GET /permissions
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PermissionResponse>>, AppError> {
    let permissions = state.db.list_permissions().await?;
    Ok(Json(
        permissions.into_iter().map(PermissionResponse::from).collect(),
    ))
}
