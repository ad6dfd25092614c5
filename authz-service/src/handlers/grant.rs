//! Member-role grant handlers.
//!
//! Direct grants are issued immediately with an open-ended window.
//! Revocation closes the window at the current instant; rows are never
//! deleted, so the history stays queryable.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MemberRoleGrant;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to issue a direct grant.
#[derive(Debug, Deserialize)]
pub struct CreateGrantRequest {
    pub member_id: Uuid,
    pub role_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub approver_member_id: Option<Uuid>,
}

/// Grant response.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub grant_id: Uuid,
    pub member_id: Uuid,
    pub role_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub start_on: DateTime<Utc>,
    pub expires_on: Option<DateTime<Utc>>,
    pub entity_type_code: String,
    pub entity_id: Option<Uuid>,
    pub approver_member_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl From<MemberRoleGrant> for GrantResponse {
    fn from(grant: MemberRoleGrant) -> Self {
        Self {
            grant_id: grant.grant_id,
            member_id: grant.member_id,
            role_id: grant.role_id,
            branch_id: grant.branch_id,
            start_on: grant.start_on,
            expires_on: grant.expires_on,
            entity_type_code: grant.entity_type_code,
            entity_id: grant.entity_id,
            approver_member_id: grant.approver_member_id,
            created_utc: grant.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Issue a direct grant to a member.
///
/// POST /grants
pub async fn create_grant(
    State(state): State<AppState>,
    Json(req): Json<CreateGrantRequest>,
) -> Result<(StatusCode, Json<GrantResponse>), AppError> {
    state
        .db
        .find_member_by_id(req.member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    state
        .db
        .find_role_by_id(req.role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;

    if let Some(branch_id) = req.branch_id {
        state
            .db
            .find_branch_by_id(branch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;
    }

    let grant = MemberRoleGrant::new_direct(
        req.member_id,
        req.role_id,
        req.branch_id,
        req.approver_member_id,
    );
    state.db.insert_grant(&grant).await?;

    Ok((StatusCode::CREATED, Json(GrantResponse::from(grant))))
}

/// Get grant by ID.
///
/// GET /grants/:grant_id
pub async fn get_grant(
    State(state): State<AppState>,
    Path(grant_id): Path<Uuid>,
) -> Result<Json<GrantResponse>, AppError> {
    let grant = state
        .db
        .find_grant_by_id(grant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Grant not found")))?;

    Ok(Json(GrantResponse::from(grant)))
}

/// List every grant ever issued to a member, newest first.
///
/// GET /members/:member_id/grants
pub async fn list_member_grants(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<GrantResponse>>, AppError> {
    state
        .db
        .find_member_by_id(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    let grants = state.db.list_grants_for_member(member_id).await?;
    Ok(Json(grants.into_iter().map(GrantResponse::from).collect()))
}

/// List a member's grants active right now.
///
/// GET /members/:member_id/grants/active
pub async fn list_member_active_grants(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<GrantResponse>>, AppError> {
    state
        .db
        .find_member_by_id(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    let grants = state
        .db
        .find_active_grants_for_member(member_id, Utc::now())
        .await?;
    Ok(Json(grants.into_iter().map(GrantResponse::from).collect()))
}

/// Revoke a grant by closing its window now.
///
/// POST /grants/:grant_id/revoke
pub async fn revoke_grant(
    State(state): State<AppState>,
    Path(grant_id): Path<Uuid>,
) -> Result<Json<GrantResponse>, AppError> {
    state.db.expire_grant(grant_id, Utc::now()).await?;

    let grant = state
        .db
        .find_grant_by_id(grant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Grant not found")))?;

    Ok(Json(GrantResponse::from(grant)))
}
