//! Warrant roster handlers.
//!
//! A roster is the unit of approval: it carries a threshold and a set of
//! member/role/branch warrants. Individual warrants can later be revoked
//! without touching the roster.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Warrant, WarrantRoster, WarrantRosterApproval};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// One warrant line in a roster creation request.
#[derive(Debug, Serialize, Deserialize)]
pub struct WarrantLineRequest {
    pub member_id: Uuid,
    pub role_id: Uuid,
    pub branch_id: Option<Uuid>,
}

/// Request to create a warrant roster.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRosterRequest {
    #[validate(length(min = 1, max = 255))]
    pub roster_label: String,
    #[validate(range(min = 1))]
    pub approvals_required: i32,
    pub planned_start_on: DateTime<Utc>,
    pub planned_expires_on: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub warrants: Vec<WarrantLineRequest>,
}

/// Request to approve or decline a roster.
#[derive(Debug, Deserialize)]
pub struct RosterDecisionRequest {
    pub approver_member_id: Uuid,
}

/// Request to revoke an active warrant.
#[derive(Debug, Deserialize, Validate)]
pub struct RevokeWarrantRequest {
    pub revoker_member_id: Uuid,
    #[validate(length(min = 1, max = 1024))]
    pub reason: String,
}

/// Warrant response.
#[derive(Debug, Serialize)]
pub struct WarrantResponse {
    pub warrant_id: Uuid,
    pub roster_id: Uuid,
    pub member_id: Uuid,
    pub role_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub warrant_state_code: String,
    pub start_on: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub revoked_on: Option<DateTime<Utc>>,
    pub revoker_member_id: Option<Uuid>,
    pub revoked_reason: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<Warrant> for WarrantResponse {
    fn from(warrant: Warrant) -> Self {
        Self {
            warrant_id: warrant.warrant_id,
            roster_id: warrant.roster_id,
            member_id: warrant.member_id,
            role_id: warrant.role_id,
            branch_id: warrant.branch_id,
            warrant_state_code: warrant.warrant_state_code,
            start_on: warrant.start_on,
            expires_on: warrant.expires_on,
            revoked_on: warrant.revoked_on,
            revoker_member_id: warrant.revoker_member_id,
            revoked_reason: warrant.revoked_reason,
            created_utc: warrant.created_utc,
        }
    }
}

/// Roster response.
#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub roster_id: Uuid,
    pub roster_label: String,
    pub approvals_required: i32,
    pub approval_count: i32,
    pub roster_state_code: String,
    pub planned_start_on: DateTime<Utc>,
    pub planned_expires_on: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl From<WarrantRoster> for RosterResponse {
    fn from(roster: WarrantRoster) -> Self {
        Self {
            roster_id: roster.roster_id,
            roster_label: roster.roster_label,
            approvals_required: roster.approvals_required,
            approval_count: roster.approval_count,
            roster_state_code: roster.roster_state_code,
            planned_start_on: roster.planned_start_on,
            planned_expires_on: roster.planned_expires_on,
            created_utc: roster.created_utc,
        }
    }
}

/// Roster with its warrants.
#[derive(Debug, Serialize)]
pub struct RosterDetailResponse {
    #[serde(flatten)]
    pub roster: RosterResponse,
    pub warrants: Vec<WarrantResponse>,
}

/// A recorded approval.
#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub approver_member_id: Uuid,
    pub approved_utc: DateTime<Utc>,
}

impl From<WarrantRosterApproval> for ApprovalResponse {
    fn from(approval: WarrantRosterApproval) -> Self {
        Self {
            approver_member_id: approval.approver_member_id,
            approved_utc: approval.approved_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a warrant roster with its warrants, in the pending state.
///
/// POST /rosters
pub async fn create_roster(
    State(state): State<AppState>,
    Json(req): Json<CreateRosterRequest>,
) -> Result<(StatusCode, Json<RosterDetailResponse>), AppError> {
    req.validate()?;

    if req.planned_expires_on <= req.planned_start_on {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Planned expiry must be after planned start"
        )));
    }

    for line in &req.warrants {
        state
            .db
            .find_member_by_id(line.member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;
        state
            .db
            .find_role_by_id(line.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Role not found")))?;
        if let Some(branch_id) = line.branch_id {
            state
                .db
                .find_branch_by_id(branch_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;
        }
    }

    let roster = WarrantRoster::new(
        req.roster_label,
        req.approvals_required,
        req.planned_start_on,
        req.planned_expires_on,
    );
    let warrants: Vec<Warrant> = req
        .warrants
        .iter()
        .map(|line| Warrant::new(roster.roster_id, line.member_id, line.role_id, line.branch_id))
        .collect();

    state.db.create_roster(&roster, &warrants).await?;

    Ok((
        StatusCode::CREATED,
        Json(RosterDetailResponse {
            roster: RosterResponse::from(roster),
            warrants: warrants.into_iter().map(WarrantResponse::from).collect(),
        }),
    ))
}

/// Get a roster with its warrants.
///
/// GET /rosters/:roster_id
pub async fn get_roster(
    State(state): State<AppState>,
    Path(roster_id): Path<Uuid>,
) -> Result<Json<RosterDetailResponse>, AppError> {
    let roster = state
        .db
        .find_roster_by_id(roster_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant roster not found")))?;

    let warrants = state.db.list_roster_warrants(roster_id).await?;

    Ok(Json(RosterDetailResponse {
        roster: RosterResponse::from(roster),
        warrants: warrants.into_iter().map(WarrantResponse::from).collect(),
    }))
}

/// List rosters, newest first.
///
/// GET /rosters
pub async fn list_rosters(
    State(state): State<AppState>,
) -> Result<Json<Vec<RosterResponse>>, AppError> {
    let rosters = state.db.list_rosters().await?;
    Ok(Json(rosters.into_iter().map(RosterResponse::from).collect()))
}

/// List the approvals recorded on a roster.
///
/// GET /rosters/:roster_id/approvals
pub async fn list_roster_approvals(
    State(state): State<AppState>,
    Path(roster_id): Path<Uuid>,
) -> Result<Json<Vec<ApprovalResponse>>, AppError> {
    state
        .db
        .find_roster_by_id(roster_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant roster not found")))?;

    let approvals = state.db.list_roster_approvals(roster_id).await?;
    Ok(Json(
        approvals.into_iter().map(ApprovalResponse::from).collect(),
    ))
}

/// Record one approval. When the threshold is reached the roster flips to
/// approved, its warrants activate, and grants are issued.
///
/// POST /rosters/:roster_id/approve
pub async fn approve_roster(
    State(state): State<AppState>,
    Path(roster_id): Path<Uuid>,
    Json(req): Json<RosterDecisionRequest>,
) -> Result<Json<RosterResponse>, AppError> {
    state
        .db
        .find_member_by_id(req.approver_member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Approver not found")))?;

    let roster = state
        .db
        .approve_roster(roster_id, req.approver_member_id, Utc::now())
        .await?;

    Ok(Json(RosterResponse::from(roster)))
}

/// Decline a pending roster. One decline is final.
///
/// POST /rosters/:roster_id/decline
pub async fn decline_roster(
    State(state): State<AppState>,
    Path(roster_id): Path<Uuid>,
    Json(req): Json<RosterDecisionRequest>,
) -> Result<Json<RosterResponse>, AppError> {
    state
        .db
        .find_member_by_id(req.approver_member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Approver not found")))?;

    let roster = state.db.decline_roster(roster_id).await?;
    Ok(Json(RosterResponse::from(roster)))
}

/// Revoke an active warrant and expire the grant it produced.
///
/// POST /warrants/:warrant_id/revoke
pub async fn revoke_warrant(
    State(state): State<AppState>,
    Path(warrant_id): Path<Uuid>,
    Json(req): Json<RevokeWarrantRequest>,
) -> Result<Json<WarrantResponse>, AppError> {
    req.validate()?;

    state
        .db
        .find_member_by_id(req.revoker_member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Revoker not found")))?;

    let warrant = state
        .db
        .revoke_warrant(warrant_id, req.revoker_member_id, &req.reason, Utc::now())
        .await?;

    Ok(Json(WarrantResponse::from(warrant)))
}

/// Get a single warrant.
///
/// GET /warrants/:warrant_id
pub async fn get_warrant(
    State(state): State<AppState>,
    Path(warrant_id): Path<Uuid>,
) -> Result<Json<WarrantResponse>, AppError> {
    let warrant = state
        .db
        .find_warrant_by_id(warrant_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant not found")))?;

    Ok(Json(WarrantResponse::from(warrant)))
}
