//! Member registry handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::Member;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to register a new member.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemberRequest {
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    #[validate(email)]
    pub email: String,
    pub membership_expires_on: Option<NaiveDate>,
    pub background_check_expires_on: Option<NaiveDate>,
    #[validate(range(min = 1900, max = 2100))]
    pub birth_year: Option<i32>,
    #[validate(range(min = 1, max = 12))]
    pub birth_month: Option<i32>,
}

/// Request to update a member's record. Every field is optional and
/// `null`/absent means "leave unchanged"; this endpoint cannot clear a
/// date or birth field back to null. Expirations are driven forward by
/// membership renewals, never erased.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    #[validate(length(min = 1, max = 255))]
    pub display_name: Option<String>,
    pub membership_expires_on: Option<NaiveDate>,
    pub background_check_expires_on: Option<NaiveDate>,
    #[validate(range(min = 1900, max = 2100))]
    pub birth_year: Option<i32>,
    #[validate(range(min = 1, max = 12))]
    pub birth_month: Option<i32>,
    pub active_flag: Option<bool>,
}

/// Member response. Birth information is intentionally reduced to
/// year/month granularity everywhere, including responses.
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub membership_expires_on: Option<NaiveDate>,
    pub background_check_expires_on: Option<NaiveDate>,
    pub birth_year: Option<i32>,
    pub birth_month: Option<i32>,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        Self {
            member_id: member.member_id,
            display_name: member.display_name,
            email: member.email,
            membership_expires_on: member.membership_expires_on,
            background_check_expires_on: member.background_check_expires_on,
            birth_year: member.birth_year,
            birth_month: member.birth_month,
            active_flag: member.active_flag,
            created_utc: member.created_utc,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new member.
///
/// POST /members
pub async fn create_member(
    State(state): State<AppState>,
    Json(req): Json<CreateMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    req.validate()?;

    let mut member = Member::new(req.display_name, req.email);
    member.membership_expires_on = req.membership_expires_on;
    member.background_check_expires_on = req.background_check_expires_on;
    member.birth_year = req.birth_year;
    member.birth_month = req.birth_month;

    state.db.insert_member(&member).await?;

    Ok((StatusCode::CREATED, Json(MemberResponse::from(member))))
}

/// Get member by ID.
///
/// GET /members/:member_id
pub async fn get_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = state
        .db
        .find_member_by_id(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    Ok(Json(MemberResponse::from(member)))
}

/// List all members.
///
/// GET /members
pub async fn list_members(
    State(state): State<AppState>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    let members = state.db.list_members().await?;
    Ok(Json(members.into_iter().map(MemberResponse::from).collect()))
}

/// Update a member's record.
///
/// PATCH /members/:member_id
pub async fn update_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, AppError> {
    req.validate()?;

    let mut member = state
        .db
        .find_member_by_id(member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Member not found")))?;

    if let Some(display_name) = req.display_name {
        member.display_name = display_name;
    }
    if req.membership_expires_on.is_some() {
        member.membership_expires_on = req.membership_expires_on;
    }
    if req.background_check_expires_on.is_some() {
        member.background_check_expires_on = req.background_check_expires_on;
    }
    if req.birth_year.is_some() {
        member.birth_year = req.birth_year;
    }
    if req.birth_month.is_some() {
        member.birth_month = req.birth_month;
    }
    if let Some(active_flag) = req.active_flag {
        member.active_flag = active_flag;
    }

    state.db.update_member(&member).await?;

    Ok(Json(MemberResponse::from(member)))
}
