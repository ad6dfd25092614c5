//! Authorization evaluation handlers.
//!
//! The handlers load a member's context (active grants expanded to role
//! permission sets and branch bounds) and hand the decision to the pure
//! evaluation kernel. Unknown members and unknown permission names come
//! back as denials, never errors.

use axum::extract::{Json, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::authz::{self, AccessDecision, BranchBounds};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Authorization evaluation request.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// The member whose access is being checked
    pub member_id: Uuid,
    /// Permission names to evaluate
    pub permissions: Vec<String>,
    /// Optional target branch for scoped permissions
    pub branch_id: Option<Uuid>,
}

/// Single permission decision.
#[derive(Debug, Serialize)]
pub struct PermissionDecision {
    pub permission: String,
    pub allowed: bool,
    pub reason: String,
    /// The grant that allowed this permission (if allowed)
    pub granted_by_grant: Option<Uuid>,
    /// The branch where the grant applies
    pub granted_at_branch: Option<Uuid>,
}

impl From<AccessDecision> for PermissionDecision {
    fn from(decision: AccessDecision) -> Self {
        Self {
            permission: decision.permission_name,
            allowed: decision.allowed,
            reason: decision.reason,
            granted_by_grant: decision.granted_by_grant,
            granted_at_branch: decision.granted_at_branch,
        }
    }
}

/// Authorization evaluation response.
#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub member_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub all_allowed: bool,
    pub decisions: Vec<PermissionDecision>,
}

/// Batch evaluation request.
#[derive(Debug, Deserialize)]
pub struct BatchEvaluateRequest {
    pub checks: Vec<EvaluateRequest>,
}

/// Batch evaluation response.
#[derive(Debug, Serialize)]
pub struct BatchEvaluateResponse {
    pub results: Vec<EvaluateResponse>,
    pub all_allowed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Evaluate permissions for a member, optionally at a target branch.
///
/// POST /authz/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let response = evaluate_one(&state, req).await?;
    Ok(Json(response))
}

/// Evaluate several independent checks in one round trip.
///
/// POST /authz/batch-evaluate
pub async fn batch_evaluate(
    State(state): State<AppState>,
    Json(req): Json<BatchEvaluateRequest>,
) -> Result<Json<BatchEvaluateResponse>, AppError> {
    let mut results = Vec::with_capacity(req.checks.len());
    for check in req.checks {
        results.push(evaluate_one(&state, check).await?);
    }
    let all_allowed = results.iter().all(|r| r.all_allowed);

    Ok(Json(BatchEvaluateResponse {
        results,
        all_allowed,
    }))
}

async fn evaluate_one(
    state: &AppState,
    req: EvaluateRequest,
) -> Result<EvaluateResponse, AppError> {
    let now = Utc::now();

    let target: Option<BranchBounds> = match req.branch_id {
        Some(branch_id) => Some(state.db.load_branch_bounds(branch_id).await?.ok_or_else(
            || AppError::NotFound(anyhow::anyhow!("Branch not found")),
        )?),
        None => None,
    };

    let decisions = match state.db.load_member_auth_context(req.member_id, now).await? {
        Some(ctx) => authz::evaluate_all(&ctx, &req.permissions, target.as_ref(), now),
        // Unknown member: deny everything rather than erroring, so batch
        // callers get a uniform decision shape.
        None => req
            .permissions
            .iter()
            .map(|name| AccessDecision::denied(name, "Member not found"))
            .collect(),
    };

    let decisions: Vec<PermissionDecision> =
        decisions.into_iter().map(PermissionDecision::from).collect();
    let all_allowed = !decisions.is_empty() && decisions.iter().all(|d| d.allowed);

    Ok(EvaluateResponse {
        member_id: req.member_id,
        branch_id: req.branch_id,
        all_allowed,
        decisions,
    })
}
