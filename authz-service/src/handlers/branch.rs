//! Branch hierarchy handlers.
//!
//! The branch tree is stored as a nested set; handlers expose creation,
//! reparenting, traversal, and leaf deletion. Every mutation renumbers
//! the tree inside its transaction.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::Branch;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create a new branch.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 255))]
    pub branch_label: String,
    #[validate(length(min = 1, max = 64))]
    pub branch_type_code: String,
    pub parent_branch_id: Option<Uuid>,
}

/// Request to update a branch's label, type, or active flag.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBranchRequest {
    #[validate(length(min = 1, max = 255))]
    pub branch_label: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub branch_type_code: Option<String>,
    pub active_flag: Option<bool>,
}

/// Request to move a branch under a new parent (None makes it a root).
#[derive(Debug, Deserialize)]
pub struct MoveBranchRequest {
    pub new_parent_branch_id: Option<Uuid>,
}

/// Branch response.
#[derive(Debug, Serialize)]
pub struct BranchResponse {
    pub branch_id: Uuid,
    pub branch_label: String,
    pub branch_type_code: String,
    pub parent_branch_id: Option<Uuid>,
    pub lft: i32,
    pub rght: i32,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            branch_id: branch.branch_id,
            branch_label: branch.branch_label,
            branch_type_code: branch.branch_type_code,
            parent_branch_id: branch.parent_branch_id,
            lft: branch.lft,
            rght: branch.rght,
            active_flag: branch.active_flag,
            created_utc: branch.created_utc,
        }
    }
}

/// Branch tree response (with children nested).
#[derive(Debug, Serialize)]
pub struct BranchTreeResponse {
    #[serde(flatten)]
    pub branch: BranchResponse,
    pub children: Vec<BranchTreeResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new branch.
///
/// POST /branches
pub async fn create_branch(
    State(state): State<AppState>,
    Json(req): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<BranchResponse>), AppError> {
    req.validate()?;

    if let Some(parent_id) = req.parent_branch_id {
        state
            .db
            .find_branch_by_id(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Parent branch not found")))?;
    }

    let branch = Branch::new(req.branch_label, req.branch_type_code, req.parent_branch_id);
    state.db.insert_branch(&branch).await?;

    // Re-read so the response carries the renumbered bounds.
    let created = state
        .db
        .find_branch_by_id(branch.branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    Ok((StatusCode::CREATED, Json(BranchResponse::from(created))))
}

/// Get branch by ID.
///
/// GET /branches/:branch_id
pub async fn get_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<BranchResponse>, AppError> {
    let branch = state
        .db
        .find_branch_by_id(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    Ok(Json(BranchResponse::from(branch)))
}

/// List all branches in tree order.
///
/// GET /branches
pub async fn list_branches(
    State(state): State<AppState>,
) -> Result<Json<Vec<BranchResponse>>, AppError> {
    let branches = state.db.list_branches().await?;
    Ok(Json(branches.into_iter().map(BranchResponse::from).collect()))
}

/// Get the full forest as nested trees.
///
/// GET /branches/tree
pub async fn get_branch_tree(
    State(state): State<AppState>,
) -> Result<Json<Vec<BranchTreeResponse>>, AppError> {
    let branches = state.db.list_branches().await?;
    Ok(Json(build_forest(branches)))
}

/// Descendants of a branch, in tree order.
///
/// GET /branches/:branch_id/descendants
pub async fn get_branch_descendants(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Vec<BranchResponse>>, AppError> {
    state
        .db
        .find_branch_by_id(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    let descendants = state.db.find_branch_descendants(branch_id).await?;
    Ok(Json(
        descendants.into_iter().map(BranchResponse::from).collect(),
    ))
}

/// Ancestors of a branch from root downward.
///
/// GET /branches/:branch_id/ancestors
pub async fn get_branch_ancestors(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Vec<BranchResponse>>, AppError> {
    state
        .db
        .find_branch_by_id(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    let ancestors = state.db.find_branch_ancestors(branch_id).await?;
    Ok(Json(
        ancestors.into_iter().map(BranchResponse::from).collect(),
    ))
}

/// Update a branch's label, type, or active flag.
///
/// PATCH /branches/:branch_id
pub async fn update_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Json(req): Json<UpdateBranchRequest>,
) -> Result<Json<BranchResponse>, AppError> {
    req.validate()?;

    state
        .db
        .find_branch_by_id(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    state
        .db
        .update_branch(
            branch_id,
            req.branch_label.as_deref(),
            req.branch_type_code.as_deref(),
            req.active_flag,
        )
        .await?;

    let updated = state
        .db
        .find_branch_by_id(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    Ok(Json(BranchResponse::from(updated)))
}

/// Move a branch under a new parent.
///
/// POST /branches/:branch_id/move
pub async fn move_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
    Json(req): Json<MoveBranchRequest>,
) -> Result<Json<BranchResponse>, AppError> {
    state
        .db
        .move_branch(branch_id, req.new_parent_branch_id)
        .await?;

    let moved = state
        .db
        .find_branch_by_id(branch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

    Ok(Json(BranchResponse::from(moved)))
}

/// Delete a leaf branch.
///
/// DELETE /branches/:branch_id
pub async fn delete_branch(
    State(state): State<AppState>,
    Path(branch_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_branch(branch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Assemble nested trees from a list sorted by lft. Children of each node
/// are contiguous in the list, so a single pass with a parent index works.
fn build_forest(branches: Vec<Branch>) -> Vec<BranchTreeResponse> {
    fn attach(
        node: BranchTreeResponse,
        parent_id: Option<Uuid>,
        roots: &mut Vec<BranchTreeResponse>,
        stack: &mut Vec<(Uuid, BranchTreeResponse)>,
    ) {
        match parent_id {
            Some(pid) if stack.iter().any(|(id, _)| *id == pid) => {
                // Pop completed subtrees until the parent is on top.
                while stack.last().map(|(id, _)| *id) != Some(pid) {
                    let (_, done) = match stack.pop() {
                        Some(entry) => entry,
                        None => break,
                    };
                    match stack.last_mut() {
                        Some((_, top)) => top.children.push(done),
                        None => roots.push(done),
                    }
                }
                stack.push((node.branch.branch_id, node));
            }
            _ => {
                // Root (or orphaned parent): flush the stack first.
                while let Some((_, done)) = stack.pop() {
                    match stack.last_mut() {
                        Some((_, top)) => top.children.push(done),
                        None => roots.push(done),
                    }
                }
                stack.push((node.branch.branch_id, node));
            }
        }
    }

    let mut roots = Vec::new();
    let mut stack: Vec<(Uuid, BranchTreeResponse)> = Vec::new();

    for branch in branches {
        let parent_id = branch.parent_branch_id;
        let node = BranchTreeResponse {
            branch: BranchResponse::from(branch),
            children: Vec::new(),
        };
        attach(node, parent_id, &mut roots, &mut stack);
    }

    while let Some((_, done)) = stack.pop() {
        match stack.last_mut() {
            Some((_, top)) => top.children.push(done),
            None => roots.push(done),
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(label: &str, parent: Option<Uuid>, lft: i32, rght: i32) -> Branch {
        let mut b = Branch::new(label.to_string(), "group".to_string(), parent);
        b.lft = lft;
        b.rght = rght;
        b
    }

    #[test]
    fn build_forest_nests_children_under_parents() {
        let kingdom = branch("Kingdom", None, 1, 6);
        let shire = branch("Shire", Some(kingdom.branch_id), 2, 5);
        let canton = branch("Canton", Some(shire.branch_id), 3, 4);

        let forest = build_forest(vec![kingdom, shire, canton]);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].branch.branch_label, "Kingdom");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].branch.branch_label, "Shire");
        assert_eq!(forest[0].children[0].children[0].branch.branch_label, "Canton");
    }

    #[test]
    fn build_forest_keeps_sibling_order() {
        let root = branch("Root", None, 1, 6);
        let a = branch("A", Some(root.branch_id), 2, 3);
        let b = branch("B", Some(root.branch_id), 4, 5);

        let forest = build_forest(vec![root, a, b]);

        assert_eq!(forest[0].children.len(), 2);
        assert_eq!(forest[0].children[0].branch.branch_label, "A");
        assert_eq!(forest[0].children[1].branch.branch_label, "B");
    }

    #[test]
    fn build_forest_handles_multiple_roots() {
        let r1 = branch("East", None, 1, 2);
        let r2 = branch("West", None, 3, 4);

        let forest = build_forest(vec![r1, r2]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].branch.branch_label, "East");
        assert_eq!(forest[1].branch.branch_label, "West");
    }
}
