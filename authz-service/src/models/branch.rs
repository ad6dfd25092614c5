//! Branch model - nested-set encoded organizational tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Branch entity. `lft`/`rght` are nested-set bounds maintained by the
/// tree renumbering in the database service; they are never set by callers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub branch_id: Uuid,
    pub branch_label: String,
    pub branch_type_code: String,
    pub parent_branch_id: Option<Uuid>,
    pub lft: i32,
    pub rght: i32,
    pub active_flag: bool,
    pub created_utc: DateTime<Utc>,
}

impl Branch {
    /// Create a new branch with placeholder bounds; the insert path
    /// renumbers the whole tree before the row becomes visible.
    pub fn new(
        branch_label: String,
        branch_type_code: String,
        parent_branch_id: Option<Uuid>,
    ) -> Self {
        Self {
            branch_id: Uuid::new_v4(),
            branch_label,
            branch_type_code,
            parent_branch_id,
            lft: 0,
            rght: 1,
            active_flag: true,
            created_utc: Utc::now(),
        }
    }

    /// Check if this is a root branch.
    pub fn is_root(&self) -> bool {
        self.parent_branch_id.is_none()
    }

    /// Check if this branch sits inside `ancestor`'s subtree (or is it).
    pub fn is_descendant_or_self(&self, ancestor: &Branch) -> bool {
        self.lft >= ancestor.lft && self.rght <= ancestor.rght
    }

    /// Number of nodes in this branch's subtree, itself included.
    pub fn subtree_size(&self) -> i32 {
        (self.rght - self.lft + 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch_with_bounds(lft: i32, rght: i32) -> Branch {
        let mut b = Branch::new("Test".to_string(), "shire".to_string(), None);
        b.lft = lft;
        b.rght = rght;
        b
    }

    #[test]
    fn test_descendant_or_self_is_reflexive() {
        let kingdom = branch_with_bounds(1, 100);
        assert!(kingdom.is_descendant_or_self(&kingdom));
    }

    #[test]
    fn test_shire_is_descendant_of_kingdom() {
        let kingdom = branch_with_bounds(1, 100);
        let shire = branch_with_bounds(10, 20);
        assert!(shire.is_descendant_or_self(&kingdom));
        assert!(!kingdom.is_descendant_or_self(&shire));
    }

    #[test]
    fn test_siblings_are_not_descendants() {
        let barony = branch_with_bounds(2, 9);
        let shire = branch_with_bounds(10, 20);
        assert!(!shire.is_descendant_or_self(&barony));
        assert!(!barony.is_descendant_or_self(&shire));
    }

    #[test]
    fn test_subtree_size() {
        assert_eq!(branch_with_bounds(10, 20).subtree_size(), 5);
        assert_eq!(branch_with_bounds(3, 4).subtree_size(), 1);
    }
}
