//! Permission model - named capabilities with scoping rules and
//! prerequisite gates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How far a permission's authority extends down the branch tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopingRule {
    Global,
    BranchOnly,
    BranchAndChildren,
}

impl ScopingRule {
    pub fn code(&self) -> &'static str {
        match self {
            ScopingRule::Global => "global",
            ScopingRule::BranchOnly => "branch_only",
            ScopingRule::BranchAndChildren => "branch_and_children",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "global" => Some(ScopingRule::Global),
            "branch_only" => Some(ScopingRule::BranchOnly),
            "branch_and_children" => Some(ScopingRule::BranchAndChildren),
            _ => None,
        }
    }
}

/// Permission entity (global catalog, not branch-scoped).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
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

impl Permission {
    /// Create a new permission with no prerequisite gates.
    pub fn new(permission_name: String, scoping_rule: ScopingRule) -> Self {
        Self {
            permission_id: Uuid::new_v4(),
            permission_name,
            scoping_rule_code: scoping_rule.code().to_string(),
            requires_active_membership: false,
            requires_background_check: false,
            min_age: 0,
            requires_warrant: false,
            is_super_user: false,
            created_utc: Utc::now(),
        }
    }

    /// Parsed scoping rule. None for an unrecognized stored code, which
    /// the evaluator treats as a denial.
    pub fn scoping_rule(&self) -> Option<ScopingRule> {
        ScopingRule::from_code(&self.scoping_rule_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoping_rule_round_trip() {
        for rule in [
            ScopingRule::Global,
            ScopingRule::BranchOnly,
            ScopingRule::BranchAndChildren,
        ] {
            assert_eq!(ScopingRule::from_code(rule.code()), Some(rule));
        }
    }

    #[test]
    fn test_unknown_code_is_none() {
        assert_eq!(ScopingRule::from_code("kingdom_wide"), None);
        let mut perm = Permission::new("Test".to_string(), ScopingRule::Global);
        perm.scoping_rule_code = "bogus".to_string();
        assert!(perm.scoping_rule().is_none());
    }
}
