//! Member-role grant model - time-bounded member→role→branch assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Provenance of a grant: how the member came to hold the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    Direct,
    Office,
    Warrant,
}

impl GrantSource {
    pub fn code(&self) -> &'static str {
        match self {
            GrantSource::Direct => "direct",
            GrantSource::Office => "office",
            GrantSource::Warrant => "warrant",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "direct" => Some(GrantSource::Direct),
            "office" => Some(GrantSource::Office),
            "warrant" => Some(GrantSource::Warrant),
            _ => None,
        }
    }
}

/// Member-role grant entity. Rows are never deleted; revocation sets
/// `expires_on` so the audit trail survives.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MemberRoleGrant {
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

impl MemberRoleGrant {
    /// Create a direct grant starting now, open-ended.
    pub fn new_direct(
        member_id: Uuid,
        role_id: Uuid,
        branch_id: Option<Uuid>,
        approver_member_id: Option<Uuid>,
    ) -> Self {
        Self {
            grant_id: Uuid::new_v4(),
            member_id,
            role_id,
            branch_id,
            start_on: Utc::now(),
            expires_on: None,
            entity_type_code: GrantSource::Direct.code().to_string(),
            entity_id: None,
            approver_member_id,
            created_utc: Utc::now(),
        }
    }

    /// Create a grant produced by an activated warrant.
    pub fn new_from_warrant(
        member_id: Uuid,
        role_id: Uuid,
        branch_id: Option<Uuid>,
        warrant_id: Uuid,
        approver_member_id: Uuid,
        start_on: DateTime<Utc>,
        expires_on: DateTime<Utc>,
    ) -> Self {
        Self {
            grant_id: Uuid::new_v4(),
            member_id,
            role_id,
            branch_id,
            start_on,
            expires_on: Some(expires_on),
            entity_type_code: GrantSource::Warrant.code().to_string(),
            entity_id: Some(warrant_id),
            approver_member_id: Some(approver_member_id),
            created_utc: Utc::now(),
        }
    }

    /// Active iff `now` falls in the half-open window [start_on, expires_on).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_on <= now && self.expires_on.is_none_or(|end| end > now)
    }

    pub fn source(&self) -> Option<GrantSource> {
        GrantSource::from_code(&self.entity_type_code)
    }
}
