//! Warrant models - batch approval rosters and their individual warrants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Roster lifecycle state. Approved and declined are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterState {
    Pending,
    Approved,
    Declined,
}

impl RosterState {
    pub fn code(&self) -> &'static str {
        match self {
            RosterState::Pending => "pending",
            RosterState::Approved => "approved",
            RosterState::Declined => "declined",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pending" => Some(RosterState::Pending),
            "approved" => Some(RosterState::Approved),
            "declined" => Some(RosterState::Declined),
            _ => None,
        }
    }
}

/// Warrant lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarrantState {
    Pending,
    Active,
    Declined,
    Revoked,
}

impl WarrantState {
    pub fn code(&self) -> &'static str {
        match self {
            WarrantState::Pending => "pending",
            WarrantState::Active => "active",
            WarrantState::Declined => "declined",
            WarrantState::Revoked => "revoked",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "pending" => Some(WarrantState::Pending),
            "active" => Some(WarrantState::Active),
            "declined" => Some(WarrantState::Declined),
            "revoked" => Some(WarrantState::Revoked),
            _ => None,
        }
    }
}

/// Warrant roster entity - a batch of pending grants awaiting N
/// independent approvals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WarrantRoster {
    pub roster_id: Uuid,
    pub roster_label: String,
    pub approvals_required: i32,
    pub approval_count: i32,
    pub roster_state_code: String,
    pub planned_start_on: DateTime<Utc>,
    pub planned_expires_on: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl WarrantRoster {
    pub fn new(
        roster_label: String,
        approvals_required: i32,
        planned_start_on: DateTime<Utc>,
        planned_expires_on: DateTime<Utc>,
    ) -> Self {
        Self {
            roster_id: Uuid::new_v4(),
            roster_label,
            approvals_required,
            approval_count: 0,
            roster_state_code: RosterState::Pending.code().to_string(),
            planned_start_on,
            planned_expires_on,
            created_utc: Utc::now(),
        }
    }

    pub fn state(&self) -> Option<RosterState> {
        RosterState::from_code(&self.roster_state_code)
    }

    pub fn is_pending(&self) -> bool {
        self.state() == Some(RosterState::Pending)
    }

    /// Whether `approval_count` approvals meet the threshold. The roster
    /// transitions to approved exactly when the count reaches the
    /// requirement, never before.
    pub fn meets_threshold(&self) -> bool {
        self.approval_count >= self.approvals_required
    }
}

/// Individual warrant entity, tied to its roster. Mirrors the grant
/// lifecycle once activated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Warrant {
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

impl Warrant {
    pub fn new(roster_id: Uuid, member_id: Uuid, role_id: Uuid, branch_id: Option<Uuid>) -> Self {
        Self {
            warrant_id: Uuid::new_v4(),
            roster_id,
            member_id,
            role_id,
            branch_id,
            warrant_state_code: WarrantState::Pending.code().to_string(),
            start_on: None,
            expires_on: None,
            revoked_on: None,
            revoker_member_id: None,
            revoked_reason: None,
            created_utc: Utc::now(),
        }
    }

    pub fn state(&self) -> Option<WarrantState> {
        WarrantState::from_code(&self.warrant_state_code)
    }
}

/// One approval row per approver per roster.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WarrantRosterApproval {
    pub roster_id: Uuid,
    pub approver_member_id: Uuid,
    pub approved_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(required: i32) -> WarrantRoster {
        WarrantRoster::new(
            "Winter Marshals".to_string(),
            required,
            Utc::now(),
            Utc::now() + chrono::Duration::days(365),
        )
    }

    #[test]
    fn test_threshold_reached_exactly_at_required() {
        let mut r = roster(3);
        for count in 0..3 {
            r.approval_count = count;
            assert!(!r.meets_threshold());
        }
        r.approval_count = 3;
        assert!(r.meets_threshold());
    }

    #[test]
    fn test_new_roster_is_pending() {
        let r = roster(2);
        assert!(r.is_pending());
        assert_eq!(r.state(), Some(RosterState::Pending));
    }

    #[test]
    fn test_state_codes_round_trip() {
        for s in [RosterState::Pending, RosterState::Approved, RosterState::Declined] {
            assert_eq!(RosterState::from_code(s.code()), Some(s));
        }
        for s in [
            WarrantState::Pending,
            WarrantState::Active,
            WarrantState::Declined,
            WarrantState::Revoked,
        ] {
            assert_eq!(WarrantState::from_code(s.code()), Some(s));
        }
    }
}
