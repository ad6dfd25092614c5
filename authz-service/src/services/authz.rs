//! The authorization kernel.
//!
//! A pure, side-effect-free predicate over a pre-loaded member context.
//! It never errors: every unmet condition resolves to a denial with a
//! reason string. The database service assembles the context; nothing in
//! this module touches I/O, which is what makes the decision table
//! exhaustively testable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{GrantSource, Member, Permission, ScopingRule};

/// Nested-set bounds of a branch, as loaded at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchBounds {
    pub branch_id: Uuid,
    pub lft: i32,
    pub rght: i32,
}

/// `descendant` sits inside `ancestor`'s subtree (or is the same branch).
pub fn is_descendant_or_self(descendant: &BranchBounds, ancestor: &BranchBounds) -> bool {
    descendant.lft >= ancestor.lft && descendant.rght <= ancestor.rght
}

/// One of the member's role grants, expanded to its permission set.
#[derive(Debug, Clone)]
pub struct GrantContext {
    pub grant_id: Uuid,
    pub source: Option<GrantSource>,
    pub branch: Option<BranchBounds>,
    pub start_on: DateTime<Utc>,
    pub expires_on: Option<DateTime<Utc>>,
    pub permissions: Vec<Permission>,
}

impl GrantContext {
    fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_on <= now && self.expires_on.is_none_or(|end| end > now)
    }
}

/// Everything the kernel needs to decide for one member.
#[derive(Debug, Clone)]
pub struct MemberAuthContext {
    pub member: Member,
    pub grants: Vec<GrantContext>,
}

/// Outcome of a single permission check, with provenance when allowed.
#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub permission_name: String,
    pub allowed: bool,
    pub reason: String,
    pub granted_by_grant: Option<Uuid>,
    pub granted_at_branch: Option<Uuid>,
}

impl AccessDecision {
    pub(crate) fn denied(permission_name: &str, reason: &str) -> Self {
        Self {
            permission_name: permission_name.to_string(),
            allowed: false,
            reason: reason.to_string(),
            granted_by_grant: None,
            granted_at_branch: None,
        }
    }

    fn allowed(permission_name: &str, reason: &str, grant: &GrantContext) -> Self {
        Self {
            permission_name: permission_name.to_string(),
            allowed: true,
            reason: reason.to_string(),
            granted_by_grant: Some(grant.grant_id),
            granted_at_branch: grant.branch.map(|b| b.branch_id),
        }
    }
}

/// Decide whether the member may exercise `permission_name` against the
/// target branch at instant `now`.
///
/// Order matters and is fixed: active-grant expansion, permission lookup,
/// super-user shortcut, scoping rule, prerequisite gates.
pub fn evaluate(
    ctx: &MemberAuthContext,
    permission_name: &str,
    target: Option<&BranchBounds>,
    now: DateTime<Utc>,
) -> AccessDecision {
    let today = now.date_naive();
    let active: Vec<&GrantContext> = ctx.grants.iter().filter(|g| g.is_active_at(now)).collect();

    let matched: Vec<(&GrantContext, &Permission)> = active
        .iter()
        .flat_map(|g| {
            g.permissions
                .iter()
                .filter(|p| p.permission_name == permission_name)
                .map(move |p| (*g, p))
        })
        .collect();

    if matched.is_empty() {
        return AccessDecision::denied(permission_name, "No active grant includes this permission");
    }

    // Super-user holders skip scoping and prerequisite gates entirely.
    if let Some(super_grant) = active
        .iter()
        .find(|g| g.permissions.iter().any(|p| p.is_super_user))
    {
        return AccessDecision::allowed(permission_name, "Granted via super user", super_grant);
    }

    let mut denial = "No covering grant for the target branch";

    for (grant, permission) in &matched {
        let covered = match permission.scoping_rule() {
            None => false,
            Some(ScopingRule::Global) => true,
            Some(ScopingRule::BranchOnly) => match (target, grant.branch) {
                (Some(t), Some(b)) => t.branch_id == b.branch_id,
                _ => false,
            },
            Some(ScopingRule::BranchAndChildren) => match (target, grant.branch) {
                (Some(t), Some(b)) => is_descendant_or_self(t, &b),
                _ => false,
            },
        };

        if !covered {
            continue;
        }

        match check_gates(&ctx.member, permission, grant, today) {
            Ok(()) => {
                let reason = match permission.scoping_rule() {
                    Some(ScopingRule::Global) => "Granted globally",
                    Some(ScopingRule::BranchOnly) => "Granted at target branch",
                    Some(ScopingRule::BranchAndChildren) => "Granted via branch subtree",
                    None => unreachable!("covered implies a known scoping rule"),
                };
                return AccessDecision::allowed(permission_name, reason, grant);
            }
            Err(reason) => denial = reason,
        }
    }

    AccessDecision::denied(permission_name, denial)
}

/// Evaluate a batch of permission names against one target.
pub fn evaluate_all(
    ctx: &MemberAuthContext,
    permission_names: &[String],
    target: Option<&BranchBounds>,
    now: DateTime<Utc>,
) -> Vec<AccessDecision> {
    permission_names
        .iter()
        .map(|name| evaluate(ctx, name, target, now))
        .collect()
}

/// Prerequisite gates on the matched permission and covering grant.
fn check_gates(
    member: &Member,
    permission: &Permission,
    grant: &GrantContext,
    today: NaiveDate,
) -> Result<(), &'static str> {
    if permission.requires_active_membership && !member.has_active_membership(today) {
        return Err("Membership is expired or missing");
    }
    if permission.requires_background_check && !member.has_valid_background_check(today) {
        return Err("Background check is expired or missing");
    }
    if permission.min_age > 0 {
        match member.age_on(today) {
            Some(age) if age >= permission.min_age => {}
            Some(_) => return Err("Member is below the minimum age"),
            None => return Err("Member birth date is not on file"),
        }
    }
    if permission.requires_warrant && grant.source != Some(GrantSource::Warrant) {
        return Err("Permission requires a warrant-backed grant");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};

    fn member() -> Member {
        Member::new("Duncan of Axemoor".to_string(), "duncan@example.com".to_string())
    }

    fn bounds(lft: i32, rght: i32) -> BranchBounds {
        BranchBounds {
            branch_id: Uuid::new_v4(),
            lft,
            rght,
        }
    }

    fn permission(name: &str, rule: ScopingRule) -> Permission {
        Permission::new(name.to_string(), rule)
    }

    fn grant(branch: Option<BranchBounds>, permissions: Vec<Permission>) -> GrantContext {
        GrantContext {
            grant_id: Uuid::new_v4(),
            source: Some(GrantSource::Direct),
            branch,
            start_on: Utc::now() - Duration::days(1),
            expires_on: None,
            permissions,
        }
    }

    fn ctx(member: Member, grants: Vec<GrantContext>) -> MemberAuthContext {
        MemberAuthContext { member, grants }
    }

    #[test]
    fn test_no_grant_denies() {
        let c = ctx(member(), vec![]);
        let d = evaluate(&c, "AuthorizeMarshal", None, Utc::now());
        assert!(!d.allowed);
        assert_eq!(d.reason, "No active grant includes this permission");
    }

    #[test]
    fn test_global_permission_allows_without_target() {
        let c = ctx(
            member(),
            vec![grant(None, vec![permission("ViewReports", ScopingRule::Global)])],
        );
        let d = evaluate(&c, "ViewReports", None, Utc::now());
        assert!(d.allowed);
        assert_eq!(d.reason, "Granted globally");
        assert!(d.granted_by_grant.is_some());
    }

    #[test]
    fn test_expired_grant_denies_regardless_of_role_contents() {
        let mut g = grant(None, vec![permission("ViewReports", ScopingRule::Global)]);
        let now = Utc::now();
        g.start_on = now - Duration::days(30);
        g.expires_on = Some(now - Duration::days(1));
        let c = ctx(member(), vec![g]);
        assert!(!evaluate(&c, "ViewReports", None, now).allowed);
    }

    #[test]
    fn test_grant_inactive_exactly_at_expiration_instant() {
        let now = Utc::now();
        let mut g = grant(None, vec![permission("ViewReports", ScopingRule::Global)]);
        g.expires_on = Some(now);
        let c = ctx(member(), vec![g]);
        assert!(!evaluate(&c, "ViewReports", None, now).allowed);
    }

    #[test]
    fn test_not_yet_started_grant_denies() {
        let mut g = grant(None, vec![permission("ViewReports", ScopingRule::Global)]);
        g.start_on = Utc::now() + Duration::days(7);
        let c = ctx(member(), vec![g]);
        assert!(!evaluate(&c, "ViewReports", None, Utc::now()).allowed);
    }

    #[test]
    fn test_branch_only_denies_any_other_branch() {
        let home = bounds(10, 20);
        let other = bounds(30, 40);
        let c = ctx(
            member(),
            vec![grant(
                Some(home),
                vec![permission("ManageRoster", ScopingRule::BranchOnly)],
            )],
        );
        assert!(evaluate(&c, "ManageRoster", Some(&home), Utc::now()).allowed);
        assert!(!evaluate(&c, "ManageRoster", Some(&other), Utc::now()).allowed);
        assert!(!evaluate(&c, "ManageRoster", None, Utc::now()).allowed);
    }

    #[test]
    fn test_branch_and_children_covers_subtree() {
        // The worked example: Kingdom (1,100) covers Shire (10,20).
        let kingdom = bounds(1, 100);
        let shire = bounds(10, 20);
        let outside = bounds(101, 102);
        let c = ctx(
            member(),
            vec![grant(
                Some(kingdom),
                vec![permission("AuthorizeMarshal", ScopingRule::BranchAndChildren)],
            )],
        );
        assert!(evaluate(&c, "AuthorizeMarshal", Some(&shire), Utc::now()).allowed);
        assert!(evaluate(&c, "AuthorizeMarshal", Some(&kingdom), Utc::now()).allowed);
        assert!(!evaluate(&c, "AuthorizeMarshal", Some(&outside), Utc::now()).allowed);
    }

    #[test]
    fn test_subtree_rule_does_not_cover_ancestors() {
        let kingdom = bounds(1, 100);
        let shire = bounds(10, 20);
        let c = ctx(
            member(),
            vec![grant(
                Some(shire),
                vec![permission("AuthorizeMarshal", ScopingRule::BranchAndChildren)],
            )],
        );
        assert!(!evaluate(&c, "AuthorizeMarshal", Some(&kingdom), Utc::now()).allowed);
    }

    #[test]
    fn test_unscoped_grant_fails_branch_scoped_rule() {
        let shire = bounds(10, 20);
        let c = ctx(
            member(),
            vec![grant(None, vec![permission("ManageRoster", ScopingRule::BranchOnly)])],
        );
        assert!(!evaluate(&c, "ManageRoster", Some(&shire), Utc::now()).allowed);
    }

    #[test]
    fn test_unknown_scoping_code_denies() {
        let mut p = permission("ManageRoster", ScopingRule::Global);
        p.scoping_rule_code = "bogus".to_string();
        let c = ctx(member(), vec![grant(None, vec![p])]);
        assert!(!evaluate(&c, "ManageRoster", None, Utc::now()).allowed);
    }

    #[test]
    fn test_super_user_bypasses_scope_and_gates() {
        let shire = bounds(10, 20);
        let mut scoped = permission("ManageRoster", ScopingRule::BranchOnly);
        scoped.requires_active_membership = true;
        let mut sudo = permission("SuperUser", ScopingRule::Global);
        sudo.is_super_user = true;
        // Member has no membership on file and the grant is unscoped, yet
        // the super-user permission in a second grant carries the check.
        let c = ctx(
            member(),
            vec![grant(None, vec![scoped]), grant(None, vec![sudo])],
        );
        let d = evaluate(&c, "ManageRoster", Some(&shire), Utc::now());
        assert!(d.allowed);
        assert_eq!(d.reason, "Granted via super user");
    }

    #[test]
    fn test_super_user_does_not_invent_permissions() {
        let mut sudo = permission("SuperUser", ScopingRule::Global);
        sudo.is_super_user = true;
        let c = ctx(member(), vec![grant(None, vec![sudo])]);
        // The requested name is in no grant's role, so the lookup fails
        // before the super-user shortcut is considered.
        assert!(!evaluate(&c, "ManageRoster", None, Utc::now()).allowed);
    }

    #[test]
    fn test_expired_super_user_grant_is_ignored() {
        let mut sudo = permission("SuperUser", ScopingRule::Global);
        sudo.is_super_user = true;
        let now = Utc::now();
        let mut g = grant(None, vec![sudo, permission("ViewReports", ScopingRule::Global)]);
        g.expires_on = Some(now - Duration::days(1));
        let c = ctx(member(), vec![g]);
        assert!(!evaluate(&c, "ViewReports", None, now).allowed);
    }

    #[test]
    fn test_membership_gate() {
        let mut p = permission("ViewMembers", ScopingRule::Global);
        p.requires_active_membership = true;
        let mut m = member();
        let now = Utc::now();
        let c = ctx(m.clone(), vec![grant(None, vec![p.clone()])]);
        let d = evaluate(&c, "ViewMembers", None, now);
        assert!(!d.allowed);
        assert_eq!(d.reason, "Membership is expired or missing");

        m.membership_expires_on = Some(now.date_naive() + Duration::days(30));
        let c = ctx(m, vec![grant(None, vec![p])]);
        assert!(evaluate(&c, "ViewMembers", None, now).allowed);
    }

    #[test]
    fn test_background_check_gate() {
        let mut p = permission("WorkWithMinors", ScopingRule::Global);
        p.requires_background_check = true;
        let now = Utc::now();
        let mut m = member();
        m.background_check_expires_on = Some(now.date_naive() - Duration::days(1));
        let c = ctx(m, vec![grant(None, vec![p])]);
        let d = evaluate(&c, "WorkWithMinors", None, now);
        assert!(!d.allowed);
        assert_eq!(d.reason, "Background check is expired or missing");
    }

    #[test]
    fn test_min_age_gate() {
        let mut p = permission("AuthorizeCombat", ScopingRule::Global);
        p.min_age = 18;
        let now = Utc::now();
        let today = now.date_naive();

        let mut minor = member();
        minor.birth_year = Some(today.year() - 16);
        minor.birth_month = Some(1);
        let c = ctx(minor, vec![grant(None, vec![p.clone()])]);
        let d = evaluate(&c, "AuthorizeCombat", None, now);
        assert!(!d.allowed);
        assert_eq!(d.reason, "Member is below the minimum age");

        let unknown = member();
        let c = ctx(unknown, vec![grant(None, vec![p.clone()])]);
        let d = evaluate(&c, "AuthorizeCombat", None, now);
        assert!(!d.allowed);
        assert_eq!(d.reason, "Member birth date is not on file");

        let mut adult = member();
        adult.birth_year = Some(today.year() - 30);
        adult.birth_month = Some(1);
        let c = ctx(adult, vec![grant(None, vec![p])]);
        assert!(evaluate(&c, "AuthorizeCombat", None, now).allowed);
    }

    #[test]
    fn test_requires_warrant_gate() {
        let mut p = permission("AuthorizeMarshal", ScopingRule::Global);
        p.requires_warrant = true;

        let direct = grant(None, vec![p.clone()]);
        let c = ctx(member(), vec![direct]);
        let d = evaluate(&c, "AuthorizeMarshal", None, Utc::now());
        assert!(!d.allowed);
        assert_eq!(d.reason, "Permission requires a warrant-backed grant");

        let mut warranted = grant(None, vec![p]);
        warranted.source = Some(GrantSource::Warrant);
        let c = ctx(member(), vec![warranted]);
        assert!(evaluate(&c, "AuthorizeMarshal", None, Utc::now()).allowed);
    }

    #[test]
    fn test_second_grant_can_cover_where_first_fails() {
        let home = bounds(10, 20);
        let p = permission("ManageRoster", ScopingRule::BranchOnly);
        let wrong = grant(Some(bounds(30, 40)), vec![p.clone()]);
        let right = grant(Some(home), vec![p]);
        let c = ctx(member(), vec![wrong, right.clone()]);
        let d = evaluate(&c, "ManageRoster", Some(&home), Utc::now());
        assert!(d.allowed);
        assert_eq!(d.granted_by_grant, Some(right.grant_id));
    }

    #[test]
    fn test_evaluate_all_mixes_decisions() {
        let c = ctx(
            member(),
            vec![grant(None, vec![permission("ViewReports", ScopingRule::Global)])],
        );
        let names = vec!["ViewReports".to_string(), "ManageRoster".to_string()];
        let decisions = evaluate_all(&c, &names, None, Utc::now());
        assert_eq!(decisions.len(), 2);
        assert!(decisions[0].allowed);
        assert!(!decisions[1].allowed);
    }
}
