//! PostgreSQL database service.
//!
//! Runtime-checked sqlx queries, grouped per entity. Tree mutations and
//! the warrant approval workflow run inside transactions; everything else
//! is a single statement.

use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use sqlx::Postgres;
use uuid::Uuid;

use crate::models::{
    Branch, Member, MemberRoleGrant, Permission, Role, RosterState, ScopingRule, Warrant,
    WarrantRoster, WarrantRosterApproval, WarrantState,
};
use crate::services::authz::{BranchBounds, GrantContext, MemberAuthContext};
use crate::services::nested_set::{self, AdjacencyRow};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!(e))
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    // ==================== Branch Operations ====================

    /// Find branch by ID.
    pub async fn find_branch_by_id(&self, branch_id: Uuid) -> Result<Option<Branch>, AppError> {
        sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE branch_id = $1")
            .bind(branch_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Find branch by its unique label.
    pub async fn find_branch_by_label(&self, label: &str) -> Result<Option<Branch>, AppError> {
        sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE branch_label = $1")
            .bind(label)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// List all branches in tree order.
    pub async fn list_branches(&self) -> Result<Vec<Branch>, AppError> {
        sqlx::query_as::<_, Branch>("SELECT * FROM branches ORDER BY lft")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Insert a branch and renumber the tree in one transaction.
    pub async fn insert_branch(&self, branch: &Branch) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Placeholder bounds past the end of the current numbering keep
        // the lft < rght check satisfied until the renumber below.
        let max_rght: Option<i32> = sqlx::query_scalar("SELECT MAX(rght) FROM branches")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        let base = max_rght.unwrap_or(0);

        sqlx::query(
            r#"
            INSERT INTO branches
                (branch_id, branch_label, branch_type_code, parent_branch_id,
                 lft, rght, active_flag, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(branch.branch_id)
        .bind(&branch.branch_label)
        .bind(&branch.branch_type_code)
        .bind(branch.parent_branch_id)
        .bind(base + 1)
        .bind(base + 2)
        .bind(branch.active_flag)
        .bind(branch.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::Conflict(anyhow::anyhow!("Branch label already exists"))
            } else {
                db_err(e)
            }
        })?;

        Self::renumber_tree(&mut tx).await?;
        tx.commit().await.map_err(db_err)
    }

    /// Update a branch's label, type, or active flag.
    pub async fn update_branch(
        &self,
        branch_id: Uuid,
        branch_label: Option<&str>,
        branch_type_code: Option<&str>,
        active_flag: Option<bool>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE branches
            SET branch_label = COALESCE($2, branch_label),
                branch_type_code = COALESCE($3, branch_type_code),
                active_flag = COALESCE($4, active_flag)
            WHERE branch_id = $1
            "#,
        )
        .bind(branch_id)
        .bind(branch_label)
        .bind(branch_type_code)
        .bind(active_flag)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Reparent a branch and renumber. Rejects moves that would place a
    /// branch under its own descendant, which is how cycles would form.
    pub async fn move_branch(
        &self,
        branch_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let branch =
            sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE branch_id = $1 FOR UPDATE")
                .bind(branch_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

        if let Some(parent_id) = new_parent_id {
            let parent = sqlx::query_as::<_, Branch>(
                "SELECT * FROM branches WHERE branch_id = $1 FOR UPDATE",
            )
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Parent branch not found")))?;

            if parent.is_descendant_or_self(&branch) {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cannot move a branch under its own subtree"
                )));
            }
        }

        sqlx::query("UPDATE branches SET parent_branch_id = $2 WHERE branch_id = $1")
            .bind(branch_id)
            .bind(new_parent_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        Self::renumber_tree(&mut tx).await?;
        tx.commit().await.map_err(db_err)
    }

    /// Delete a leaf branch and renumber. Interior branches and branches
    /// still referenced by grants or warrants are refused.
    pub async fn delete_branch(&self, branch_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let branch =
            sqlx::query_as::<_, Branch>("SELECT * FROM branches WHERE branch_id = $1 FOR UPDATE")
                .bind(branch_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Branch not found")))?;

        if branch.subtree_size() > 1 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Branch has child branches; move or delete them first"
            )));
        }

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM member_role_grants WHERE branch_id = $1)
                 + (SELECT COUNT(*) FROM warrants WHERE branch_id = $1)
            "#,
        )
        .bind(branch_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if references > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Branch is referenced by grants or warrants"
            )));
        }

        sqlx::query("DELETE FROM branches WHERE branch_id = $1")
            .bind(branch_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        Self::renumber_tree(&mut tx).await?;
        tx.commit().await.map_err(db_err)
    }

    /// Descendants of a branch (excluding itself), in tree order.
    pub async fn find_branch_descendants(&self, branch_id: Uuid) -> Result<Vec<Branch>, AppError> {
        sqlx::query_as::<_, Branch>(
            r#"
            SELECT d.* FROM branches d
            JOIN branches a ON a.branch_id = $1
            WHERE d.lft > a.lft AND d.rght < a.rght
            ORDER BY d.lft
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Ancestors of a branch from root downward (excluding itself).
    pub async fn find_branch_ancestors(&self, branch_id: Uuid) -> Result<Vec<Branch>, AppError> {
        sqlx::query_as::<_, Branch>(
            r#"
            SELECT a.* FROM branches a
            JOIN branches d ON d.branch_id = $1
            WHERE a.lft < d.lft AND a.rght > d.rght
            ORDER BY a.lft
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Recompute every branch's nested-set bounds from parent adjacency.
    /// Runs inside the caller's transaction so a failed renumber rolls the
    /// whole mutation back.
    async fn renumber_tree(tx: &mut sqlx::Transaction<'_, Postgres>) -> Result<(), AppError> {
        let rows: Vec<(Uuid, Option<Uuid>)> = sqlx::query_as(
            "SELECT branch_id, parent_branch_id FROM branches ORDER BY lft, created_utc",
        )
        .fetch_all(&mut **tx)
        .await
        .map_err(db_err)?;

        let adjacency: Vec<AdjacencyRow> = rows
            .into_iter()
            .map(|(id, parent_id)| AdjacencyRow { id, parent_id })
            .collect();

        let numbered = nested_set::number_tree(&adjacency)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Tree renumber failed: {}", e)))?;

        // Shift out of the live range first so the lft < rght check never
        // observes a half-applied numbering.
        sqlx::query("UPDATE branches SET lft = lft + 1000000, rght = rght + 1000000")
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;

        for node in &numbered {
            sqlx::query("UPDATE branches SET lft = $2, rght = $3 WHERE branch_id = $1")
                .bind(node.id)
                .bind(node.lft)
                .bind(node.rght)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }

        Ok(())
    }

    // ==================== Member Operations ====================

    /// Insert a new member.
    pub async fn insert_member(&self, member: &Member) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO members
                (member_id, display_name, email, membership_expires_on,
                 background_check_expires_on, birth_year, birth_month,
                 active_flag, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(member.member_id)
        .bind(&member.display_name)
        .bind(&member.email)
        .bind(member.membership_expires_on)
        .bind(member.background_check_expires_on)
        .bind(member.birth_year)
        .bind(member.birth_month)
        .bind(member.active_flag)
        .bind(member.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    /// Find member by ID.
    pub async fn find_member_by_id(&self, member_id: Uuid) -> Result<Option<Member>, AppError> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE member_id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// List members ordered by display name.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY display_name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Update the mutable member fields.
    pub async fn update_member(&self, member: &Member) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE members
            SET display_name = $2,
                membership_expires_on = $3,
                background_check_expires_on = $4,
                birth_year = $5,
                birth_month = $6,
                active_flag = $7
            WHERE member_id = $1
            "#,
        )
        .bind(member.member_id)
        .bind(&member.display_name)
        .bind(member.membership_expires_on)
        .bind(member.background_check_expires_on)
        .bind(member.birth_year)
        .bind(member.birth_month)
        .bind(member.active_flag)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ==================== Permission Operations ====================

    /// Insert a new permission.
    pub async fn insert_permission(&self, permission: &Permission) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO permissions
                (permission_id, permission_name, scoping_rule_code,
                 requires_active_membership, requires_background_check,
                 min_age, requires_warrant, is_super_user, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(permission.permission_id)
        .bind(&permission.permission_name)
        .bind(&permission.scoping_rule_code)
        .bind(permission.requires_active_membership)
        .bind(permission.requires_background_check)
        .bind(permission.min_age)
        .bind(permission.requires_warrant)
        .bind(permission.is_super_user)
        .bind(permission.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::Conflict(anyhow::anyhow!("Permission name already exists"))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    /// Find permission by ID.
    pub async fn find_permission_by_id(
        &self,
        permission_id: Uuid,
    ) -> Result<Option<Permission>, AppError> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE permission_id = $1")
            .bind(permission_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Find permission by its unique name.
    pub async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Permission>, AppError> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE permission_name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// List all permissions.
    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY permission_name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    // ==================== Role Operations ====================

    /// Insert a new role.
    pub async fn insert_role(&self, role: &Role) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO roles (role_id, role_label, is_system, created_utc) VALUES ($1, $2, $3, $4)",
        )
        .bind(role.role_id)
        .bind(&role.role_label)
        .bind(role.is_system)
        .bind(role.created_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::Conflict(anyhow::anyhow!("Role label already exists"))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    /// Find role by ID.
    pub async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Find role by its unique label.
    pub async fn find_role_by_label(&self, label: &str) -> Result<Option<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_label = $1")
            .bind(label)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// List all roles.
    pub async fn list_roles(&self) -> Result<Vec<Role>, AppError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY role_label")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Delete a role. System roles and roles still referenced by grants
    /// or warrants are refused by the handler/database respectively.
    pub async fn delete_role(&self, role_id: Uuid) -> Result<(), AppError> {
        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM member_role_grants WHERE role_id = $1)
                 + (SELECT COUNT(*) FROM warrants WHERE role_id = $1)
            "#,
        )
        .bind(role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        if references > 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Role is referenced by grants or warrants"
            )));
        }

        sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Attach a permission to a role. Idempotent.
    pub async fn attach_permission_to_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Detach a permission from a role.
    pub async fn detach_permission_from_role(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Permissions bundled in a role.
    pub async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.* FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.permission_name
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    // ==================== Grant Operations ====================

    /// Insert a member-role grant.
    pub async fn insert_grant(&self, grant: &MemberRoleGrant) -> Result<(), AppError> {
        Self::insert_grant_on(&self.pool, grant).await
    }

    async fn insert_grant_on<'e, E>(executor: E, grant: &MemberRoleGrant) -> Result<(), AppError>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO member_role_grants
                (grant_id, member_id, role_id, branch_id, start_on, expires_on,
                 entity_type_code, entity_id, approver_member_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(grant.grant_id)
        .bind(grant.member_id)
        .bind(grant.role_id)
        .bind(grant.branch_id)
        .bind(grant.start_on)
        .bind(grant.expires_on)
        .bind(&grant.entity_type_code)
        .bind(grant.entity_id)
        .bind(grant.approver_member_id)
        .bind(grant.created_utc)
        .execute(executor)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Find grant by ID.
    pub async fn find_grant_by_id(
        &self,
        grant_id: Uuid,
    ) -> Result<Option<MemberRoleGrant>, AppError> {
        sqlx::query_as::<_, MemberRoleGrant>("SELECT * FROM member_role_grants WHERE grant_id = $1")
            .bind(grant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// All grants ever issued to a member, newest first.
    pub async fn list_grants_for_member(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<MemberRoleGrant>, AppError> {
        sqlx::query_as::<_, MemberRoleGrant>(
            "SELECT * FROM member_role_grants WHERE member_id = $1 ORDER BY created_utc DESC",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Grants active at `now` for a member.
    pub async fn find_active_grants_for_member(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemberRoleGrant>, AppError> {
        sqlx::query_as::<_, MemberRoleGrant>(
            r#"
            SELECT * FROM member_role_grants
            WHERE member_id = $1
              AND start_on <= $2
              AND (expires_on IS NULL OR expires_on > $2)
            "#,
        )
        .bind(member_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Soft-revoke a grant by closing its window at `now`. The row stays
    /// for the audit trail.
    pub async fn expire_grant(&self, grant_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
        // GREATEST keeps start_on <= expires_on for grants that have not
        // started yet; they collapse to a zero-length window.
        let result = sqlx::query(
            r#"
            UPDATE member_role_grants
            SET expires_on = GREATEST(start_on, $2)
            WHERE grant_id = $1
              AND (expires_on IS NULL OR expires_on > $2)
            "#,
        )
        .bind(grant_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Grant not found or already expired"
            )));
        }
        Ok(())
    }

    // ==================== Warrant Operations ====================

    /// Insert a roster together with its constituent warrants.
    pub async fn create_roster(
        &self,
        roster: &WarrantRoster,
        warrants: &[Warrant],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO warrant_rosters
                (roster_id, roster_label, approvals_required, approval_count,
                 roster_state_code, planned_start_on, planned_expires_on, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(roster.roster_id)
        .bind(&roster.roster_label)
        .bind(roster.approvals_required)
        .bind(roster.approval_count)
        .bind(&roster.roster_state_code)
        .bind(roster.planned_start_on)
        .bind(roster.planned_expires_on)
        .bind(roster.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for warrant in warrants {
            sqlx::query(
                r#"
                INSERT INTO warrants
                    (warrant_id, roster_id, member_id, role_id, branch_id,
                     warrant_state_code, created_utc)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(warrant.warrant_id)
            .bind(warrant.roster_id)
            .bind(warrant.member_id)
            .bind(warrant.role_id)
            .bind(warrant.branch_id)
            .bind(&warrant.warrant_state_code)
            .bind(warrant.created_utc)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    /// Find roster by ID.
    pub async fn find_roster_by_id(
        &self,
        roster_id: Uuid,
    ) -> Result<Option<WarrantRoster>, AppError> {
        sqlx::query_as::<_, WarrantRoster>("SELECT * FROM warrant_rosters WHERE roster_id = $1")
            .bind(roster_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// List rosters, newest first.
    pub async fn list_rosters(&self) -> Result<Vec<WarrantRoster>, AppError> {
        sqlx::query_as::<_, WarrantRoster>(
            "SELECT * FROM warrant_rosters ORDER BY created_utc DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Warrants belonging to a roster.
    pub async fn list_roster_warrants(&self, roster_id: Uuid) -> Result<Vec<Warrant>, AppError> {
        sqlx::query_as::<_, Warrant>(
            "SELECT * FROM warrants WHERE roster_id = $1 ORDER BY created_utc",
        )
        .bind(roster_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Find warrant by ID.
    pub async fn find_warrant_by_id(&self, warrant_id: Uuid) -> Result<Option<Warrant>, AppError> {
        sqlx::query_as::<_, Warrant>("SELECT * FROM warrants WHERE warrant_id = $1")
            .bind(warrant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    /// Approvals recorded for a roster.
    pub async fn list_roster_approvals(
        &self,
        roster_id: Uuid,
    ) -> Result<Vec<WarrantRosterApproval>, AppError> {
        sqlx::query_as::<_, WarrantRosterApproval>(
            "SELECT * FROM warrant_roster_approvals WHERE roster_id = $1 ORDER BY approved_utc",
        )
        .bind(roster_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)
    }

    /// Record one approval and, when the threshold is met, transition the
    /// roster to approved and activate its warrants.
    ///
    /// The whole sequence is a single transaction keyed on the roster row
    /// lock: concurrent approvals serialize, the composite primary key on
    /// the approvals table rejects a repeat approver, and the counter is
    /// bumped by an atomic UPDATE guarded on the pending state. Exactly
    /// one approval can observe `approval_count == approvals_required`.
    pub async fn approve_roster(
        &self,
        roster_id: Uuid,
        approver_member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WarrantRoster, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let roster = sqlx::query_as::<_, WarrantRoster>(
            "SELECT * FROM warrant_rosters WHERE roster_id = $1 FOR UPDATE",
        )
        .bind(roster_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant roster not found")))?;

        if !roster.is_pending() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Roster is no longer pending"
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO warrant_roster_approvals (roster_id, approver_member_id, approved_utc)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(roster_id)
        .bind(approver_member_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::Conflict(anyhow::anyhow!("Member has already approved this roster"))
            } else {
                db_err(e)
            }
        })?;

        let (approval_count, approvals_required): (i32, i32) = sqlx::query_as(
            r#"
            UPDATE warrant_rosters
            SET approval_count = approval_count + 1
            WHERE roster_id = $1 AND roster_state_code = 'pending'
            RETURNING approval_count, approvals_required
            "#,
        )
        .bind(roster_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if approval_count >= approvals_required {
            Self::activate_roster(&mut tx, &roster, approver_member_id, now).await?;
        }

        tx.commit().await.map_err(db_err)?;

        self.find_roster_by_id(roster_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant roster not found")))
    }

    /// Transition an approved roster's warrants to active and issue the
    /// corresponding member-role grants.
    async fn activate_roster(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        roster: &WarrantRoster,
        final_approver: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE warrant_rosters SET roster_state_code = $2 WHERE roster_id = $1",
        )
        .bind(roster.roster_id)
        .bind(RosterState::Approved.code())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;

        // A roster approved after its planned window has elapsed still
        // transitions to approved; the clamp collapses the grant to a
        // zero-length window that is never active.
        let start_on = roster.planned_start_on.max(now);
        let expires_on = roster.planned_expires_on.max(start_on);
        let pending: Vec<Warrant> = sqlx::query_as::<_, Warrant>(
            "SELECT * FROM warrants WHERE roster_id = $1 AND warrant_state_code = $2",
        )
        .bind(roster.roster_id)
        .bind(WarrantState::Pending.code())
        .fetch_all(&mut **tx)
        .await
        .map_err(db_err)?;

        for warrant in &pending {
            sqlx::query(
                r#"
                UPDATE warrants
                SET warrant_state_code = $2, start_on = $3, expires_on = $4
                WHERE warrant_id = $1
                "#,
            )
            .bind(warrant.warrant_id)
            .bind(WarrantState::Active.code())
            .bind(start_on)
            .bind(expires_on)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;

            let grant = MemberRoleGrant::new_from_warrant(
                warrant.member_id,
                warrant.role_id,
                warrant.branch_id,
                warrant.warrant_id,
                final_approver,
                start_on,
                expires_on,
            );
            Self::insert_grant_on(&mut **tx, &grant).await?;
        }

        tracing::info!(
            roster_id = %roster.roster_id,
            warrants = pending.len(),
            "Warrant roster approved and activated"
        );
        Ok(())
    }

    /// Decline a pending roster; its pending warrants follow.
    pub async fn decline_roster(&self, roster_id: Uuid) -> Result<WarrantRoster, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let declined = sqlx::query(
            r#"
            UPDATE warrant_rosters
            SET roster_state_code = $2
            WHERE roster_id = $1 AND roster_state_code = 'pending'
            "#,
        )
        .bind(roster_id)
        .bind(RosterState::Declined.code())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if declined.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Roster not found or no longer pending"
            )));
        }

        sqlx::query(
            r#"
            UPDATE warrants
            SET warrant_state_code = $2
            WHERE roster_id = $1 AND warrant_state_code = $3
            "#,
        )
        .bind(roster_id)
        .bind(WarrantState::Declined.code())
        .bind(WarrantState::Pending.code())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        self.find_roster_by_id(roster_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant roster not found")))
    }

    /// Administratively revoke an active warrant and expire its grant.
    /// Acts on the individual warrant, never on the roster.
    pub async fn revoke_warrant(
        &self,
        warrant_id: Uuid,
        revoker_member_id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Warrant, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let revoked = sqlx::query(
            r#"
            UPDATE warrants
            SET warrant_state_code = $2, revoked_on = $3,
                revoker_member_id = $4, revoked_reason = $5
            WHERE warrant_id = $1 AND warrant_state_code = $6
            "#,
        )
        .bind(warrant_id)
        .bind(WarrantState::Revoked.code())
        .bind(now)
        .bind(revoker_member_id)
        .bind(reason)
        .bind(WarrantState::Active.code())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if revoked.rows_affected() == 0 {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Warrant not found or not active"
            )));
        }

        sqlx::query(
            r#"
            UPDATE member_role_grants
            SET expires_on = GREATEST(start_on, $2)
            WHERE entity_type_code = 'warrant' AND entity_id = $1
              AND (expires_on IS NULL OR expires_on > $2)
            "#,
        )
        .bind(warrant_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        self.find_warrant_by_id(warrant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Warrant not found")))
    }

    // ==================== Authorization Context ====================

    /// Nested-set bounds for a branch.
    pub async fn load_branch_bounds(
        &self,
        branch_id: Uuid,
    ) -> Result<Option<BranchBounds>, AppError> {
        let row: Option<(Uuid, i32, i32)> =
            sqlx::query_as("SELECT branch_id, lft, rght FROM branches WHERE branch_id = $1")
                .bind(branch_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(row.map(|(branch_id, lft, rght)| BranchBounds {
            branch_id,
            lft,
            rght,
        }))
    }

    /// Assemble everything the kernel needs to decide for one member:
    /// the member snapshot plus each active grant expanded to its role's
    /// permission set and its branch bounds.
    pub async fn load_member_auth_context(
        &self,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<MemberAuthContext>, AppError> {
        let Some(member) = self.find_member_by_id(member_id).await? else {
            return Ok(None);
        };

        let active = self.find_active_grants_for_member(member_id, now).await?;

        let mut grants = Vec::with_capacity(active.len());
        for grant in active {
            let branch = match grant.branch_id {
                Some(branch_id) => self.load_branch_bounds(branch_id).await?,
                None => None,
            };
            let permissions = self.get_role_permissions(grant.role_id).await?;
            grants.push(GrantContext {
                grant_id: grant.grant_id,
                source: grant.source(),
                branch,
                start_on: grant.start_on,
                expires_on: grant.expires_on,
                permissions,
            });
        }

        Ok(Some(MemberAuthContext { member, grants }))
    }

    // ==================== Seed Data ====================

    /// Seed the super-user permission and the system Admin role.
    /// Idempotent; individual failures are logged and skipped so a flaky
    /// seed never blocks startup.
    pub async fn ensure_seed_data(&self) {
        let super_user = match self.find_permission_by_name("Super User").await {
            Ok(Some(p)) => Some(p),
            Ok(None) => {
                let mut p = Permission::new("Super User".to_string(), ScopingRule::Global);
                p.is_super_user = true;
                match self.insert_permission(&p).await {
                    Ok(()) => {
                        tracing::info!("Seeded permission 'Super User'");
                        Some(p)
                    }
                    Err(e) => {
                        tracing::warn!("Failed to seed permission 'Super User': {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Seed lookup for 'Super User' failed: {}", e);
                None
            }
        };

        let admin = match self.find_role_by_label("Admin").await {
            Ok(Some(r)) => Some(r),
            Ok(None) => {
                let mut r = Role::new("Admin".to_string());
                r.is_system = true;
                match self.insert_role(&r).await {
                    Ok(()) => {
                        tracing::info!("Seeded system role 'Admin'");
                        Some(r)
                    }
                    Err(e) => {
                        tracing::warn!("Failed to seed role 'Admin': {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Seed lookup for role 'Admin' failed: {}", e);
                None
            }
        };

        if let (Some(permission), Some(role)) = (super_user, admin) {
            if let Err(e) = self
                .attach_permission_to_role(role.role_id, permission.permission_id)
                .await
            {
                tracing::warn!("Failed to attach seed permission to 'Admin': {}", e);
            }
        }
    }
}
