//! Role model - named permission bundles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role entity. System roles are seeded at startup and cannot be deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub role_label: String,
    pub is_system: bool,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new non-system role.
    pub fn new(role_label: String) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            role_label,
            is_system: false,
            created_utc: Utc::now(),
        }
    }
}

/// Role permission mapping.
#[derive(Debug, Clone, FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}
