use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::AppError;
use crate::events::{Loggable, Severity};

/// Admin-portal account as seen by the RBAC subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminIdentity {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for AdminIdentity {
    fn entity_type() -> &'static str { "admin" }
    fn subject_id(&self) -> String { self.id.to_string() }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAdmin {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbAdmin> for AdminIdentity {
    type Error = AppError;

    fn try_from(value: DbAdmin) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id)
            .map_err(|e| AppError::internal(format!("invalid admin id {}: {e}", value.id)))?;

        let role = value.role.parse::<Role>().unwrap_or_else(|_| {
            tracing::warn!(
                admin_id = %id,
                stored_role = %value.role,
                "admin record has an unknown role, treating as admin"
            );
            Role::Admin
        });

        Ok(AdminIdentity {
            id,
            name: value.name,
            email: value.email,
            role,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAdminRoleRequest {
    #[schema(example = "support")]
    pub role: String,
}
