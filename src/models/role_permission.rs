use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};

use crate::authz::{PermissionSet, Role};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoleQuery {
    /// One of `super_admin`, `admin`, `support`
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRolePermissionsRequest {
    #[schema(example = "support")]
    pub role: String,
    /// Every permission key mapped to a boolean
    #[schema(value_type = Object)]
    pub permissions: Map<String, Value>,
    /// Role claimed by the caller
    #[schema(example = "super_admin")]
    pub admin_role: Option<String>,
    /// Version the proposal was based on; stale versions are rejected with 409
    pub expected_version: Option<i64>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionsResponse {
    pub success: bool,
    pub role: Role,
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
    pub version: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRolePermissionsResponse {
    pub success: bool,
    pub message: String,
    pub role: Role,
    #[schema(value_type = Object)]
    pub permissions: PermissionSet,
    pub version: i64,
}
