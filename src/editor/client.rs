use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::authz::{PermissionSet, Role, RolePermissionStore, SaveRolePermissions};
use crate::errors::AppError;
use crate::models::role_permission::{
    RolePermissionsResponse, SaveRolePermissionsRequest, SaveRolePermissionsResponse,
};

/// Failure of a permission store round-trip, classified by what the editor
/// should tell the operator. The message is the server's, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn message(&self) -> &str {
        match self {
            ClientError::Forbidden(m)
            | ClientError::Invalid(m)
            | ClientError::Conflict(m)
            | ClientError::Unavailable(m)
            | ClientError::Transport(m) => m,
        }
    }

    fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ClientError::Forbidden(message),
            StatusCode::BAD_REQUEST => ClientError::Invalid(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            _ => ClientError::Unavailable(message),
        }
    }
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        let message = err.to_string();
        match err {
            AppError::Forbidden(_) | AppError::Unauthorized(_) | AppError::Token(_) => {
                ClientError::Forbidden(message)
            }
            AppError::BadRequest(_) | AppError::NotFound(_) => ClientError::Invalid(message),
            AppError::Conflict(_) => ClientError::Conflict(message),
            AppError::Store(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                ClientError::Unavailable(message)
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Permissions of one role as last confirmed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub role: Role,
    pub permissions: PermissionSet,
    pub version: i64,
}

/// A full proposal for one role, based on `expected_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub role: Role,
    pub permissions: PermissionSet,
    pub expected_version: i64,
    pub caller_role: Role,
    pub updated_by: Option<String>,
}

#[async_trait]
pub trait RolePermissionsClient: Send + Sync {
    async fn fetch(&self, role: Role) -> Result<Snapshot, ClientError>;
    async fn save(&self, request: &SaveRequest) -> Result<Snapshot, ClientError>;
}

/// Talks to `/api/role-permissions` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRolePermissionsClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRolePermissionsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Sends `token` as a bearer credential so the server can pin the caller role.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/role-permissions", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn error_from_response(resp: reqwest::Response) -> ClientError {
    let status = resp.status();
    let message = match resp.json::<Value>().await {
        Ok(body) => body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {status}")),
        Err(_) => format!("request failed with status {status}"),
    };
    ClientError::from_status(status, message)
}

#[async_trait]
impl RolePermissionsClient for HttpRolePermissionsClient {
    async fn fetch(&self, role: Role) -> Result<Snapshot, ClientError> {
        let resp = self
            .authorize(self.http.get(self.endpoint()).query(&[("role", role.as_str())]))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        let body: RolePermissionsResponse = resp.json().await?;
        Ok(Snapshot {
            role: body.role,
            permissions: body.permissions,
            version: body.version,
        })
    }

    async fn save(&self, request: &SaveRequest) -> Result<Snapshot, ClientError> {
        let body = SaveRolePermissionsRequest {
            role: request.role.to_string(),
            permissions: request.permissions.to_json_map(),
            admin_role: Some(request.caller_role.to_string()),
            expected_version: Some(request.expected_version),
            updated_by: request.updated_by.clone(),
        };

        let resp = self
            .authorize(self.http.post(self.endpoint()).json(&body))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        let body: SaveRolePermissionsResponse = resp.json().await?;
        Ok(Snapshot {
            role: body.role,
            permissions: body.permissions,
            version: body.version,
        })
    }
}

#[async_trait]
impl RolePermissionsClient for RolePermissionStore {
    async fn fetch(&self, role: Role) -> Result<Snapshot, ClientError> {
        let current = self.get(role).await?;
        Ok(Snapshot {
            role,
            permissions: current.permissions,
            version: current.version,
        })
    }

    async fn save(&self, request: &SaveRequest) -> Result<Snapshot, ClientError> {
        let saved = RolePermissionStore::save(
            self,
            SaveRolePermissions {
                role: request.role,
                permissions: request.permissions.to_json_map(),
                caller_role: Some(request.caller_role),
                expected_version: Some(request.expected_version),
                updated_by: request.updated_by.clone(),
            },
        )
        .await?;

        Ok(Snapshot {
            role: saved.role,
            permissions: saved.permissions,
            version: saved.version,
        })
    }
}
