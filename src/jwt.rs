use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::access::{cookie_value, SESSION_TOKEN_COOKIE};
use crate::app::AppState;
use crate::authz::Role;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

/// Why a session token could not be accepted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// The token itself is bad: malformed, expired, wrong signature.
    #[error("token rejected: {0}")]
    Rejected(String),
    /// Verification could not run (key material or crypto backend failure).
    #[error("token verification unavailable: {0}")]
    Unavailable(String),
}

impl From<TokenError> for AppError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Rejected(msg) => AppError::token(msg),
            TokenError::Unavailable(msg) => AppError::internal(format!("token verification unavailable: {msg}")),
        }
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    pub fn encode(&self, admin_id: Uuid, role: Role) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: admin_id,
            role: role.as_str().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) | ErrorKind::Crypto(_) => {
                    TokenError::Unavailable(err.to_string())
                }
                _ => TokenError::Rejected(err.to_string()),
            })
    }
}

/// Claims carried by the signed session token.
///
/// `role` stays a string so an unknown role can be told apart from a bad token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// A verified session: token signature, expiry and role claim all checked.
#[derive(Debug, Clone)]
pub struct Session {
    pub admin_id: Uuid,
    pub role: Role,
}

impl Session {
    pub fn from_claims(claims: Claims) -> Result<Self, TokenError> {
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|e| TokenError::Rejected(e.to_string()))?;
        Ok(Session {
            admin_id: claims.sub,
            role,
        })
    }
}

/// Turns a raw session token into a verified [`Session`].
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Session, TokenError>;
}

impl TokenVerifier for JwtConfig {
    fn verify(&self, token: &str) -> Result<Session, TokenError> {
        self.decode(token).and_then(Session::from_claims)
    }
}

/// Reads the session token from `Authorization: Bearer` or the session cookie.
pub fn token_from_parts(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| cookie_value(headers, SESSION_TOKEN_COOKIE))
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let token = token_from_parts(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("session token missing"))?;

        Ok(state.verifier.verify(&token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_keeps_role_claim() {
        let jwt = JwtConfig::new(b"unit-secret".to_vec(), 1);
        let id = Uuid::new_v4();
        let token = jwt.encode(id, Role::Support).unwrap();

        let claims = jwt.decode(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "support");
        let session = Session::from_claims(claims).unwrap();
        assert_eq!(session.role, Role::Support);
    }

    #[test]
    fn wrong_secret_and_garbage_are_rejected() {
        let jwt = JwtConfig::new(b"unit-secret".to_vec(), 1);
        let other = JwtConfig::new(b"other-secret".to_vec(), 1);
        let token = other.encode(Uuid::new_v4(), Role::Admin).unwrap();

        assert!(matches!(jwt.decode(&token), Err(TokenError::Rejected(_))));
        assert!(matches!(jwt.decode("not.a.token"), Err(TokenError::Rejected(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = JwtConfig::new(b"unit-secret".to_vec(), -2);
        let token = jwt.encode(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(matches!(jwt.decode(&token), Err(TokenError::Rejected(_))));
    }

    #[test]
    fn unknown_role_claim_is_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: "owner".into(),
            exp: 0,
            iat: 0,
        };
        assert!(matches!(Session::from_claims(claims), Err(TokenError::Rejected(_))));
    }
}
