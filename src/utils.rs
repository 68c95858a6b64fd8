use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;

use crate::errors::AppError;

const MIN_RECOVERY_CREDENTIAL_LENGTH: usize = 16;

/// Hashes a recovery credential into a PHC string suitable for `RECOVERY_CREDENTIAL_HASH`.
pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    if secret.len() < MIN_RECOVERY_CREDENTIAL_LENGTH {
        return Err(AppError::bad_request(format!(
            "recovery credential must be at least {} characters",
            MIN_RECOVERY_CREDENTIAL_LENGTH
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash secret: {err}")))
}

pub fn verify_secret(secret: &str, secret_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(secret_hash)
        .map_err(|err| AppError::configuration(format!("invalid secret hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}
