use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};

use crate::errors::AppError;

pub const CONFIRMATION_CODE_LEN: usize = 6;

/// Six random decimal digits, zero padded.
pub fn generate_confirmation_code() -> String {
    let value = OsRng.next_u32() % 10u32.pow(CONFIRMATION_CODE_LEN as u32);
    format!("{value:0width$}", width = CONFIRMATION_CODE_LEN)
}

pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash secret: {err}")))
}

pub fn verify_secret(secret: &str, secret_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(secret_hash)
        .map_err(|err| AppError::internal(format!("invalid secret hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}
