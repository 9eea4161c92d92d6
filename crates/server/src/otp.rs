//! One-time verification codes and the argon2 hashing shared with passwords.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::{db::EmailOtp, error::AppError};

/// Six decimal digits, zero padded.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

pub fn hash_secret(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// False on mismatch. A stored hash that fails to parse is an internal error.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

/// What a verification request should do once the OTP row is loaded.
#[derive(Debug, PartialEq, Eq)]
pub enum Gate {
    AlreadyVerified,
    CheckCode,
}

/// Checks that run before a code is compared: verified, then expiry, then the
/// attempt cap. None of them consume an attempt.
pub fn gate(otp: &EmailOtp, now: DateTime<Utc>, max_attempts: i64) -> Result<Gate, AppError> {
    if otp.verified {
        return Ok(Gate::AlreadyVerified);
    }
    if otp.is_expired(now) {
        return Err(AppError::BadRequest(
            "OTP expired. Please request a new code.".to_string(),
        ));
    }
    if otp.attempts >= max_attempts {
        return Err(AppError::TooManyRequests(
            "Too many attempts. Please request a new code.".to_string(),
        ));
    }
    Ok(Gate::CheckCode)
}
