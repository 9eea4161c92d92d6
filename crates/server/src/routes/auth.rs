use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use shared::{
    LoginRequest, LoginResponse, MsgResponse, RegisterRequest, RegisterResponse, ResendOtpRequest,
    ResendOtpResponse, VerifyOtpRequest,
};

use super::extract::ValidJson;
use crate::{
    config::AuthConfig,
    db::{NewUser, User},
    error::AppError,
    mailer::Email,
    otp::{self, Gate},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email = req.email.trim();
    check_email_domain(email, &state.config.auth.allowed_email_domain)?;

    if state.db.get_user_by_email(email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let username = match req.username.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => email.split('@').next().unwrap_or(email).to_string(),
    };
    let password_hash = otp::hash_secret(&req.password)?;

    let user = state
        .db
        .create_user(&NewUser {
            username: &username,
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            email,
            password_hash: &password_hash,
        })
        .await?;
    tracing::info!(user_id = user.id, "User registered: {}", user.email);

    let code = issue_otp(&state, &user).await?;
    let ttl = state.config.auth.otp_ttl_minutes;
    let email_sent = state
        .mailer
        .send(&Email::verification(&user.email, &user.username, &code, ttl))
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            msg: "Verification code sent to your email.".to_string(),
            verify_required: true,
            email_sent,
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::AuthError("Invalid credentials".to_string());

    let user = state
        .db
        .get_user_by_email(req.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !otp::verify_secret(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let verified = state
        .db
        .get_otp(user.id)
        .await?
        .map(|otp| otp.verified)
        .unwrap_or(false);
    if !verified {
        return Err(AppError::Forbidden(
            "Email not verified. Please enter the OTP sent to your email.".to_string(),
        ));
    }

    let token = generate_token(user.id, &state.config.auth)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        msg: "Login success".to_string(),
        user: user.profile(),
        token,
    }))
}

/// POST /auth/verify-otp
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<VerifyOtpRequest>,
) -> Result<Json<MsgResponse>, AppError> {
    let user = state
        .db
        .get_user_by_email(req.email.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let record = state.db.get_otp(user.id).await?.ok_or_else(|| {
        AppError::BadRequest("No OTP request found. Please register again.".to_string())
    })?;

    match otp::gate(&record, Utc::now(), state.config.auth.otp_max_attempts)? {
        Gate::AlreadyVerified => return Ok(Json(MsgResponse::new("Email already verified"))),
        Gate::CheckCode => {}
    }

    let matched = otp::verify_secret(req.otp.trim(), &record.code_hash)?;
    state.db.record_otp_attempt(record.id, matched).await?;

    if !matched {
        tracing::warn!(
            user_id = user.id,
            attempts = record.attempts + 1,
            "OTP mismatch"
        );
        return Err(AppError::AuthError("Invalid code".to_string()));
    }

    tracing::info!(user_id = user.id, "Email verified");
    Ok(Json(MsgResponse::new("Email verified successfully")))
}

/// POST /auth/resend-otp
pub async fn resend_otp(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResendOtpRequest>,
) -> Result<Json<ResendOtpResponse>, AppError> {
    let user = state
        .db
        .get_user_by_email(req.email.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if let Some(existing) = state.db.get_otp(user.id).await? {
        if existing.verified {
            return Ok(Json(ResendOtpResponse {
                msg: "Email already verified".to_string(),
                email_sent: None,
            }));
        }
    }

    let code = issue_otp(&state, &user).await?;
    let ttl = state.config.auth.otp_ttl_minutes;
    let email_sent = state
        .mailer
        .send(&Email::resent_verification(&user.email, &user.username, &code, ttl))
        .await;

    Ok(Json(ResendOtpResponse {
        msg: "A new verification code has been sent.".to_string(),
        email_sent: Some(email_sent),
    }))
}

/// Store a fresh code for `user` and return it in clear for mailing.
async fn issue_otp(state: &AppState, user: &User) -> Result<String, AppError> {
    let code = otp::generate_code();
    let code_hash = otp::hash_secret(&code)?;
    let expires_at = Utc::now() + Duration::minutes(state.config.auth.otp_ttl_minutes);
    state.db.upsert_otp(user.id, &code_hash, expires_at).await?;
    Ok(code)
}

fn check_email_domain(email: &str, allowed: &str) -> Result<(), AppError> {
    if allowed.is_empty() {
        return Ok(());
    }
    let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or("");
    if !domain.eq_ignore_ascii_case(allowed) {
        return Err(AppError::BadRequest(format!(
            "Please use your KPU student email (@{}).",
            allowed
        )));
    }
    Ok(())
}

pub fn generate_token(user_id: i64, auth_config: &AuthConfig) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(auth_config.token_expiry_hours as i64))
        .ok_or_else(|| AppError::Internal("Failed to calculate expiration".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth_config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &jsonwebtoken::Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthError(e.to_string()))
}

/// Resolve the caller's user id from an `Authorization: Bearer` header.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<i64, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::AuthError("Missing Authorization Header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AppError::AuthError("Authorization header must be a Bearer token".to_string())
        })?;

    user_from_token(state, token)
}

/// User id carried by a bearer token.
pub fn user_from_token(state: &AppState, token: &str) -> Result<i64, AppError> {
    let claims = verify_token(token, &state.config.auth.jwt_secret)?;
    claims
        .sub
        .parse()
        .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
}
