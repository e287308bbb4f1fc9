/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user with phone number
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `POST /v1/auth/password-reset/request-otp` - Issue a reset code
/// - `POST /v1/auth/password-reset/verify-otp` - Verify code and set password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, Json};
use chrono::Utc;
use ecard_shared::{
    auth::{jwt, otp, password},
    contact::{serialize_submitted, ContactError, ContactKind},
    models::{
        profile::{CreateProfile, Profile},
        user::{CreateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Login name
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Optional display name
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub display_name: Option<String>,

    /// Numeric country code for the phone number, e.g. "880"
    #[serde(default)]
    pub phone_country: String,

    /// Local phone digits
    #[serde(default)]
    pub phone_number: String,
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// User ID
    pub user_id: String,

    /// Canonical phone number stored on the profile
    pub phone_number: String,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Username or email address
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// User ID
    pub user_id: String,

    /// Whether the user may access the admin surface
    pub is_admin: bool,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

/// Password reset code request
#[derive(Debug, Deserialize, Validate)]
pub struct RequestOtpRequest {
    /// Email of the account to reset
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Password reset code response
///
/// Deliberately identical for known and unknown addresses.
#[derive(Debug, Serialize)]
pub struct RequestOtpResponse {
    pub message: String,
}

/// Password reset verification request
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// The 6-digit code from the reset message
    pub code: String,

    /// Replacement password
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Password reset verification response
#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub message: String,
}

/// Maps validator's field errors into the unified validation error.
fn map_validation_errors(e: validator::ValidationErrors) -> ApiError {
    let errors: Vec<ValidationErrorDetail> = e
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(errors)
}

/// Register a new user
///
/// Creates the user account and its profile in one request. The phone number
/// is normalized to the canonical digits-only form and must be unique across
/// all profiles.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed (field-keyed details,
///   including the phone messages)
/// - `409 Conflict`: Username or email already exists
/// - `500 Internal Server Error`: Server error
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    req.validate().map_err(map_validation_errors)?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::validation("password", e))?;

    // Normalize the phone fields into the canonical stored form. Registration
    // has no previous value, so an empty submission means no phone at all.
    let canonical_phone = serialize_submitted(
        &req.phone_country,
        &req.phone_number,
        None,
        ContactKind::Phone,
    )?
    .ok_or(ContactError::PhoneRequired)?;

    if Profile::phone_number_taken(&state.db, &canonical_phone, None).await? {
        return Err(ContactError::PhoneAlreadyRegistered.into());
    }

    let password_hash = password::hash_password(&req.password)?;

    // Both inserts share one transaction: the profile's UNIQUE constraint is
    // the authoritative phone check, and losing that race must not leave a
    // user row without a profile.
    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            username: req.username.clone(),
            email: req.email.clone(),
            password_hash,
            display_name: req.display_name.clone(),
        },
    )
    .await?;

    let profile = Profile::create(
        &mut *tx,
        CreateProfile {
            user_id: user.id,
            phone_number: canonical_phone,
        },
    )
    .await?;

    tx.commit().await?;

    // Generate tokens
    let access_claims = jwt::Claims::new(user.id, user.is_admin, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, user.is_admin, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, "New user registered");

    Ok(Json(RegisterResponse {
        user_id: user.id.to_string(),
        phone_number: profile.phone_number,
        access_token,
        refresh_token,
    }))
}

/// Login endpoint
///
/// Authenticates by username (or email) and password and returns JWT tokens.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `401 Unauthorized`: Invalid credentials
/// - `500 Internal Server Error`: Server error
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate().map_err(map_validation_errors)?;

    // The login field accepts either identifier
    let user = match User::find_by_username(&state.db, &req.username).await? {
        Some(user) => Some(user),
        None => User::find_by_email(&state.db, &req.username).await?,
    };

    let user = user
        .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_string()))?;

    let valid = password::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    User::update_last_login(&state.db, user.id).await?;

    let access_claims = jwt::Claims::new(user.id, user.is_admin, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, user.is_admin, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    Ok(Json(LoginResponse {
        user_id: user.id.to_string(),
        is_admin: user.is_admin,
        access_token,
        refresh_token,
    }))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

const RESET_RESPONSE: &str = "If the address is registered, a reset code has been sent.";

/// Issues a password-reset code for an account.
///
/// The response is identical whether or not the address exists, so the
/// endpoint cannot be used to enumerate accounts. Delivery is handed to the
/// external messaging service; only the hand-off is recorded here.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `400 Bad Request`: A code was issued less than 60 seconds ago
pub async fn request_password_reset_otp(
    State(state): State<AppState>,
    Json(req): Json<RequestOtpRequest>,
) -> ApiResult<Json<RequestOtpResponse>> {
    req.validate().map_err(map_validation_errors)?;

    let Some(user) = User::find_by_email(&state.db, &req.email).await? else {
        tracing::debug!("Password reset requested for unknown address");
        return Ok(Json(RequestOtpResponse {
            message: RESET_RESPONSE.to_string(),
        }));
    };

    let Some(profile) = Profile::find_by_user(&state.db, user.id).await? else {
        return Ok(Json(RequestOtpResponse {
            message: RESET_RESPONSE.to_string(),
        }));
    };

    let now = Utc::now();
    if !otp::can_resend(profile.otp_requested_at, now) {
        return Err(ApiError::BadRequest(
            "Please wait before requesting another code".to_string(),
        ));
    }

    let code = otp::generate();
    let stored = Profile::store_otp(
        &state.db,
        user.id,
        &otp::hash_code(&code),
        otp::expiry_from(now),
    )
    .await?;

    if stored {
        // The code itself goes to the messaging service, never into the logs.
        tracing::info!(user_id = %user.id, "Password reset code issued, handing off for delivery");
    }

    Ok(Json(RequestOtpResponse {
        message: RESET_RESPONSE.to_string(),
    }))
}

/// Verifies a password-reset code and sets the new password.
///
/// A correct code clears the OTP state; a wrong one spends one of the five
/// attempts; an expired or exhausted code clears the state so a fresh request
/// is required.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed, or the code is wrong,
///   expired or exhausted
pub async fn verify_password_reset_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<Json<VerifyOtpResponse>> {
    req.validate().map_err(map_validation_errors)?;

    password::validate_password_strength(&req.new_password)
        .map_err(|e| ApiError::validation("new_password", e))?;

    let invalid = || ApiError::validation("code", "Invalid or expired code");

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    let profile = Profile::find_by_user(&state.db, user.id)
        .await?
        .ok_or_else(invalid)?;

    let (Some(otp_hash), Some(expires_at)) = (profile.otp_hash.clone(), profile.otp_expires_at)
    else {
        return Err(invalid());
    };

    match otp::verify(&req.code, &otp_hash, expires_at, profile.otp_attempts, Utc::now()) {
        otp::VerifyOutcome::Valid => {
            let password_hash = password::hash_password(&req.new_password)?;
            User::update_password(&state.db, user.id, &password_hash).await?;
            Profile::clear_otp(&state.db, user.id).await?;

            tracing::info!(user_id = %user.id, "Password reset completed");

            Ok(Json(VerifyOtpResponse {
                message: "Password updated.".to_string(),
            }))
        }
        otp::VerifyOutcome::WrongCode => {
            Profile::increment_otp_attempts(&state.db, user.id).await?;
            Err(invalid())
        }
        otp::VerifyOutcome::Expired | otp::VerifyOutcome::AttemptsExhausted => {
            Profile::clear_otp(&state.db, user.id).await?;
            Err(invalid())
        }
    }
}
