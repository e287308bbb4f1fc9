/// Profile model and database operations
///
/// One-to-one with User, created at registration. Holds the canonical phone
/// number (globally unique across all profiles), the password-reset OTP
/// state, and the per-user card limit.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE profiles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     phone_number VARCHAR(20) NOT NULL UNIQUE,
///     otp_hash VARCHAR(128),
///     otp_expires_at TIMESTAMPTZ,
///     otp_requested_at TIMESTAMPTZ,
///     otp_attempts SMALLINT NOT NULL DEFAULT 0,
///     card_limit INTEGER NOT NULL DEFAULT 1 CHECK (card_limit >= 1)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Minimum number of cards every profile is allowed.
pub const DEFAULT_CARD_LIMIT: i32 = 1;

/// Per-user profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    /// Unique profile ID (UUID v4)
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Canonical phone number: digits only, country code included.
    ///
    /// Unique across all profiles; duplicate detection is an exact string
    /// match against this canonical form.
    pub phone_number: String,

    /// Hex-encoded SHA-256 of the outstanding OTP, if any
    #[serde(skip_serializing)]
    pub otp_hash: Option<String>,

    /// When the outstanding OTP stops being accepted
    pub otp_expires_at: Option<DateTime<Utc>>,

    /// When an OTP was last issued (resend throttle)
    pub otp_requested_at: Option<DateTime<Utc>>,

    /// Failed verification attempts against the outstanding OTP
    pub otp_attempts: i16,

    /// Maximum number of cards this user may own
    pub card_limit: i32,
}

/// Input for creating a profile at registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    pub user_id: Uuid,

    /// Canonical phone number produced by the contact normalizer
    pub phone_number: String,
}

impl Profile {
    /// Creates a profile for a freshly registered user.
    ///
    /// Accepts any executor so registration can run it inside the same
    /// transaction as the user insert.
    ///
    /// # Errors
    ///
    /// Returns an error on a phone-number unique-constraint violation or a
    /// database failure.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        data: CreateProfile,
    ) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, phone_number)
            VALUES ($1, $2)
            RETURNING id, user_id, phone_number, otp_hash, otp_expires_at,
                      otp_requested_at, otp_attempts, card_limit
            "#,
        )
        .bind(data.user_id)
        .bind(data.phone_number)
        .fetch_one(executor)
        .await?;

        Ok(profile)
    }

    /// Finds the profile belonging to a user.
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, phone_number, otp_hash, otp_expires_at,
                   otp_requested_at, otp_attempts, card_limit
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Checks whether a canonical phone number is already registered.
    ///
    /// Exact string comparison against the stored canonical form; a legacy
    /// row stored in a different shape will not collide.
    pub async fn phone_number_taken(
        pool: &PgPool,
        phone_number: &str,
        exclude_user: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM profiles
                WHERE phone_number = $1
                  AND ($2::uuid IS NULL OR user_id <> $2)
            )
            "#,
        )
        .bind(phone_number)
        .bind(exclude_user)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }

    /// Stores a freshly issued OTP: hash, expiry, request timestamp; resets
    /// the attempt counter.
    pub async fn store_otp(
        pool: &PgPool,
        user_id: Uuid,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET otp_hash = $2, otp_expires_at = $3, otp_requested_at = NOW(),
                otp_attempts = 0
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(otp_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a failed verification attempt.
    pub async fn increment_otp_attempts(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE profiles
            SET otp_attempts = otp_attempts + 1
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Clears all OTP state (after success, expiry, or exhausted attempts).
    pub async fn clear_otp(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE profiles
            SET otp_hash = NULL, otp_expires_at = NULL, otp_requested_at = NULL,
                otp_attempts = 0
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Sets the card limit, clamped so an administrator edit can never push a
    /// profile below the system-wide minimum.
    pub async fn set_card_limit(
        pool: &PgPool,
        user_id: Uuid,
        card_limit: i32,
        minimum: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let clamped = card_limit.max(minimum).max(DEFAULT_CARD_LIMIT);

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET card_limit = $2
            WHERE user_id = $1
            RETURNING id, user_id, phone_number, otp_hash, otp_expires_at,
                      otp_requested_at, otp_attempts, card_limit
            "#,
        )
        .bind(user_id)
        .bind(clamped)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Raises the card limit by `delta`, used when an upgrade request is
    /// approved. Never lowers.
    pub async fn raise_card_limit(
        pool: &PgPool,
        user_id: Uuid,
        delta: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET card_limit = card_limit + $2
            WHERE user_id = $1
            RETURNING id, user_id, phone_number, otp_hash, otp_expires_at,
                      otp_requested_at, otp_attempts, card_limit
            "#,
        )
        .bind(user_id)
        .bind(delta.max(0))
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Whether the outstanding OTP has expired at `now`.
    pub fn otp_expired(&self, now: DateTime<Utc>) -> bool {
        match self.otp_expires_at {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            phone_number: "8801799911122".to_string(),
            otp_hash: None,
            otp_expires_at: None,
            otp_requested_at: None,
            otp_attempts: 0,
            card_limit: DEFAULT_CARD_LIMIT,
        }
    }

    #[test]
    fn test_otp_expired_without_state() {
        let profile = sample_profile();
        assert!(profile.otp_expired(Utc::now()));
    }

    #[test]
    fn test_otp_expired_boundaries() {
        let now = Utc::now();
        let mut profile = sample_profile();

        profile.otp_expires_at = Some(now + Duration::minutes(10));
        assert!(!profile.otp_expired(now));

        profile.otp_expires_at = Some(now - Duration::seconds(1));
        assert!(profile.otp_expired(now));
    }
}
