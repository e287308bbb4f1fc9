/// Upgrade request model and database operations
///
/// A user asks an administrator to raise their card limit or reactivate a
/// card. The request is mutated exactly once: an admin decision moves it from
/// `pending` to a terminal `approved`/`rejected` state with response
/// metadata, and may additionally raise the profile's limit or reactivate the
/// linked card (handled by the caller).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Decision state of an upgrade request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStatus {
    #[serde(rename = "pending")]
    Pending,

    #[serde(rename = "approved")]
    Approved,

    #[serde(rename = "rejected")]
    Rejected,
}

impl UpgradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeStatus::Pending => "pending",
            UpgradeStatus::Approved => "approved",
            UpgradeStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UpgradeStatus::Pending),
            "approved" => Some(UpgradeStatus::Approved),
            "rejected" => Some(UpgradeStatus::Rejected),
            _ => None,
        }
    }

    /// Whether the state accepts no further mutation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpgradeStatus::Pending)
    }
}

/// A pending or decided upgrade request
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UpgradeRequest {
    pub id: Uuid,

    /// Requesting user
    pub user_id: Uuid,

    /// Card the request concerns, if any (reactivation requests)
    pub card_id: Option<Uuid>,

    /// Requested plan identifier (free-form, default 'monthly_plan')
    pub requested_plan: String,

    /// User-supplied message
    pub message: String,

    /// 'pending', 'approved' or 'rejected'
    pub status: String,

    pub created_at: DateTime<Utc>,

    /// When the admin decision was recorded
    pub responded_at: Option<DateTime<Utc>>,

    /// Admin who handled the request
    pub handled_by: Option<Uuid>,

    /// Admin response notes
    pub admin_notes: String,
}

/// Input for creating an upgrade request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUpgradeRequest {
    pub user_id: Uuid,
    pub card_id: Option<Uuid>,
    pub requested_plan: Option<String>,
    pub message: String,
}

impl UpgradeRequest {
    /// Creates a pending request.
    pub async fn create(pool: &PgPool, data: CreateUpgradeRequest) -> Result<Self, sqlx::Error> {
        let request = sqlx::query_as::<_, UpgradeRequest>(
            r#"
            INSERT INTO upgrade_requests (user_id, card_id, requested_plan, message)
            VALUES ($1, $2, COALESCE($3, 'monthly_plan'), $4)
            RETURNING id, user_id, card_id, requested_plan, message, status,
                      created_at, responded_at, handled_by, admin_notes
            "#,
        )
        .bind(data.user_id)
        .bind(data.card_id)
        .bind(data.requested_plan)
        .bind(data.message)
        .fetch_one(pool)
        .await?;

        Ok(request)
    }

    /// Finds a request by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let request = sqlx::query_as::<_, UpgradeRequest>(
            r#"
            SELECT id, user_id, card_id, requested_plan, message, status,
                   created_at, responded_at, handled_by, admin_notes
            FROM upgrade_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }

    /// Lists requests newest first, optionally filtered by status.
    pub async fn list(
        pool: &PgPool,
        status: Option<UpgradeStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let requests = sqlx::query_as::<_, UpgradeRequest>(
            r#"
            SELECT id, user_id, card_id, requested_plan, message, status,
                   created_at, responded_at, handled_by, admin_notes
            FROM upgrade_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(requests)
    }

    /// Records the admin decision. Only a pending request can be marked; the
    /// WHERE clause makes the transition terminal, so a second decision
    /// affects zero rows and returns `None`.
    pub async fn mark(
        pool: &PgPool,
        id: Uuid,
        status: UpgradeStatus,
        admin_user: Uuid,
        notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let request = sqlx::query_as::<_, UpgradeRequest>(
            r#"
            UPDATE upgrade_requests
            SET status = $2, responded_at = NOW(), handled_by = $3,
                admin_notes = COALESCE($4, admin_notes)
            WHERE id = $1 AND status = 'pending'
            RETURNING id, user_id, card_id, requested_plan, message, status,
                      created_at, responded_at, handled_by, admin_notes
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(admin_user)
        .bind(notes)
        .fetch_optional(pool)
        .await?;

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(UpgradeStatus::from_str("pending"), Some(UpgradeStatus::Pending));
        assert_eq!(UpgradeStatus::from_str("approved"), Some(UpgradeStatus::Approved));
        assert_eq!(UpgradeStatus::from_str("rejected"), Some(UpgradeStatus::Rejected));
        assert_eq!(UpgradeStatus::from_str("other"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!UpgradeStatus::Pending.is_terminal());
        assert!(UpgradeStatus::Approved.is_terminal());
        assert!(UpgradeStatus::Rejected.is_terminal());
    }
}
