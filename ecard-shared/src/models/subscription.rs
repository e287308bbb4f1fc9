/// Subscription plan and subscription models
///
/// Reference/billing metadata. Nothing in the card save pipeline touches
/// these tables; they exist so the admin surface and upgrade flow have plans
/// to point at.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

/// A purchasable plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,

    /// URL-safe unique identifier
    pub slug: String,

    pub description: String,

    /// 'monthly' or 'yearly'
    pub billing_cycle: String,

    pub price: BigDecimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user's subscription to a plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,

    /// 'pending', 'active' or 'cancelled'
    pub status: String,

    pub current_period_end: Option<NaiveDate>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Lists active plans, cheapest first.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let plans = sqlx::query_as::<_, SubscriptionPlan>(
            r#"
            SELECT id, name, slug, description, billing_cycle, price, is_active, created_at
            FROM subscription_plans
            WHERE is_active = TRUE
            ORDER BY price ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(plans)
    }
}

impl Subscription {
    /// Lists a user's subscriptions, newest first.
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, plan_id, status, current_period_end, notes,
                   created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(subscriptions)
    }
}
