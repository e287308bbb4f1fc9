/// Billing reference endpoints
///
/// Read-only: the upgrade page lists the purchasable plans and the
/// requester's own subscriptions. Purchases themselves are settled offline
/// through the upgrade-request flow.
///
/// # Endpoints
///
/// - `GET /v1/plans` - Active plans, cheapest first (public)
/// - `GET /v1/subscriptions` - The requester's subscriptions (authenticated)

use crate::{
    app::{AppState, CurrentUser},
    error::ApiResult,
};
use axum::{extract::State, Extension, Json};
use ecard_shared::models::subscription::{Subscription, SubscriptionPlan};

/// Lists active plans, cheapest first.
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<SubscriptionPlan>>> {
    let plans = SubscriptionPlan::list_active(&state.db).await?;
    Ok(Json(plans))
}

/// Lists the requester's subscriptions, newest first.
pub async fn my_subscriptions(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Subscription>>> {
    let subscriptions = Subscription::list_by_user(&state.db, current.user_id).await?;
    Ok(Json(subscriptions))
}
