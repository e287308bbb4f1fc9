/// Admin endpoints
///
/// The admin surface is gated by the JWT layer plus the admin guard; every
/// handler here can assume an authenticated admin requester.
///
/// # Endpoints
///
/// - `GET    /v1/admin/stats` - Platform counters
/// - `GET    /v1/admin/users` - Paginated user list
/// - `GET    /v1/admin/cards` - Paginated card list
/// - `PUT    /v1/admin/users/:id/card-limit` - Set a profile's card limit
/// - `POST   /v1/admin/cards/:slug/deactivate` - Hide a card from the public
/// - `POST   /v1/admin/cards/:slug/reactivate` - Restore a hidden card
/// - `DELETE /v1/admin/cards/:slug` - Hard delete
/// - `GET    /v1/admin/upgrade-requests` - List requests (filterable)
/// - `POST   /v1/admin/upgrade-requests/:id/decide` - Approve or reject
/// - `GET    /v1/admin/export` - JSON dump of users, profiles and cards

use crate::{
    app::{AppState, CurrentUser},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use ecard_shared::models::{
    card::Card,
    profile::Profile,
    upgrade_request::{UpgradeRequest, UpgradeStatus},
    user::User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Platform counters
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_cards: i64,
    pub pending_upgrade_requests: i64,
}

/// Card-limit update payload
#[derive(Debug, Deserialize)]
pub struct CardLimitPayload {
    pub card_limit: i32,
}

/// Upgrade-request list filter
#[derive(Debug, Deserialize)]
pub struct UpgradeListParams {
    /// 'pending', 'approved' or 'rejected'
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Admin decision payload
#[derive(Debug, Deserialize)]
pub struct DecisionPayload {
    /// true = approve, false = reject
    pub approve: bool,

    /// Response notes shown to the requester
    pub notes: Option<String>,

    /// Cards to add to the requester's limit on approval (default 1 when the
    /// request is not about a specific card)
    pub limit_increase: Option<i32>,
}

/// Decision response: the settled request plus what was done about it
#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub request: UpgradeRequest,

    /// New card limit, when the approval raised it
    pub new_card_limit: Option<i32>,

    /// Whether the linked card was reactivated
    pub card_reactivated: bool,
}

/// Full-platform JSON export
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub users: Vec<User>,
    pub profiles: Vec<Profile>,
    pub cards: Vec<Card>,
}

/// Platform counters for the admin dashboard.
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    let total_users = User::count(&state.db).await?;
    let total_cards = Card::count(&state.db).await?;

    let (pending,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM upgrade_requests WHERE status = 'pending'")
            .fetch_one(&state.db)
            .await?;

    Ok(Json(StatsResponse {
        total_users,
        total_cards,
        pending_upgrade_requests: pending,
    }))
}

/// Paginated user list, newest first.
pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<User>>> {
    let users = User::list(&state.db, page.limit(), page.offset()).await?;
    Ok(Json(users))
}

/// Paginated card list across all users, newest first.
pub async fn list_cards(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<Card>>> {
    let cards = Card::list(&state.db, page.limit(), page.offset()).await?;
    Ok(Json(cards))
}

/// Sets a profile's card limit, clamped to the configured minimum so an admin
/// edit can never strand a user below the floor.
pub async fn set_card_limit(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<CardLimitPayload>,
) -> ApiResult<Json<Profile>> {
    let profile = Profile::set_card_limit(
        &state.db,
        user_id,
        payload.card_limit,
        state.config.cards.min_card_limit,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User has no profile".to_string()))?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %user_id,
        card_limit = profile.card_limit,
        "Card limit updated"
    );

    Ok(Json(profile))
}

/// Hides a card from the public lookup.
pub async fn deactivate_card(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Card>> {
    set_card_active(&state, &slug, false, admin.user_id).await
}

/// Restores a hidden card to the public lookup.
pub async fn reactivate_card(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Card>> {
    set_card_active(&state, &slug, true, admin.user_id).await
}

async fn set_card_active(
    state: &AppState,
    slug: &str,
    is_active: bool,
    admin_id: Uuid,
) -> ApiResult<Json<Card>> {
    let card = Card::find_by_slug(&state.db, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    Card::set_active(&state.db, card.id, is_active).await?;

    tracing::info!(
        admin_id = %admin_id,
        card_id = %card.id,
        is_active,
        "Card active state changed"
    );

    let card = Card::find_by_id(&state.db, card.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    Ok(Json(card))
}

/// Hard-deletes a card. The row and its stored artifact bytes are gone; this
/// is not the soft deactivate.
pub async fn delete_card(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let card = Card::find_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    Card::delete(&state.db, card.id).await?;

    tracing::warn!(admin_id = %admin.user_id, card_id = %card.id, slug = %slug, "Card hard-deleted");

    Ok(Json(serde_json::json!({ "deleted": slug })))
}

/// Lists upgrade requests, newest first, optionally filtered by status.
pub async fn list_upgrade_requests(
    State(state): State<AppState>,
    Query(params): Query<UpgradeListParams>,
) -> ApiResult<Json<Vec<UpgradeRequest>>> {
    let status = match params.status.as_deref() {
        None => None,
        Some(raw) => Some(UpgradeStatus::from_str(raw).ok_or_else(|| {
            ApiError::validation("status", "Must be 'pending', 'approved' or 'rejected'")
        })?),
    };

    let page = PageParams {
        limit: params.limit,
        offset: params.offset,
    };

    let requests = UpgradeRequest::list(&state.db, status, page.limit(), page.offset()).await?;
    Ok(Json(requests))
}

/// Settles a pending upgrade request.
///
/// The transition is terminal: a request that has already been decided
/// returns 409. Approval additionally reactivates the linked card when there
/// is one, and otherwise raises the requester's card limit.
pub async fn decide_upgrade_request(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> ApiResult<Json<DecisionResponse>> {
    // Existence check first so a decided request conflicts instead of 404ing.
    let existing = UpgradeRequest::find_by_id(&state.db, request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Upgrade request not found".to_string()))?;

    let status = if payload.approve {
        UpgradeStatus::Approved
    } else {
        UpgradeStatus::Rejected
    };

    let request = UpgradeRequest::mark(
        &state.db,
        request_id,
        status,
        admin.user_id,
        payload.notes.as_deref(),
    )
    .await?
    .ok_or_else(|| {
        ApiError::Conflict(format!(
            "Request already {}",
            existing.status
        ))
    })?;

    let mut new_card_limit = None;
    let mut card_reactivated = false;

    if payload.approve {
        match request.card_id {
            Some(card_id) => {
                card_reactivated = Card::set_active(&state.db, card_id, true).await?;
            }
            None => {
                let delta = payload.limit_increase.unwrap_or(1);
                new_card_limit = Profile::raise_card_limit(&state.db, request.user_id, delta)
                    .await?
                    .map(|profile| profile.card_limit);
            }
        }
    }

    tracing::info!(
        admin_id = %admin.user_id,
        request_id = %request.id,
        status = %request.status,
        "Upgrade request settled"
    );

    Ok(Json(DecisionResponse {
        request,
        new_card_limit,
        card_reactivated,
    }))
}

/// Dumps users, profiles and cards as JSON.
///
/// Spreadsheet exports are produced by external tooling from this dump;
/// password hashes and OTP hashes are excluded by the models' serialization.
pub async fn export(State(state): State<AppState>) -> ApiResult<Json<ExportResponse>> {
    let users = User::list(&state.db, i64::MAX, 0).await?;

    let profiles = sqlx::query_as::<_, Profile>(
        r#"
        SELECT id, user_id, phone_number, otp_hash, otp_expires_at,
               otp_requested_at, otp_attempts, card_limit
        FROM profiles
        ORDER BY user_id
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let cards = Card::list(&state.db, i64::MAX, 0).await?;

    Ok(Json(ExportResponse {
        users,
        profiles,
        cards,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_clamping() {
        let page = PageParams {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = PageParams {
            limit: None,
            offset: None,
        };
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }
}
