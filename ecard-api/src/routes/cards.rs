/// Card endpoints
///
/// Owner CRUD plus the public slug lookup. Every content write goes through
/// the save pipeline in `ecard_shared::persist`, which owns slug allocation,
/// text color derivation and the QR artifact.
///
/// # Endpoints
///
/// - `GET  /v1/cards` - Owner dashboard list
/// - `POST /v1/cards` - Create a card (card limit enforced)
/// - `GET  /v1/cards/:slug` - Public view (active cards only)
/// - `PUT  /v1/cards/:slug` - Owner edit
/// - `GET  /v1/cards/:slug/qr.png` - Stored QR artifact
/// - `POST /v1/upgrade-requests` - Ask for a limit raise or reactivation

use crate::{
    app::{maybe_authenticate, AppState, CurrentUser},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Extension, Json,
};
use ecard_shared::{
    contact::{parse_stored, serialize_submitted, ContactKind, ParsedNumber},
    models::{
        card::{Card, CardType},
        profile::Profile,
        upgrade_request::{CreateUpgradeRequest, UpgradeRequest},
        user::User,
    },
    persist::{save_card, CardDraft},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Create/update card payload
///
/// `card_data` is the open content map; the phone and WhatsApp numbers arrive
/// as separate country/local fields and are folded into the map in canonical
/// form, the same shape the public view splits them back out of.
#[derive(Debug, Deserialize)]
pub struct CardPayload {
    /// Open string-keyed content map
    #[serde(default = "empty_object")]
    pub card_data: JsonValue,

    /// 'personal' or 'business' (default 'personal')
    pub card_type: Option<String>,

    /// Avatar upload reference
    pub avatar: Option<String>,

    /// Logo upload reference
    pub logo: Option<String>,

    /// Phone country code field, e.g. "880"
    pub phone_country: Option<String>,

    /// Phone local digits field
    pub phone_number: Option<String>,

    /// WhatsApp country code field
    pub whatsapp_country: Option<String>,

    /// WhatsApp local digits field
    pub whatsapp_number: Option<String>,
}

fn empty_object() -> JsonValue {
    json!({})
}

/// Public card view response
#[derive(Debug, Serialize)]
pub struct PublicCardResponse {
    pub slug: String,
    pub card_data: JsonValue,
    pub avatar: Option<String>,
    pub logo: Option<String>,

    /// Derived text color for rendering over the background
    pub text_color: String,

    pub card_type: String,

    /// Stored phone split back into country/local fields
    pub phone: Option<ParsedNumber>,

    /// Stored WhatsApp number split back into country/local fields
    pub whatsapp: Option<ParsedNumber>,

    /// Whether the requester owns this card
    pub is_owner: bool,

    /// Whether the visit came through the QR code (`?qr=1`)
    pub from_qr: bool,

    /// Whether a QR artifact is stored for this card
    pub qr_available: bool,
}

/// Query parameters for the public view
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    /// Set to "1" by the URL encoded in the QR artifact
    pub qr: Option<String>,
}

/// Upgrade request payload
#[derive(Debug, Deserialize)]
pub struct UpgradeRequestPayload {
    /// Slug of the card the request concerns (reactivation requests)
    pub card_slug: Option<String>,

    /// Requested plan identifier
    pub requested_plan: Option<String>,

    /// Message to the administrator
    #[serde(default)]
    pub message: String,
}

/// Lists the requester's cards, newest first.
pub async fn list_cards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Card>>> {
    let cards = Card::list_by_user(&state.db, current.user_id).await?;
    Ok(Json(cards))
}

/// Creates a card for the requester.
///
/// # Errors
///
/// - `403 Forbidden`: The profile's card limit is reached
/// - `422 Unprocessable Entity`: Contact field validation failed
pub async fn create_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CardPayload>,
) -> ApiResult<Json<Card>> {
    let user = User::find_by_id(&state.db, current.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    let profile = Profile::find_by_user(&state.db, current.user_id)
        .await?
        .ok_or_else(|| ApiError::InternalError("User has no profile".to_string()))?;

    let owned = Card::count_by_user(&state.db, current.user_id).await?;
    if owned >= profile.card_limit as i64 {
        return Err(ApiError::Forbidden(format!(
            "Card limit of {} reached. Request an upgrade to add more cards.",
            profile.card_limit
        )));
    }

    let card_type = parse_card_type(payload.card_type.as_deref())?;
    let mut card_data = ensure_object(payload.card_data.clone())?;
    fold_contact_fields(&mut card_data, &payload, None)?;

    let mut draft = CardDraft::new(current.user_id, card_data, card_type);
    draft.avatar = payload.avatar;
    draft.logo = payload.logo;

    let card = save_card(&state.db, draft, user.slug_base(), state.public_host()).await?;

    tracing::info!(card_id = %card.id, slug = %card.slug, "Card created");

    Ok(Json(card))
}

/// Public card view by slug.
///
/// Only active cards are visible; an unknown or deactivated slug is a plain
/// 404. An authenticated owner gets `is_owner`, and `?qr=1` (the marker baked
/// into the QR URL) is reflected as `from_qr`.
pub async fn view_card(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<ViewParams>,
    headers: HeaderMap,
) -> ApiResult<Json<PublicCardResponse>> {
    let card = Card::find_active_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    let is_owner = maybe_authenticate(&headers, state.jwt_secret())
        .is_some_and(|current| current.user_id == card.user_id);

    let from_qr = params.qr.as_deref() == Some("1");
    if from_qr {
        tracing::debug!(card_id = %card.id, "Card visited via QR code");
    }

    let phone = card
        .data_str("phone")
        .and_then(|value| parse_stored(value, ContactKind::Phone, &state.country_codes));
    let whatsapp = card
        .data_str("whatsapp")
        .and_then(|value| parse_stored(value, ContactKind::WhatsApp, &state.country_codes));

    Ok(Json(PublicCardResponse {
        slug: card.slug.clone(),
        card_data: card.card_data.clone(),
        avatar: card.avatar.clone(),
        logo: card.logo.clone(),
        text_color: card.text_color.clone(),
        card_type: card.card_type.clone(),
        phone,
        whatsapp,
        is_owner,
        from_qr,
        qr_available: card.qr_code_name.is_some(),
    }))
}

/// Owner edit of a card's content.
///
/// The slug never changes on edit. A requester who does not own the card gets
/// the same 404 as for an unknown slug.
pub async fn update_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(payload): Json<CardPayload>,
) -> ApiResult<Json<Card>> {
    let card = Card::find_by_slug(&state.db, &slug)
        .await?
        .filter(|card| card.user_id == current.user_id || current.is_admin)
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    let user = User::find_by_id(&state.db, card.user_id)
        .await?
        .ok_or_else(|| ApiError::InternalError("Card owner no longer exists".to_string()))?;

    let mut card_data = ensure_object(payload.card_data.clone())?;
    fold_contact_fields(&mut card_data, &payload, Some(&card))?;

    let mut draft = CardDraft::from_existing(&card, card_data);
    if let Some(card_type) = payload.card_type.as_deref() {
        draft.card_type = parse_card_type(Some(card_type))?;
    }
    if payload.avatar.is_some() {
        draft.avatar = payload.avatar;
    }
    if payload.logo.is_some() {
        draft.logo = payload.logo;
    }

    let card = save_card(&state.db, draft, user.slug_base(), state.public_host()).await?;

    Ok(Json(card))
}

/// Serves the stored QR artifact for an active card.
pub async fn card_qr_png(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Response> {
    let card = Card::find_active_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

    let png = card
        .qr_code_png
        .ok_or_else(|| ApiError::NotFound("No QR code stored for this card".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Files an upgrade request with the administrators.
pub async fn create_upgrade_request(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpgradeRequestPayload>,
) -> ApiResult<Json<UpgradeRequest>> {
    // A linked card must exist and belong to the requester.
    let card_id = match payload.card_slug.as_deref() {
        Some(slug) => {
            let card = Card::find_by_slug(&state.db, slug)
                .await?
                .filter(|card| card.user_id == current.user_id)
                .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;
            Some(card.id)
        }
        None => None,
    };

    let request = UpgradeRequest::create(
        &state.db,
        CreateUpgradeRequest {
            user_id: current.user_id,
            card_id,
            requested_plan: payload.requested_plan,
            message: payload.message,
        },
    )
    .await?;

    tracing::info!(request_id = %request.id, user_id = %current.user_id, "Upgrade request filed");

    Ok(Json(request))
}

fn parse_card_type(value: Option<&str>) -> Result<CardType, ApiError> {
    match value {
        None => Ok(CardType::Personal),
        Some(raw) => CardType::from_str(raw)
            .ok_or_else(|| ApiError::validation("card_type", "Must be 'personal' or 'business'")),
    }
}

fn ensure_object(card_data: JsonValue) -> Result<JsonValue, ApiError> {
    if card_data.is_object() {
        Ok(card_data)
    } else {
        Err(ApiError::validation("card_data", "Must be a JSON object"))
    }
}

/// Folds the submitted country/local contact fields into the content map in
/// canonical form. An empty submission preserves the value already stored on
/// the existing card, so a no-op edit never clears a number.
fn fold_contact_fields(
    card_data: &mut JsonValue,
    payload: &CardPayload,
    existing: Option<&Card>,
) -> Result<(), ApiError> {
    let fields = [
        (
            ContactKind::Phone,
            "phone",
            &payload.phone_country,
            &payload.phone_number,
        ),
        (
            ContactKind::WhatsApp,
            "whatsapp",
            &payload.whatsapp_country,
            &payload.whatsapp_number,
        ),
    ];

    for (kind, key, country, local) in fields {
        if country.is_none() && local.is_none() {
            continue;
        }

        let previous = existing.and_then(|card| card.data_str(key)).map(str::to_string);

        let canonical = serialize_submitted(
            country.as_deref().unwrap_or(""),
            local.as_deref().unwrap_or(""),
            previous.as_deref(),
            kind,
        )?;

        if let (Some(canonical), Some(map)) = (canonical, card_data.as_object_mut()) {
            map.insert(key.to_string(), JsonValue::String(canonical));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(country: Option<&str>, local: Option<&str>) -> CardPayload {
        CardPayload {
            card_data: json!({}),
            card_type: None,
            avatar: None,
            logo: None,
            phone_country: country.map(str::to_string),
            phone_number: local.map(str::to_string),
            whatsapp_country: None,
            whatsapp_number: None,
        }
    }

    #[test]
    fn test_fold_contact_fields_canonicalizes() {
        let mut data = json!({});
        fold_contact_fields(&mut data, &payload(Some("880"), Some("1799911122")), None)
            .expect("valid");
        assert_eq!(data["phone"], "8801799911122");
    }

    #[test]
    fn test_fold_contact_fields_skips_unsubmitted() {
        let mut data = json!({ "phone": "8801799911122" });
        fold_contact_fields(&mut data, &payload(None, None), None).expect("valid");
        assert_eq!(data["phone"], "8801799911122");
    }

    #[test]
    fn test_fold_contact_fields_surfaces_field_errors() {
        let mut data = json!({});
        let err = fold_contact_fields(&mut data, &payload(Some("880"), Some("abc")), None)
            .expect_err("non-digit local");
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "phone");
                assert_eq!(details[0].message, "Enter digits only for the phone number.");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_card_type() {
        assert_eq!(parse_card_type(None).unwrap(), CardType::Personal);
        assert_eq!(
            parse_card_type(Some("business")).unwrap(),
            CardType::Business
        );
        assert!(parse_card_type(Some("other")).is_err());
    }

    #[test]
    fn test_ensure_object_rejects_non_objects() {
        assert!(ensure_object(json!({})).is_ok());
        assert!(ensure_object(json!([])).is_err());
        assert!(ensure_object(json!("text")).is_err());
    }
}
