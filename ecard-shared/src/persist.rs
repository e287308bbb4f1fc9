/// Card save pipeline
///
/// Every card write that changes content or background goes through
/// [`save_card`], a four-phase state machine that keeps the derived state
/// consistent without ever re-entering itself:
///
/// 1. **Slug phase** - first persist only: allocate a unique slug from the
///    best available base candidate. The UNIQUE constraint on `cards.slug`
///    is the authoritative backstop; a constraint violation at commit time
///    re-runs the allocation (probe again, insert again).
/// 2. **Style phase** - every persist: default an absent background style and
///    re-derive the text color from it.
/// 3. **First write** - INSERT or full UPDATE. After this the card durably
///    exists with its final slug and text color, whatever happens next.
/// 4. **QR phase** - regenerate the artifact only when its target filename
///    (derived from the slug) differs from what is stored, and attach it with
///    a second write touching only the artifact columns. A QR failure is
///    logged and swallowed; it never fails the save.
///
/// The narrow phase-4 write is what breaks the save-triggers-save recursion:
/// it bypasses phases 1-3 entirely, and on the next save the filename
/// comparison short-circuits, so an unchanged card produces no extra write.

use crate::models::card::{Card, CardType};
use crate::{qr, slug, style};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Attempts at the first write before a slug race is treated as fatal.
const MAX_SLUG_RETRIES: u32 = 3;

/// Error type for the save pipeline
#[derive(Debug, Error)]
pub enum SaveError {
    /// Storage failure (fatal, propagated to the caller)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The slug allocation kept colliding under concurrent creation
    #[error("Could not allocate a unique slug after {0} attempts")]
    SlugExhausted(u32),
}

/// A card about to be written.
///
/// `id: None` marks a brand-new row; an existing card carries its id and its
/// already-assigned slug (slugs are write-once).
#[derive(Debug, Clone)]
pub struct CardDraft {
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub card_data: JsonValue,
    pub avatar: Option<String>,
    pub logo: Option<String>,
    pub slug: String,
    pub is_active: bool,
    pub card_type: CardType,

    /// Derived text color, re-computed by the style phase on every save.
    /// Lives in its own column, never inside `card_data`.
    pub text_color: String,

    /// Stored artifact filename from the previous save, if any
    pub current_qr_name: Option<String>,
}

impl CardDraft {
    /// Draft for a brand-new card.
    pub fn new(user_id: Uuid, card_data: JsonValue, card_type: CardType) -> Self {
        Self {
            id: None,
            user_id,
            card_data,
            avatar: None,
            logo: None,
            slug: String::new(),
            is_active: true,
            card_type,
            text_color: style::LIGHT_TEXT.to_string(),
            current_qr_name: None,
        }
    }

    /// Draft re-built from an existing card with replacement content.
    pub fn from_existing(card: &Card, card_data: JsonValue) -> Self {
        Self {
            id: Some(card.id),
            user_id: card.user_id,
            card_data,
            avatar: card.avatar.clone(),
            logo: card.logo.clone(),
            slug: card.slug.clone(),
            is_active: card.is_active,
            card_type: CardType::from_str(&card.card_type).unwrap_or(CardType::Personal),
            text_color: card.text_color.clone(),
            current_qr_name: card.qr_code_name.clone(),
        }
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.card_data.get(key).and_then(JsonValue::as_str)
    }

    fn set_data(&mut self, key: &str, value: &str) {
        if let Some(map) = self.card_data.as_object_mut() {
            map.insert(key.to_string(), JsonValue::String(value.to_string()));
        }
    }

    /// Base candidate for the slug: the card's first name, then the owner's
    /// display/login name, then the fixed fallback.
    fn slug_base<'a>(&'a self, owner_name: &'a str) -> &'a str {
        self.data_str("firstName")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                if owner_name.trim().is_empty() {
                    slug::FALLBACK_BASE
                } else {
                    owner_name
                }
            })
    }
}

/// Runs the save pipeline for a draft and returns the persisted card.
///
/// `owner_name` is the fallback slug base (display name or username);
/// `public_host` is the configured hostname the QR code URL is built from.
///
/// # Errors
///
/// Returns `SaveError::Database` on storage failure. QR generation failures
/// are logged with the card id and do not fail the save.
pub async fn save_card(
    pool: &PgPool,
    mut draft: CardDraft,
    owner_name: &str,
    public_host: &str,
) -> Result<Card, SaveError> {
    // Phase 2 runs before the write regardless of phase 1; do it first so the
    // retry loop below only repeats the slug work.
    apply_style_phase(&mut draft);

    let mut attempts = 0;
    let card = loop {
        attempts += 1;

        if draft.slug.is_empty() {
            draft.slug = allocate_slug(pool, &draft, owner_name).await?;
        }

        match write_card(pool, &draft).await {
            Ok(card) => break card,
            Err(err) if is_slug_collision(&err) && attempts < MAX_SLUG_RETRIES => {
                // Lost the probe-then-write race; re-allocate and retry.
                debug!(slug = %draft.slug, attempts, "Slug collision at commit, retrying allocation");
                draft.slug.clear();
            }
            Err(err) if is_slug_collision(&err) => {
                return Err(SaveError::SlugExhausted(attempts));
            }
            Err(err) => return Err(err.into()),
        }
    };

    // Phase 4: derived artifact. The card is already durable; nothing past
    // this point may fail the save.
    let card = match run_qr_phase(pool, card, public_host).await {
        Ok(card) => card,
        Err((card, err)) => {
            warn!(card_id = %card.id, error = %err, "Skipping QR generation for card");
            card
        }
    };

    Ok(card)
}

/// Phase 2: default the background and re-derive the text color.
fn apply_style_phase(draft: &mut CardDraft) {
    let background = draft
        .data_str("background_style")
        .unwrap_or("")
        .to_string();

    if background.is_empty() {
        // Persist the default back into card-data so the stored entity is
        // self-describing.
        draft.set_data("background_style", style::DEFAULT_BACKGROUND);
    }

    draft.text_color = style::derive_text_color(&background).to_string();

    // The derived color has its own column; a copy inside card-data is stale
    // the moment the background changes, so any such key is dropped.
    if let Some(map) = draft.card_data.as_object_mut() {
        map.remove("text_color");
    }
}

/// Phase 1: probe candidates until one is free, excluding our own row.
async fn allocate_slug(
    pool: &PgPool,
    draft: &CardDraft,
    owner_name: &str,
) -> Result<String, sqlx::Error> {
    let base = draft.slug_base(owner_name).to_string();

    for candidate in slug::candidates(&base).take(1000) {
        if !Card::slug_taken(pool, &candidate, draft.id).await? {
            return Ok(candidate);
        }
    }

    // Practically unreachable: a thousand suffixed probes all taken.
    Ok(format!("{}-{}", slug::slugify(&base), Uuid::new_v4()))
}

/// Phase 3: the first write. INSERT for new rows, full UPDATE otherwise.
async fn write_card(pool: &PgPool, draft: &CardDraft) -> Result<Card, sqlx::Error> {
    match draft.id {
        None => {
            sqlx::query_as::<_, Card>(
                r#"
                INSERT INTO cards (user_id, card_data, avatar, logo, slug, is_active,
                                   text_color, card_type)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                          slug, is_active, text_color, card_type, created_at
                "#,
            )
            .bind(draft.user_id)
            .bind(&draft.card_data)
            .bind(&draft.avatar)
            .bind(&draft.logo)
            .bind(&draft.slug)
            .bind(draft.is_active)
            .bind(&draft.text_color)
            .bind(draft.card_type.as_str())
            .fetch_one(pool)
            .await
        }
        Some(id) => {
            sqlx::query_as::<_, Card>(
                r#"
                UPDATE cards
                SET card_data = $2, avatar = $3, logo = $4, slug = $5, is_active = $6,
                    text_color = $7, card_type = $8
                WHERE id = $1
                RETURNING id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                          slug, is_active, text_color, card_type, created_at
                "#,
            )
            .bind(id)
            .bind(&draft.card_data)
            .bind(&draft.avatar)
            .bind(&draft.logo)
            .bind(&draft.slug)
            .bind(draft.is_active)
            .bind(&draft.text_color)
            .bind(draft.card_type.as_str())
            .fetch_one(pool)
            .await
        }
    }
}

/// Phase 4: regenerate the artifact when stale and attach it with a narrow
/// write that never re-enters phases 1-3.
async fn run_qr_phase(
    pool: &PgPool,
    mut card: Card,
    public_host: &str,
) -> Result<Card, (Card, anyhow::Error)> {
    let url = qr::public_url(public_host, &card.slug);

    let artifact = match qr::ensure_qr(&url, &card.slug, card.qr_code_name.as_deref()) {
        Ok(Some(artifact)) => artifact,
        Ok(None) => {
            debug!(card_id = %card.id, "QR artifact up to date, skipping regeneration");
            return Ok(card);
        }
        Err(err) => return Err((card, err.into())),
    };

    let result = sqlx::query(
        r#"
        UPDATE cards
        SET qr_code_name = $2, qr_code_png = $3
        WHERE id = $1
        "#,
    )
    .bind(card.id)
    .bind(&artifact.file_name)
    .bind(&artifact.png)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {
            card.qr_code_name = Some(artifact.file_name);
            card.qr_code_png = Some(artifact.png);
            Ok(card)
        }
        Err(err) => Err((card, err.into())),
    }
}

/// Whether an error is the slug UNIQUE constraint firing.
fn is_slug_collision(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .constraint()
            .is_some_and(|constraint| constraint.contains("slug")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft_with(data: JsonValue) -> CardDraft {
        CardDraft::new(Uuid::new_v4(), data, CardType::Personal)
    }

    #[test]
    fn test_slug_base_prefers_first_name() {
        let draft = draft_with(json!({ "firstName": "Test" }));
        assert_eq!(draft.slug_base("owner"), "Test");
    }

    #[test]
    fn test_slug_base_falls_back_to_owner_then_literal() {
        let draft = draft_with(json!({}));
        assert_eq!(draft.slug_base("jane"), "jane");
        assert_eq!(draft.slug_base("   "), slug::FALLBACK_BASE);

        let draft = draft_with(json!({ "firstName": "  " }));
        assert_eq!(draft.slug_base("jane"), "jane");
    }

    #[test]
    fn test_style_phase_defaults_absent_background() {
        let mut draft = draft_with(json!({ "firstName": "Test" }));
        apply_style_phase(&mut draft);

        // Absent background: the dark default is persisted back and the
        // derived text color is light.
        assert_eq!(
            draft.data_str("background_style"),
            Some(style::DEFAULT_BACKGROUND)
        );
        assert_eq!(draft.text_color, style::LIGHT_TEXT);
    }

    #[test]
    fn test_style_phase_rederives_on_every_save() {
        let mut draft = draft_with(json!({ "background_style": "#FFFFFF" }));
        draft.text_color = style::LIGHT_TEXT.to_string();
        apply_style_phase(&mut draft);
        assert_eq!(draft.text_color, style::DARK_TEXT);
    }

    #[test]
    fn test_style_phase_keeps_derived_color_out_of_card_data() {
        // A stale derived copy inside card-data (written by an older client)
        // is dropped; the column is the only home for the derived color.
        let mut draft = draft_with(json!({
            "background_style": "#FFFFFF",
            "text_color": "#FFFFFF"
        }));
        apply_style_phase(&mut draft);
        assert_eq!(draft.text_color, style::DARK_TEXT);
        assert_eq!(draft.data_str("text_color"), None);
    }

    #[test]
    fn test_style_phase_unparseable_token() {
        let mut draft = draft_with(json!({ "background_style": "Graphite" }));
        apply_style_phase(&mut draft);
        assert_eq!(draft.text_color, style::DARK_TEXT);
        // The token is preserved, not overwritten by the default.
        assert_eq!(draft.data_str("background_style"), Some("Graphite"));
    }

    #[test]
    fn test_is_slug_collision_ignores_other_errors() {
        assert!(!is_slug_collision(&sqlx::Error::RowNotFound));
    }

    // save_card itself is covered by the ignored integration tests in
    // tests/persist_tests.rs (requires a running PostgreSQL).
}
