/// Card model and database operations
///
/// A card is the shareable entity: an open-ended JSONB content map plus the
/// derived state the save pipeline maintains (slug, text color, QR artifact).
/// Writes that derive state go through `persist::save_card`; this module only
/// provides the raw storage operations and lookups.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE cards (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     card_data JSONB NOT NULL DEFAULT '{}',
///     avatar VARCHAR(512),
///     logo VARCHAR(512),
///     qr_code_name VARCHAR(255),
///     qr_code_png BYTEA,
///     slug VARCHAR(150) NOT NULL UNIQUE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     text_color VARCHAR(20) NOT NULL DEFAULT '#FFFFFF',
///     card_type TEXT NOT NULL DEFAULT 'personal',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Card type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[serde(rename = "personal")]
    Personal,

    #[serde(rename = "business")]
    Business,
}

impl CardType {
    /// Converts type to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Personal => "personal",
            CardType::Business => "business",
        }
    }

    /// Parses type from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "personal" => Some(CardType::Personal),
            "business" => Some(CardType::Business),
            _ => None,
        }
    }
}

/// A digital business card
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Card {
    /// Unique card ID (UUID v4)
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Open string-keyed content map (JSONB)
    ///
    /// Known normalized keys (`phone`, `whatsapp`, `background_style`) are
    /// maintained by the save pipeline; everything else passes through
    /// untouched (business `highlight`, social links, notes, ...).
    pub card_data: JsonValue,

    /// Avatar upload reference
    pub avatar: Option<String>,

    /// Logo upload reference (business cards)
    pub logo: Option<String>,

    /// Stored QR artifact filename (`qr_code_{slug}.png`)
    pub qr_code_name: Option<String>,

    /// Stored QR artifact bytes
    #[serde(skip_serializing)]
    pub qr_code_png: Option<Vec<u8>>,

    /// Unique URL identifier; immutable once assigned
    pub slug: String,

    /// Soft-delete flag; inactive cards are invisible to the public lookup
    pub is_active: bool,

    /// Derived text color; re-computed on every save, never hand-set
    pub text_color: String,

    /// 'personal' or 'business'
    pub card_type: String,

    /// When the card was created
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Reads a string value from the content map.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.card_data.get(key).and_then(JsonValue::as_str)
    }

    /// Writes a string value into the content map.
    pub fn set_data(&mut self, key: &str, value: &str) {
        if let Some(map) = self.card_data.as_object_mut() {
            map.insert(key.to_string(), JsonValue::String(value.to_string()));
        }
    }

    /// Display name assembled from the content map.
    pub fn display_name(&self) -> String {
        let first = self.data_str("firstName").unwrap_or("");
        let last = self.data_str("lastName").unwrap_or("");
        let full = format!("{} {}", first, last).trim().to_string();
        if full.is_empty() {
            format!("Card {}", self.id)
        } else {
            full
        }
    }

    /// Finds a card by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                   slug, is_active, text_color, card_type, created_at
            FROM cards
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(card)
    }

    /// Finds a card by slug regardless of active state (owner/admin views).
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                   slug, is_active, text_color, card_type, created_at
            FROM cards
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;

        Ok(card)
    }

    /// Finds an active card by slug (the public lookup).
    ///
    /// An unknown or inactive slug is simply "no such active entity".
    pub async fn find_active_by_slug(
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                   slug, is_active, text_color, card_type, created_at
            FROM cards
            WHERE slug = $1 AND is_active = TRUE
            "#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;

        Ok(card)
    }

    /// Lists a user's cards, newest first (dashboard).
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                   slug, is_active, text_color, card_type, created_at
            FROM cards
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(cards)
    }

    /// Lists all cards with pagination (admin dashboard).
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, user_id, card_data, avatar, logo, qr_code_name, qr_code_png,
                   slug, is_active, text_color, card_type, created_at
            FROM cards
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(cards)
    }

    /// Counts a user's cards (card-limit enforcement).
    pub async fn count_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cards WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts total number of cards.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cards")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Checks whether a slug is taken, optionally excluding a card's own row
    /// (no-op for new rows).
    pub async fn slug_taken(
        pool: &PgPool,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cards
                WHERE slug = $1
                  AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }

    /// Flips the soft-delete flag.
    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        is_active: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE cards SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-deletes a card row (admin only). The stored artifact bytes go
    /// with the row.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_card(data: JsonValue) -> Card {
        Card {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            card_data: data,
            avatar: None,
            logo: None,
            qr_code_name: None,
            qr_code_png: None,
            slug: "test".to_string(),
            is_active: true,
            text_color: "#FFFFFF".to_string(),
            card_type: "personal".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_card_type_round_trip() {
        assert_eq!(CardType::Personal.as_str(), "personal");
        assert_eq!(CardType::from_str("business"), Some(CardType::Business));
        assert_eq!(CardType::from_str("other"), None);
    }

    #[test]
    fn test_data_str_and_set_data() {
        let mut card = sample_card(json!({ "firstName": "Test" }));
        assert_eq!(card.data_str("firstName"), Some("Test"));
        assert_eq!(card.data_str("lastName"), None);

        card.set_data("background_style", "#000000");
        assert_eq!(card.data_str("background_style"), Some("#000000"));
    }

    #[test]
    fn test_display_name() {
        let card = sample_card(json!({ "firstName": "Test", "lastName": "User" }));
        assert_eq!(card.display_name(), "Test User");

        let card = sample_card(json!({}));
        assert!(card.display_name().starts_with("Card "));
    }
}
