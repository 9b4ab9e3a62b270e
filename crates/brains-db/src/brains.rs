//! Brain and card lookup repository.
//!
//! Implements the narrow read interfaces the link resolver and repair pass
//! depend on. Card content is owned by the surrounding CRUD layer; this
//! repository only reads it.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use brains_core::{Brain, BrainDirectory, Card, Error, Result};

/// PostgreSQL implementation of BrainDirectory.
#[derive(Clone)]
pub struct PgBrainDirectory {
    pool: Pool<Postgres>,
}

impl PgBrainDirectory {
    /// Create a new PgBrainDirectory with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn map_card(row: &sqlx::postgres::PgRow) -> Card {
        Card {
            id: row.get("id"),
            brain_id: row.get("brain_id"),
            title: row.get("title"),
            content: row.get("content"),
            content_hash: row.get("content_hash"),
            size_bytes: row.get("size_bytes"),
            created_at_utc: row.get("created_at_utc"),
            updated_at_utc: row.get("updated_at_utc"),
            deleted_at: row.get("deleted_at"),
        }
    }
}

#[async_trait]
impl BrainDirectory for PgBrainDirectory {
    async fn find_brain_by_owner_and_name(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Brain>> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, created_at_utc
             FROM brain
             WHERE owner_id = $1 AND name = $2",
        )
        .bind(owner_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| Brain {
            id: r.get("id"),
            owner_id: r.get("owner_id"),
            name: r.get("name"),
            created_at_utc: r.get("created_at_utc"),
        }))
    }

    async fn find_card_by_brain_and_title(
        &self,
        brain_id: Uuid,
        title: &str,
    ) -> Result<Option<Card>> {
        // Untitled cards have NULL titles and are never matched here.
        let row = sqlx::query(
            "SELECT id, brain_id, title, content, content_hash, size_bytes,
                    created_at_utc, updated_at_utc, deleted_at
             FROM card
             WHERE brain_id = $1 AND title = $2 AND deleted_at IS NULL",
        )
        .bind(brain_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::map_card))
    }

    async fn card(&self, card_id: Uuid) -> Result<Option<Card>> {
        let row = sqlx::query(
            "SELECT id, brain_id, title, content, content_hash, size_bytes,
                    created_at_utc, updated_at_utc, deleted_at
             FROM card
             WHERE id = $1",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::map_card))
    }
}
