//! Card link index and graph query service.
//!
//! The link set of a source card is always replaced wholesale (delete-all,
//! insert-new) inside one transaction; links are never patched row by row.
//! Writers on the same source card serialize by locking the card row first.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use brains_core::{
    extract_typed_links, new_v7, BrainDirectory, BrokenLink, CardLinkRepository, Error,
    LinkOccurrence, LinkStats, LinkSummary, RepairSummary, ResolvedCardLink, Result,
};

use crate::brains::PgBrainDirectory;
use crate::link_resolver::LinkResolver;

/// PostgreSQL implementation of CardLinkRepository.
pub struct PgCardLinkRepository {
    pool: Pool<Postgres>,
    resolver: LinkResolver<PgBrainDirectory>,
}

impl PgCardLinkRepository {
    /// Create a new PgCardLinkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        let resolver = LinkResolver::new(PgBrainDirectory::new(pool.clone()));
        Self { pool, resolver }
    }

    /// Lock the source card row, serializing link writers for that card.
    async fn lock_source_card(
        tx: &mut Transaction<'_, Postgres>,
        source_card_id: Uuid,
    ) -> Result<()> {
        let row = sqlx::query("SELECT id FROM card WHERE id = $1 FOR UPDATE")
            .bind(source_card_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        if row.is_none() {
            return Err(Error::CardNotFound(source_card_id));
        }
        Ok(())
    }

    /// Replace a card's link set within an existing transaction.
    ///
    /// The caller must already hold the source card's row lock.
    async fn replace_links_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        source_card_id: Uuid,
        mut resolved: Vec<ResolvedCardLink>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM card_link WHERE source_card_id = $1")
            .bind(source_card_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        resolved.sort_by_key(|link| link.link_offset);
        let ordinals = assign_instance_ordinals(&resolved);
        let now = Utc::now();

        for (link, ordinal) in resolved.iter().zip(ordinals) {
            sqlx::query(
                "INSERT INTO card_link
                     (id, source_card_id, target_card_id, link_text, link_offset,
                      instance_ordinal, is_valid, created_at_utc)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(new_v7())
            .bind(source_card_id)
            .bind(link.resolution.target_card_id)
            .bind(&link.link_text)
            .bind(link.link_offset)
            .bind(ordinal)
            .bind(link.resolution.is_valid)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        Ok(())
    }
}

/// Assign 0-based ordinals among identical link texts, in document order.
///
/// Input must already be sorted by offset; each occurrence's ordinal is the
/// number of earlier occurrences carrying the same raw text. This makes
/// repeated identical links individually addressable without a separate
/// identity scheme.
fn assign_instance_ordinals(resolved: &[ResolvedCardLink]) -> Vec<i32> {
    let mut seen: std::collections::HashMap<&str, i32> = std::collections::HashMap::new();
    resolved
        .iter()
        .map(|link| {
            let counter = seen.entry(link.link_text.as_str()).or_insert(0);
            let ordinal = *counter;
            *counter += 1;
            ordinal
        })
        .collect()
}

#[async_trait]
impl CardLinkRepository for PgCardLinkRepository {
    async fn replace_links(
        &self,
        source_card_id: Uuid,
        resolved: Vec<ResolvedCardLink>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::lock_source_card(&mut tx, source_card_id).await?;
        Self::replace_links_in_tx(&mut tx, source_card_id, resolved).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn process_card_links(
        &self,
        source_card_id: Uuid,
        content: &str,
    ) -> Result<LinkSummary> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the card and learn its brain/owner in one round trip.
        let row = sqlx::query(
            "SELECT c.brain_id, b.owner_id
             FROM card c
             JOIN brain b ON b.id = c.brain_id
             WHERE c.id = $1
             FOR UPDATE OF c",
        )
        .bind(source_card_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::CardNotFound(source_card_id))?;

        let brain_id: Uuid = row.get("brain_id");
        let owner_id: Uuid = row.get("owner_id");

        let typed = extract_typed_links(content);
        let resolved = self.resolver.resolve_all(&typed, brain_id, owner_id).await?;

        let links_found = resolved.len() as i64;
        let links_resolved = resolved.iter().filter(|l| l.resolution.is_valid).count() as i64;
        let broken_links = links_found - links_resolved;

        Self::replace_links_in_tx(&mut tx, source_card_id, resolved).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "card_links",
            op = "process_card_links",
            card_id = %source_card_id,
            link_count = links_found,
            resolved_count = links_resolved,
            "Reprocessed card links"
        );

        Ok(LinkSummary {
            links_found,
            links_resolved,
            broken_links,
        })
    }

    async fn broken_links(&self, brain_id: Uuid) -> Result<Vec<BrokenLink>> {
        let rows = sqlx::query(
            r#"
            SELECT l.source_card_id, c.title as source_title, l.link_text, l.link_offset
            FROM card_link l
            JOIN card c ON c.id = l.source_card_id
            WHERE c.brain_id = $1 AND c.deleted_at IS NULL AND NOT l.is_valid
            ORDER BY l.source_card_id, l.link_offset
            "#,
        )
        .bind(brain_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| BrokenLink {
                source_card_id: row.get("source_card_id"),
                source_title: row.get("source_title"),
                link_text: row.get("link_text"),
                link_offset: row.get("link_offset"),
            })
            .collect())
    }

    async fn repair_broken_links(&self, brain_id: Uuid) -> Result<RepairSummary> {
        let broken = self.broken_links(brain_id).await?;
        let found = broken.len() as i64;
        if found == 0 {
            return Ok(RepairSummary {
                found: 0,
                repaired: 0,
                still_broken: 0,
            });
        }

        let mut source_ids: Vec<Uuid> = broken.iter().map(|b| b.source_card_id).collect();
        source_ids.dedup();

        // Re-derive from live content; there is no incremental tracking of
        // why a link was broken, only whether it resolves now.
        for &source_id in &source_ids {
            let Some(card) = self.resolver.directory().card(source_id).await? else {
                continue;
            };
            if !card.is_active() {
                continue;
            }
            self.process_card_links(card.id, &card.content).await?;
        }

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as still_broken
            FROM card_link l
            JOIN card c ON c.id = l.source_card_id
            WHERE l.source_card_id = ANY($1) AND c.deleted_at IS NULL AND NOT l.is_valid
            "#,
        )
        .bind(&source_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let still_broken: i64 = row.get("still_broken");
        let repaired = (found - still_broken).max(0);

        info!(
            subsystem = "db",
            component = "card_links",
            op = "repair",
            brain_id = %brain_id,
            found,
            repaired,
            still_broken,
            "Repair pass over broken links complete"
        );

        Ok(RepairSummary {
            found,
            repaired,
            still_broken,
        })
    }

    async fn backlinks(&self, target_card_id: Uuid) -> Result<Vec<LinkOccurrence>> {
        let rows = sqlx::query(
            r#"
            SELECT l.source_card_id as card_id, c.title as card_title,
                   l.link_text, l.link_offset, l.instance_ordinal
            FROM card_link l
            JOIN card c ON c.id = l.source_card_id
            WHERE l.target_card_id = $1 AND l.is_valid AND c.deleted_at IS NULL
            ORDER BY l.source_card_id, l.link_offset
            "#,
        )
        .bind(target_card_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_occurrence).collect())
    }

    async fn forward_links(&self, source_card_id: Uuid) -> Result<Vec<LinkOccurrence>> {
        let rows = sqlx::query(
            r#"
            SELECT l.target_card_id as card_id, t.title as card_title,
                   l.link_text, l.link_offset, l.instance_ordinal
            FROM card_link l
            JOIN card s ON s.id = l.source_card_id
            JOIN card t ON t.id = l.target_card_id
            WHERE l.source_card_id = $1 AND l.is_valid AND s.deleted_at IS NULL
            ORDER BY l.link_offset
            "#,
        )
        .bind(source_card_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_occurrence).collect())
    }

    async fn link_stats(&self, brain_id: Uuid) -> Result<LinkStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as total,
                   COUNT(*) FILTER (WHERE l.is_valid) as valid,
                   COUNT(*) FILTER (WHERE NOT l.is_valid) as broken,
                   COUNT(DISTINCT l.source_card_id) as cards_with_links,
                   COUNT(DISTINCT l.target_card_id) FILTER (WHERE l.is_valid) as referenced_cards
            FROM card_link l
            JOIN card c ON c.id = l.source_card_id
            WHERE c.brain_id = $1 AND c.deleted_at IS NULL
            "#,
        )
        .bind(brain_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let total: i64 = row.get("total");
        let valid: i64 = row.get("valid");

        Ok(LinkStats {
            total,
            valid,
            broken: row.get("broken"),
            cards_with_links: row.get("cards_with_links"),
            referenced_cards: row.get("referenced_cards"),
            health_percent: LinkStats::health_percent_for(valid, total),
        })
    }
}

fn map_occurrence(row: sqlx::postgres::PgRow) -> LinkOccurrence {
    LinkOccurrence {
        card_id: row.get("card_id"),
        card_title: row.get("card_title"),
        link_text: row.get("link_text"),
        link_offset: row.get("link_offset"),
        instance_ordinal: row.get("instance_ordinal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brains_core::ResolvedLink;

    fn occurrence(text: &str, offset: i32) -> ResolvedCardLink {
        ResolvedCardLink {
            link_text: text.to_string(),
            link_offset: offset,
            resolution: ResolvedLink::broken("test"),
        }
    }

    #[test]
    fn test_ordinals_for_distinct_texts_are_zero() {
        let links = vec![occurrence("A", 0), occurrence("B", 10), occurrence("C", 20)];
        assert_eq!(assign_instance_ordinals(&links), vec![0, 0, 0]);
    }

    #[test]
    fn test_ordinals_count_duplicates_in_document_order() {
        let links = vec![
            occurrence("X", 0),
            occurrence("Y", 8),
            occurrence("X", 16),
            occurrence("X", 24),
        ];
        assert_eq!(assign_instance_ordinals(&links), vec![0, 0, 1, 2]);
    }

    #[test]
    fn test_ordinals_interleaved_texts() {
        let links = vec![
            occurrence("A", 0),
            occurrence("B", 5),
            occurrence("A", 10),
            occurrence("B", 15),
        ];
        assert_eq!(assign_instance_ordinals(&links), vec![0, 0, 1, 1]);
    }
}
