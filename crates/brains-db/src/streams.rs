//! Stream repository: ordered card membership maintenance.
//!
//! Every mutating operation runs inside one transaction and starts by locking
//! the parent stream row (`SELECT ... FOR UPDATE`), so concurrent writers on
//! the same stream serialize while writers on different streams proceed
//! independently. The `(stream_id, position)` unique constraint is never
//! violated mid-transaction: renumbering routes each row through a negative
//! sentinel range (`-(p + 2)`) that is disjoint from `[0, N)` for any stream
//! size.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use brains_core::{
    new_v7, Error, InsertPlacement, PositionStats, ReorderInstruction, Result, Stream,
    StreamRepository,
};

/// PostgreSQL implementation of StreamRepository.
pub struct PgStreamRepository {
    pool: Pool<Postgres>,
}

/// One locked membership row, ordered by position.
struct MemberRow {
    card_id: Uuid,
    position: i32,
}

impl PgStreamRepository {
    /// Create a new PgStreamRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lock the stream, then fetch its membership rows in position order.
    ///
    /// Every mutating operation calls this first. The lock must be on the
    /// parent stream row: membership row locks cannot serialize concurrent
    /// inserts into an empty stream, and a committed insert from another
    /// transaction is a phantom the waiting statement never sees. Once the
    /// stream row lock is held, the membership read below runs on a fresh
    /// snapshot.
    async fn lock_members(
        tx: &mut Transaction<'_, Postgres>,
        stream_id: Uuid,
    ) -> Result<Vec<MemberRow>> {
        sqlx::query("SELECT id FROM stream WHERE id = $1 FOR UPDATE")
            .bind(stream_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query(
            "SELECT card_id, position FROM stream_card
             WHERE stream_id = $1
             ORDER BY position",
        )
        .bind(stream_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| MemberRow {
                card_id: r.get("card_id"),
                position: r.get("position"),
            })
            .collect())
    }

    /// Rewrite the stream's positions to `0..N-1` following `ordered`.
    ///
    /// Two passes: first move every row into the sentinel range in one
    /// statement, then assign final positions per row. The unique constraint
    /// sees no duplicate at any statement boundary.
    async fn write_order(
        tx: &mut Transaction<'_, Postgres>,
        stream_id: Uuid,
        ordered: &[Uuid],
    ) -> Result<()> {
        sqlx::query(
            "UPDATE stream_card SET position = -(position + 2) WHERE stream_id = $1",
        )
        .bind(stream_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        for (index, card_id) in ordered.iter().enumerate() {
            sqlx::query(
                "UPDATE stream_card SET position = $3 WHERE stream_id = $1 AND card_id = $2",
            )
            .bind(stream_id)
            .bind(card_id)
            .bind(index as i32)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        Ok(())
    }

    async fn set_depth(
        tx: &mut Transaction<'_, Postgres>,
        stream_id: Uuid,
        card_id: Uuid,
        depth: i32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE stream_card SET depth = $3 WHERE stream_id = $1 AND card_id = $2",
        )
        .bind(stream_id)
        .bind(card_id)
        .bind(depth)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    fn map_stream(row: &sqlx::postgres::PgRow) -> Stream {
        Stream {
            id: row.get("id"),
            brain_id: row.get("brain_id"),
            name: row.get("name"),
            favorite: row.get("favorite"),
            created_at_utc: row.get("created_at_utc"),
            last_accessed_at_utc: row.get("last_accessed_at_utc"),
            card_count: row.get("card_count"),
        }
    }
}

#[async_trait]
impl StreamRepository for PgStreamRepository {
    async fn create(&self, brain_id: Uuid, name: &str) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO stream (id, brain_id, name, favorite, created_at_utc, last_accessed_at_utc)
             VALUES ($1, $2, $3, false, $4, $4)",
        )
        .bind(id)
        .bind(brain_id)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, stream_id: Uuid) -> Result<Option<Stream>> {
        let row = sqlx::query(
            r#"
            SELECT s.id, s.brain_id, s.name, s.favorite, s.created_at_utc, s.last_accessed_at_utc,
                   COALESCE((SELECT COUNT(*) FROM stream_card WHERE stream_id = s.id), 0) as card_count
            FROM stream s
            WHERE s.id = $1
            "#,
        )
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::map_stream))
    }

    async fn list_for_brain(&self, brain_id: Uuid) -> Result<Vec<Stream>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.brain_id, s.name, s.favorite, s.created_at_utc, s.last_accessed_at_utc,
                   COALESCE((SELECT COUNT(*) FROM stream_card WHERE stream_id = s.id), 0) as card_count
            FROM stream s
            WHERE s.brain_id = $1
            ORDER BY s.favorite DESC, s.last_accessed_at_utc DESC
            "#,
        )
        .bind(brain_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::map_stream).collect())
    }

    async fn delete(&self, stream_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("DELETE FROM stream_card WHERE stream_id = $1")
            .bind(stream_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let result = sqlx::query("DELETE FROM stream WHERE id = $1")
            .bind(stream_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_accessed(&self, stream_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE stream SET last_accessed_at_utc = $2 WHERE id = $1")
            .bind(stream_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_favorite(&self, stream_id: Uuid, favorite: bool) -> Result<()> {
        sqlx::query("UPDATE stream SET favorite = $2 WHERE id = $1")
            .bind(stream_id)
            .bind(favorite)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_card(
        &self,
        stream_id: Uuid,
        card_id: Uuid,
        placement: InsertPlacement,
        depth: i32,
    ) -> Result<i32> {
        if depth < 0 {
            return Err(Error::InvalidInput(format!(
                "depth must be non-negative, got {depth}"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let members = Self::lock_members(&mut tx, stream_id).await?;

        // Idempotent: an existing membership keeps its position untouched.
        if let Some(existing) = members.iter().find(|m| m.card_id == card_id) {
            let position = existing.position;
            tx.commit().await.map_err(Error::Database)?;
            debug!(
                subsystem = "db",
                component = "streams",
                op = "insert_card",
                stream_id = %stream_id,
                card_id = %card_id,
                position,
                "Card already in stream, returning existing position"
            );
            return Ok(position);
        }

        let count = members.len() as i32;
        let target = match placement {
            InsertPlacement::End => count,
            InsertPlacement::AfterPosition(after) => (after + 1).clamp(0, count),
        };

        // Make room: shift the tail up by one via the sentinel range so the
        // unique constraint never sees two rows at the same position.
        sqlx::query(
            "UPDATE stream_card SET position = -(position + 2)
             WHERE stream_id = $1 AND position >= $2",
        )
        .bind(stream_id)
        .bind(target)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "UPDATE stream_card SET position = -position - 1
             WHERE stream_id = $1 AND position < 0",
        )
        .bind(stream_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO stream_card
                 (stream_id, card_id, position, depth, in_ai_context, collapsed, added_at_utc)
             VALUES ($1, $2, $3, $4, false, false, $5)",
        )
        .bind(stream_id)
        .bind(card_id)
        .bind(target)
        .bind(depth)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "streams",
            op = "insert_card",
            stream_id = %stream_id,
            card_id = %card_id,
            position = target,
            "Inserted card into stream"
        );
        Ok(target)
    }

    async fn move_card(
        &self,
        stream_id: Uuid,
        card_id: Uuid,
        new_position: i32,
        new_depth: Option<i32>,
    ) -> Result<bool> {
        if let Some(depth) = new_depth {
            if depth < 0 {
                return Err(Error::InvalidInput(format!(
                    "depth must be non-negative, got {depth}"
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let members = Self::lock_members(&mut tx, stream_id).await?;

        let Some(current_index) = members.iter().position(|m| m.card_id == card_id) else {
            return Ok(false);
        };

        let count = members.len() as i32;
        let target = new_position.clamp(0, count - 1);

        if target == members[current_index].position {
            // No relocation; a requested depth change still applies.
            if let Some(depth) = new_depth {
                Self::set_depth(&mut tx, stream_id, card_id, depth).await?;
                tx.commit().await.map_err(Error::Database)?;
            }
            return Ok(false);
        }

        let mut ordered: Vec<Uuid> = members.iter().map(|m| m.card_id).collect();
        let moved = ordered.remove(current_index);
        ordered.insert(target as usize, moved);

        Self::write_order(&mut tx, stream_id, &ordered).await?;
        if let Some(depth) = new_depth {
            Self::set_depth(&mut tx, stream_id, card_id, depth).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "streams",
            op = "move_card",
            stream_id = %stream_id,
            card_id = %card_id,
            position = target,
            rows_renumbered = count,
            "Moved card within stream"
        );
        Ok(true)
    }

    async fn remove_card(&self, stream_id: Uuid, card_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let members = Self::lock_members(&mut tx, stream_id).await?;

        if !members.iter().any(|m| m.card_id == card_id) {
            return Ok(false);
        }

        sqlx::query("DELETE FROM stream_card WHERE stream_id = $1 AND card_id = $2")
            .bind(stream_id)
            .bind(card_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let remaining: Vec<Uuid> = members
            .iter()
            .filter(|m| m.card_id != card_id)
            .map(|m| m.card_id)
            .collect();
        Self::write_order(&mut tx, stream_id, &remaining).await?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "streams",
            op = "remove_card",
            stream_id = %stream_id,
            card_id = %card_id,
            rows_renumbered = remaining.len(),
            "Removed card from stream"
        );
        Ok(true)
    }

    async fn batch_reorder(
        &self,
        stream_id: Uuid,
        instructions: Vec<ReorderInstruction>,
    ) -> Result<usize> {
        for instruction in &instructions {
            if instruction.new_position < 0 {
                return Err(Error::InvalidInput(format!(
                    "position must be non-negative, got {}",
                    instruction.new_position
                )));
            }
            if matches!(instruction.new_depth, Some(d) if d < 0) {
                return Err(Error::InvalidInput("depth must be non-negative".into()));
            }
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let members = Self::lock_members(&mut tx, stream_id).await?;

        // The whole batch fails if any instruction targets a non-member;
        // dropping the transaction rolls everything back.
        for instruction in &instructions {
            if !members.iter().any(|m| m.card_id == instruction.card_id) {
                return Err(Error::InvalidInput(format!(
                    "card {} is not a member of stream {stream_id}",
                    instruction.card_id
                )));
            }
        }

        let mut ordered: Vec<Uuid> = members.iter().map(|m| m.card_id).collect();
        for instruction in &instructions {
            let index = ordered
                .iter()
                .position(|&id| id == instruction.card_id)
                .ok_or_else(|| Error::Internal("validated member disappeared".into()))?;
            let moved = ordered.remove(index);
            let target = (instruction.new_position as usize).min(ordered.len());
            ordered.insert(target, moved);
        }

        Self::write_order(&mut tx, stream_id, &ordered).await?;
        for instruction in &instructions {
            if let Some(depth) = instruction.new_depth {
                Self::set_depth(&mut tx, stream_id, instruction.card_id, depth).await?;
            }
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "streams",
            op = "batch_reorder",
            stream_id = %stream_id,
            rows_renumbered = ordered.len(),
            applied = instructions.len(),
            "Applied batch reorder"
        );
        Ok(instructions.len())
    }

    async fn normalize(&self, stream_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let members = Self::lock_members(&mut tx, stream_id).await?;

        let ordered: Vec<Uuid> = members.iter().map(|m| m.card_id).collect();
        Self::write_order(&mut tx, stream_id, &ordered).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn position_stats(&self, stream_id: Uuid) -> Result<PositionStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count,
                   COALESCE(MAX(position), -1) as actual_max,
                   COUNT(DISTINCT position) as distinct_count
            FROM stream_card
            WHERE stream_id = $1
            "#,
        )
        .bind(stream_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let count: i64 = row.get("count");
        let actual_max: i32 = row.get("actual_max");
        let distinct_count: i64 = row.get("distinct_count");
        let expected_max = count as i32 - 1;

        Ok(PositionStats {
            count,
            expected_max_position: expected_max,
            actual_max_position: actual_max,
            has_gaps: actual_max != expected_max || distinct_count != count,
        })
    }
}
