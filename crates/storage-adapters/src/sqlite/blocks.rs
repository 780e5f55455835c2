//! Member blocks with lazy expiry.
//!
//! Nothing sweeps expired rows in the background; every read deletes the
//! expired rows it would otherwise have returned.

use async_trait::async_trait;
use chrono::Utc;
use domains::{Block, BlockRepository, BlockStatus, BlockTerm, CommunityId, MemberId, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::{internal, SqliteStore};

fn block_from_row(row: &SqliteRow) -> Result<Block> {
    Ok(Block {
        community_id: CommunityId(row.try_get("community_id").map_err(internal)?),
        member_id: MemberId(row.try_get("member_id").map_err(internal)?),
        permanent: row.try_get("permanent").map_err(internal)?,
        expires_at: row.try_get("expires_at").map_err(internal)?,
        reason: row.try_get("reason").map_err(internal)?,
        created_by: MemberId(row.try_get("created_by").map_err(internal)?),
        created_at: row.try_get("created_at").map_err(internal)?,
    })
}

impl SqliteStore {
    /// Deletes the member's block if it is temporary and expired. The expiry
    /// check lives in the statement so a fresh re-block is never removed.
    async fn purge_expired_block(&self, community: CommunityId, member: MemberId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM blocks WHERE community_id = ? AND member_id = ? AND permanent = 0 \
             AND (expires_at IS NULL OR expires_at <= ?)",
        )
        .bind(community.0)
        .bind(member.0)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BlockRepository for SqliteStore {
    async fn block_member(
        &self,
        community: CommunityId,
        member: MemberId,
        term: BlockTerm,
        reason: String,
        created_by: MemberId,
    ) -> Result<Block> {
        let created_at = Utc::now();
        let block = Block {
            community_id: community,
            member_id: member,
            permanent: term.is_permanent(),
            expires_at: term.expires_at(created_at),
            reason,
            created_by,
            created_at,
        };

        sqlx::query(
            "INSERT INTO blocks (community_id, member_id, permanent, expires_at, reason, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(community_id, member_id) DO UPDATE SET \
                permanent = excluded.permanent, expires_at = excluded.expires_at, reason = excluded.reason, \
                created_by = excluded.created_by, created_at = excluded.created_at",
        )
        .bind(block.community_id.0)
        .bind(block.member_id.0)
        .bind(block.permanent)
        .bind(block.expires_at)
        .bind(&block.reason)
        .bind(block.created_by.0)
        .bind(block.created_at)
        .execute(self.pool())
        .await
        .map_err(internal)?;

        Ok(block)
    }

    async fn unblock_member(&self, community: CommunityId, member: MemberId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blocks WHERE community_id = ? AND member_id = ?")
            .bind(community.0)
            .bind(member.0)
            .execute(self.pool())
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_blocked(&self, community: CommunityId, member: MemberId) -> Result<BlockStatus> {
        let row = sqlx::query("SELECT * FROM blocks WHERE community_id = ? AND member_id = ?")
            .bind(community.0)
            .bind(member.0)
            .fetch_optional(self.pool())
            .await
            .map_err(internal)?;

        let Some(block) = row.as_ref().map(block_from_row).transpose()? else {
            return Ok(BlockStatus::unblocked());
        };

        if block.is_expired_at(Utc::now()) {
            if self.purge_expired_block(community, member).await? {
                debug!(%community, %member, "expired block removed");
            }
            return Ok(BlockStatus::unblocked());
        }

        Ok(BlockStatus::from(&block))
    }

    async fn list_blocks(&self, community: CommunityId) -> Result<Vec<Block>> {
        let rows = sqlx::query("SELECT * FROM blocks WHERE community_id = ?")
            .bind(community.0)
            .fetch_all(self.pool())
            .await
            .map_err(internal)?;

        let now = Utc::now();
        let mut live = Vec::with_capacity(rows.len());
        for block in rows.iter().map(block_from_row) {
            let block = block?;
            if block.is_expired_at(now) {
                self.purge_expired_block(community, block.member_id).await?;
            } else {
                live.push(block);
            }
        }

        live.sort_by(|a, b| {
            b.permanent
                .cmp(&a.permanent)
                .then(a.expires_at.cmp(&b.expires_at))
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(live)
    }
}
