use async_trait::async_trait;
use domains::{ChannelRef, CommunityId, LiveboardEntry, LiveboardRepository, MessageRef, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{internal, SqliteStore};

fn entry_from_row(row: &SqliteRow) -> Result<LiveboardEntry> {
    Ok(LiveboardEntry {
        community_id: CommunityId(row.try_get("community_id").map_err(internal)?),
        channel_ref: ChannelRef(row.try_get("channel_ref").map_err(internal)?),
        message_ref: MessageRef(row.try_get("message_ref").map_err(internal)?),
    })
}

#[async_trait]
impl LiveboardRepository for SqliteStore {
    /// One row per community; registering again moves the board.
    async fn register_liveboard(&self, entry: LiveboardEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO liveboards (community_id, channel_ref, message_ref) VALUES (?, ?, ?) \
             ON CONFLICT(community_id) DO UPDATE SET channel_ref = excluded.channel_ref, message_ref = excluded.message_ref",
        )
        .bind(entry.community_id.0)
        .bind(entry.channel_ref.0)
        .bind(entry.message_ref.0)
        .execute(self.pool())
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_liveboard(&self, community: CommunityId) -> Result<Option<LiveboardEntry>> {
        let row = sqlx::query("SELECT community_id, channel_ref, message_ref FROM liveboards WHERE community_id = ?")
            .bind(community.0)
            .fetch_optional(self.pool())
            .await
            .map_err(internal)?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn list_liveboards(&self) -> Result<Vec<LiveboardEntry>> {
        let rows = sqlx::query("SELECT community_id, channel_ref, message_ref FROM liveboards ORDER BY community_id")
            .fetch_all(self.pool())
            .await
            .map_err(internal)?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn clear_liveboard(&self, community: CommunityId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM liveboards WHERE community_id = ?")
            .bind(community.0)
            .execute(self.pool())
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }
}
