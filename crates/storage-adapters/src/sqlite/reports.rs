//! Mapping between the `reports` table and `domains::Report`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AppError, ChannelRef, CommunityId, MemberId, MessageRef, NewReport, Report, ReportId, ReportKind,
    ReportPayload, ReportRepository, ReportStatus, ResolveWrite, Result,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::debug;

use super::{internal, SqliteStore};

const REPORT_COLUMNS: &str = "id, kind, reporter_id, community_id, source_location_id, staff_message_ref, \
     ticket_channel_ref, status, payload_json, claimed_by, claimed_at, resolved_by, resolved_at, \
     resolution_note, created_at, updated_at";

const RESOLVE_ATTEMPTS: usize = 5;

fn report_from_row(row: &SqliteRow) -> Result<Report> {
    let id = ReportId(row.try_get("id").map_err(internal)?);
    let kind: ReportKind = row.try_get::<String, _>("kind").map_err(internal)?.parse()?;
    let raw_payload: String = row.try_get("payload_json").map_err(internal)?;
    let payload = ReportPayload::from_json(kind, &raw_payload)
        .map_err(|e| AppError::Internal(format!("report #{id} has a corrupt payload: {e}")))?;

    Ok(Report {
        id,
        reporter_id: MemberId(row.try_get("reporter_id").map_err(internal)?),
        community_id: CommunityId(row.try_get("community_id").map_err(internal)?),
        source_location_id: ChannelRef(row.try_get("source_location_id").map_err(internal)?),
        payload,
        status: row.try_get::<String, _>("status").map_err(internal)?.parse()?,
        staff_message_ref: row
            .try_get::<Option<i64>, _>("staff_message_ref")
            .map_err(internal)?
            .map(MessageRef),
        ticket_channel_ref: row
            .try_get::<Option<i64>, _>("ticket_channel_ref")
            .map_err(internal)?
            .map(ChannelRef),
        claimed_by: row.try_get::<Option<i64>, _>("claimed_by").map_err(internal)?.map(MemberId),
        claimed_at: row.try_get("claimed_at").map_err(internal)?,
        resolved_by: row.try_get::<Option<i64>, _>("resolved_by").map_err(internal)?.map(MemberId),
        resolved_at: row.try_get("resolved_at").map_err(internal)?,
        resolution_note: row.try_get("resolution_note").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
        updated_at: row.try_get("updated_at").map_err(internal)?,
    })
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[async_trait]
impl ReportRepository for SqliteStore {
    async fn create_report(&self, report: NewReport) -> Result<ReportId> {
        let payload_json = report
            .payload
            .to_json()
            .map_err(|e| AppError::Internal(format!("payload encoding: {e}")))?;
        let created_at = now();

        let result = sqlx::query(
            "INSERT INTO reports (kind, reporter_id, community_id, source_location_id, status, payload_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(report.payload.kind().as_str())
        .bind(report.reporter_id.0)
        .bind(report.community_id.0)
        .bind(report.source_location_id.0)
        .bind(ReportStatus::Open.as_str())
        .bind(payload_json)
        .bind(created_at)
        .bind(created_at)
        .execute(self.pool())
        .await
        .map_err(internal)?;

        Ok(ReportId(result.last_insert_rowid()))
    }

    async fn set_staff_message_ref(&self, id: ReportId, message: MessageRef) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reports SET staff_message_ref = ?, updated_at = ? WHERE id = ? AND staff_message_ref IS NULL",
        )
        .bind(message.0)
        .bind(now())
        .bind(id.0)
        .execute(self.pool())
        .await
        .map_err(internal)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_report(&self, id: ReportId) -> Result<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(self.pool())
            .await
            .map_err(internal)?;
        row.as_ref().map(report_from_row).transpose()
    }

    /// Served by the partial unique index on `staff_message_ref`.
    async fn get_by_staff_message_ref(&self, message: MessageRef) -> Result<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE staff_message_ref = ?");
        let row = sqlx::query(&sql)
            .bind(message.0)
            .fetch_optional(self.pool())
            .await
            .map_err(internal)?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn update_status(&self, id: ReportId, status: ReportStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE reports SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now())
            .bind(id.0)
            .execute(self.pool())
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() == 1)
    }

    /// The ticket reference is part of the guard: if a ticket is stored or
    /// cleared between the read and the write, the write misses and is retried
    /// against the new value, so the caller always learns which channel to
    /// remove.
    async fn mark_resolved(&self, id: ReportId, resolver: MemberId, note: Option<String>) -> Result<ResolveWrite> {
        for _ in 0..RESOLVE_ATTEMPTS {
            let row = sqlx::query("SELECT status, ticket_channel_ref FROM reports WHERE id = ?")
                .bind(id.0)
                .fetch_optional(self.pool())
                .await
                .map_err(internal)?;
            let Some(row) = row else {
                return Ok(ResolveWrite::Rejected);
            };
            let status: ReportStatus = row.try_get::<String, _>("status").map_err(internal)?.parse()?;
            if status.is_closed() {
                return Ok(ResolveWrite::Rejected);
            }
            let ticket: Option<i64> = row.try_get("ticket_channel_ref").map_err(internal)?;

            let at = now();
            let result = sqlx::query(
                "UPDATE reports SET status = ?, resolved_by = ?, resolved_at = ?, resolution_note = ?, \
                 ticket_channel_ref = NULL, updated_at = ? WHERE id = ? AND status != ? AND ticket_channel_ref IS ?",
            )
            .bind(ReportStatus::Resolved.as_str())
            .bind(resolver.0)
            .bind(at)
            .bind(note.as_deref())
            .bind(at)
            .bind(id.0)
            .bind(ReportStatus::Resolved.as_str())
            .bind(ticket)
            .execute(self.pool())
            .await
            .map_err(internal)?;

            if result.rows_affected() == 1 {
                return Ok(ResolveWrite::Resolved { cleared_ticket: ticket.map(ChannelRef) });
            }
            debug!(report_id = %id, "report changed during resolve, retrying");
        }
        Err(AppError::Internal(format!("report #{id} kept changing while being resolved")))
    }

    async fn set_ticket_channel_ref(&self, id: ReportId, channel: Option<ChannelRef>) -> Result<bool> {
        let result = sqlx::query("UPDATE reports SET ticket_channel_ref = ?, updated_at = ? WHERE id = ?")
            .bind(channel.map(|c| c.0))
            .bind(now())
            .bind(id.0)
            .execute(self.pool())
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() == 1)
    }

    async fn open_ticket(&self, id: ReportId, channel: ChannelRef, claimed_by: MemberId) -> Result<bool> {
        let at = now();
        let result = sqlx::query(
            "UPDATE reports SET status = ?, ticket_channel_ref = ?, claimed_by = ?, claimed_at = ?, updated_at = ? \
             WHERE id = ? AND ticket_channel_ref IS NULL AND status != ?",
        )
        .bind(ReportStatus::TicketOpen.as_str())
        .bind(channel.0)
        .bind(claimed_by.0)
        .bind(at)
        .bind(at)
        .bind(id.0)
        .bind(ReportStatus::Resolved.as_str())
        .execute(self.pool())
        .await
        .map_err(internal)?;
        Ok(result.rows_affected() == 1)
    }

    async fn close_ticket(&self, id: ReportId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reports SET status = ?, ticket_channel_ref = NULL, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(ReportStatus::Open.as_str())
        .bind(now())
        .bind(id.0)
        .bind(ReportStatus::TicketOpen.as_str())
        .execute(self.pool())
        .await
        .map_err(internal)?;
        Ok(result.rows_affected() == 1)
    }

    async fn reopen(&self, id: ReportId) -> Result<bool> {
        let result = sqlx::query("UPDATE reports SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(ReportStatus::Open.as_str())
            .bind(now())
            .bind(id.0)
            .bind(ReportStatus::Resolved.as_str())
            .execute(self.pool())
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_active(&self, community: CommunityId, excluded: &[ReportStatus]) -> Result<Vec<Report>> {
        let mut sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE community_id = ?");
        if !excluded.is_empty() {
            let placeholders = vec!["?"; excluded.len()].join(", ");
            sql.push_str(&format!(" AND status NOT IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY id DESC");

        let mut query = sqlx::query(&sql).bind(community.0);
        for status in excluded {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(self.pool()).await.map_err(internal)?;
        rows.iter().map(report_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{QualityTier, TvPayload, VodPayload};

    fn tv(community: i64, channel: &str) -> NewReport {
        NewReport {
            reporter_id: MemberId(42),
            community_id: CommunityId(community),
            source_location_id: ChannelRef(900),
            payload: ReportPayload::Tv(TvPayload {
                channel_name: channel.into(),
                channel_category: "News".into(),
                issue: "Frozen picture".into(),
            }),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids_and_open_status() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = store.create_report(tv(7, "Example One")).await.unwrap();
        let second = store.create_report(tv(7, "Example Two")).await.unwrap();
        assert!(second > first);

        let report = store.get_report(first).await.unwrap().expect("report exists");
        assert_eq!(report.status, ReportStatus::Open);
        assert_eq!(report.kind(), ReportKind::Tv);
        assert_eq!(report.created_at, report.updated_at);
        assert!(report.staff_message_ref.is_none());
    }

    #[tokio::test]
    async fn test_vod_payload_survives_storage() {
        let store = SqliteStore::in_memory().await.unwrap();
        let payload = ReportPayload::Vod(VodPayload {
            title: "Breaking Bad S02E05".into(),
            reference_link: "https://thetvdb.com/series/breaking-bad".into(),
            quality: QualityTier::Fhd,
            issue: "Subtitles missing, ünïcödé & \"quotes\"".into(),
        });
        let id = store
            .create_report(NewReport { payload: payload.clone(), ..tv(7, "unused") })
            .await
            .unwrap();

        assert_eq!(store.get_report(id).await.unwrap().unwrap().payload, payload);
    }

    #[tokio::test]
    async fn test_staff_message_lookup_after_set_only() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_report(tv(7, "Example One")).await.unwrap();

        assert!(store.get_by_staff_message_ref(MessageRef(555)).await.unwrap().is_none());
        assert!(store.set_staff_message_ref(id, MessageRef(555)).await.unwrap());
        // Set at most once
        assert!(!store.set_staff_message_ref(id, MessageRef(556)).await.unwrap());

        let by_ref = store.get_by_staff_message_ref(MessageRef(555)).await.unwrap().unwrap();
        let by_id = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(by_ref, by_id);
    }

    #[tokio::test]
    async fn test_mark_resolved_is_guarded_and_clears_ticket() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_report(tv(7, "Example One")).await.unwrap();
        assert!(store.open_ticket(id, ChannelRef(77), MemberId(5)).await.unwrap());

        let write = store.mark_resolved(id, MemberId(5), Some("Feed restarted".into())).await.unwrap();
        assert_eq!(write, ResolveWrite::Resolved { cleared_ticket: Some(ChannelRef(77)) });
        let first = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(first.status, ReportStatus::Resolved);
        assert!(first.ticket_channel_ref.is_none());
        assert_eq!(first.resolution_note.as_deref(), Some("Feed restarted"));

        assert_eq!(store.mark_resolved(id, MemberId(6), None).await.unwrap(), ResolveWrite::Rejected);
        let second = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(second.resolved_at, first.resolved_at);
        assert_eq!(second.resolved_by, Some(MemberId(5)));

        assert_eq!(store.mark_resolved(ReportId(999), MemberId(5), None).await.unwrap(), ResolveWrite::Rejected);
    }

    #[tokio::test]
    async fn test_mark_resolved_reports_ticket_stored_after_caller_read() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_report(tv(7, "Example One")).await.unwrap();
        let seen = store.get_report(id).await.unwrap().unwrap();
        assert!(seen.ticket_channel_ref.is_none());

        // Someone opens a ticket after the caller looked
        assert!(store.open_ticket(id, ChannelRef(78), MemberId(6)).await.unwrap());

        let write = store.mark_resolved(id, MemberId(5), None).await.unwrap();
        assert_eq!(write, ResolveWrite::Resolved { cleared_ticket: Some(ChannelRef(78)) });
    }

    #[tokio::test]
    async fn test_update_status_is_unconditional() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_report(tv(7, "Example One")).await.unwrap();

        assert!(store.update_status(id, ReportStatus::Resolved).await.unwrap());
        assert!(store.update_status(id, ReportStatus::Open).await.unwrap());
        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Open);
        assert!(report.updated_at >= report.created_at);

        assert!(!store.update_status(ReportId(999), ReportStatus::Open).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_ticket_requires_cleared_reference() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_report(tv(7, "Example One")).await.unwrap();

        assert!(store.open_ticket(id, ChannelRef(77), MemberId(5)).await.unwrap());
        assert!(!store.open_ticket(id, ChannelRef(78), MemberId(5)).await.unwrap());

        assert!(store.close_ticket(id).await.unwrap());
        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Open);
        assert!(report.ticket_channel_ref.is_none());

        assert!(store.open_ticket(id, ChannelRef(78), MemberId(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_reopen_keeps_resolution_audit() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store.create_report(tv(7, "Example One")).await.unwrap();
        assert!(!store.reopen(id).await.unwrap());

        store.mark_resolved(id, MemberId(5), None).await.unwrap();
        assert!(store.reopen(id).await.unwrap());

        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, ReportStatus::Open);
        assert_eq!(report.resolved_by, Some(MemberId(5)));
        assert!(report.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_list_active_excludes_and_orders_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = store.create_report(tv(7, "A")).await.unwrap();
        let b = store.create_report(tv(7, "B")).await.unwrap();
        let c = store.create_report(tv(7, "C")).await.unwrap();
        store.create_report(tv(8, "other community")).await.unwrap();
        store.mark_resolved(b, MemberId(1), None).await.unwrap();

        let active = store.list_active(CommunityId(7), &[ReportStatus::Resolved]).await.unwrap();
        let ids: Vec<_> = active.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![c, a]);

        let everything = store.list_active(CommunityId(7), &[]).await.unwrap();
        assert_eq!(everything.len(), 3);
        assert_eq!(everything[0].id, c);
    }
}
