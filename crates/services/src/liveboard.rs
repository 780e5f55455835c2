//! # Liveboard
//!
//! One summary message per community, listing its unresolved reports. The
//! message is posted once by `start` and edited in place on every refresh.
//! `run` drives periodic refreshes until the shutdown signal flips.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::{
    ChannelRef, ChatGateway, CommunityId, EditOutcome, LiveboardEntry, LiveboardRepository, OutboundMessage,
    ReportRepository, ReportStatus, Result,
};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::render;
use crate::settings::WorkflowSettings;

/// What a single refresh did to a community's board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// The message is gone; the registration was removed
    Cleared,
    /// Edit was refused; the registration is kept for the next cycle
    Skipped,
    NotRegistered,
}

pub struct LiveboardService {
    reports: Arc<dyn ReportRepository>,
    boards: Arc<dyn LiveboardRepository>,
    chat: Arc<dyn ChatGateway>,
    settings: Arc<WorkflowSettings>,
    // Manual and periodic refreshes of the same board must not interleave
    refresh_lock: Mutex<()>,
}

impl LiveboardService {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        boards: Arc<dyn LiveboardRepository>,
        chat: Arc<dyn ChatGateway>,
        settings: Arc<WorkflowSettings>,
    ) -> Self {
        Self { reports, boards, chat, settings, refresh_lock: Mutex::new(()) }
    }

    async fn render(&self, community: CommunityId) -> Result<OutboundMessage> {
        let active = self.reports.list_active(community, &[ReportStatus::Resolved]).await?;
        Ok(render::liveboard(community, &active, &self.settings, Utc::now()))
    }

    /// Posts a fresh board in `channel` and makes it the community's board.
    #[instrument(skip(self))]
    pub async fn start(&self, community: CommunityId, channel: ChannelRef) -> Result<LiveboardEntry> {
        let message = self.render(community).await?;
        let message_ref = self.chat.send_notification(channel, message).await?;
        let entry = LiveboardEntry { community_id: community, channel_ref: channel, message_ref };
        self.boards.register_liveboard(entry).await?;
        info!(%message_ref, "liveboard started");
        Ok(entry)
    }

    pub async fn stop(&self, community: CommunityId) -> Result<bool> {
        let removed = self.boards.clear_liveboard(community).await?;
        info!(%community, removed, "liveboard stopped");
        Ok(removed)
    }

    pub async fn refresh(&self, community: CommunityId) -> Result<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;
        match self.boards.get_liveboard(community).await? {
            Some(entry) => self.refresh_entry(entry).await,
            None => Ok(RefreshOutcome::NotRegistered),
        }
    }

    /// Refreshes every registered board. One community's failure never
    /// stops the others; each gets its own result.
    pub async fn refresh_all(&self) -> Result<Vec<(CommunityId, Result<RefreshOutcome>)>> {
        let _guard = self.refresh_lock.lock().await;
        let entries = self.boards.list_liveboards().await?;

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = self.refresh_entry(entry).await;
            if let Err(e) = &result {
                warn!(community = %entry.community_id, error = %e, "liveboard refresh failed");
            }
            results.push((entry.community_id, result));
        }
        Ok(results)
    }

    async fn refresh_entry(&self, entry: LiveboardEntry) -> Result<RefreshOutcome> {
        let message = self.render(entry.community_id).await?;
        let outcome = self.chat.edit_notification(entry.channel_ref, entry.message_ref, message).await?;

        Ok(match outcome {
            EditOutcome::Edited => RefreshOutcome::Updated,
            EditOutcome::NotFound => {
                self.boards.clear_liveboard(entry.community_id).await?;
                info!(community = %entry.community_id, "liveboard message missing, registration cleared");
                RefreshOutcome::Cleared
            }
            EditOutcome::Forbidden => {
                warn!(community = %entry.community_id, channel = %entry.channel_ref, "liveboard edit forbidden");
                RefreshOutcome::Skipped
            }
        })
    }

    /// Refreshes all boards every `every` until `shutdown` becomes true or
    /// its sender is dropped. A refresh in progress is always finished.
    pub async fn run(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = every.as_secs(), "liveboard refresher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh_all().await {
                        Ok(results) => debug!(boards = results.len(), "liveboard tick"),
                        Err(e) => warn!(error = %e, "could not list liveboards"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("liveboard refresher stopped");
    }
}
