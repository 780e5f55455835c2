//! Deployment parameters for the workflow, and the runtime feature toggles.

use std::sync::Arc;

use domains::{ChannelRef, MemberId, ReportKind, Result, RoleId, SettingKey, SettingsRepository};
use tracing::info;

/// Read-only deployment parameters every service is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Where staff notifications are posted and acted upon
    pub staff_channel: ChannelRef,
    pub staff_role: RoleId,
    /// Named in block notices as the place to appeal
    pub support_channel: Option<ChannelRef>,
    /// Channels intake accepts reports from; empty means anywhere
    pub report_channels: Vec<ChannelRef>,
    pub tv_staff_pings: Vec<MemberId>,
    pub vod_staff_pings: Vec<MemberId>,
    /// Resolutions are also announced here when set
    pub responses_channel: Option<ChannelRef>,
    pub modlogs_channel: Option<ChannelRef>,
    /// Parent category for ticket channels
    pub tickets_category: Option<ChannelRef>,
    pub liveboard_max_rows: usize,
    /// Prefix of message permalinks, e.g. `https://discord.com/channels`
    pub message_link_base: String,
}

impl WorkflowSettings {
    pub fn staff_pings(&self, kind: ReportKind) -> &[MemberId] {
        match kind {
            ReportKind::Tv => &self.tv_staff_pings,
            ReportKind::Vod => &self.vod_staff_pings,
        }
    }

    pub fn accepts_reports_from(&self, channel: ChannelRef) -> bool {
        self.report_channels.is_empty() || self.report_channels.contains(&channel)
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}

/// Boolean toggles stored in the settings table.
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    pub async fn flag(&self, key: SettingKey) -> Result<bool> {
        let raw = self.repo.get_setting(key.key()).await?;
        Ok(parse_flag(raw.as_deref().unwrap_or(key.default_value())))
    }

    pub async fn report_pings_enabled(&self) -> Result<bool> {
        self.flag(SettingKey::ReportPingsEnabled).await
    }

    /// Flips the toggle and returns the new value.
    pub async fn toggle(&self, key: SettingKey) -> Result<bool> {
        let enabled = !self.flag(key).await?;
        self.repo.set_setting(key.key(), if enabled { "1" } else { "0" }).await?;
        info!(setting = key.key(), enabled, "setting toggled");
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockSettingsRepository;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_missing_row_uses_default() {
        let mut repo = MockSettingsRepository::new();
        repo.expect_get_setting().returning(|_| Ok(None));

        let service = SettingsService::new(Arc::new(repo));
        assert!(service.report_pings_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_writes_inverse() {
        let mut repo = MockSettingsRepository::new();
        repo.expect_get_setting()
            .with(eq("report_pings_enabled"))
            .returning(|_| Ok(Some("1".into())));
        repo.expect_set_setting()
            .with(eq("report_pings_enabled"), eq("0"))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = SettingsService::new(Arc::new(repo));
        assert!(!service.toggle(SettingKey::ReportPingsEnabled).await.unwrap());
    }

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag(" On "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }
}
