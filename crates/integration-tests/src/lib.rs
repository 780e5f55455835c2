//! Shared harness for the end-to-end tests: the real services wired to an
//! in-memory SQLite store and the dry-run chat gateway.

use std::sync::Arc;

use chat_adapters::DryRunGateway;
use domains::{ChannelRef, CommunityId, MemberId, Report, RoleId};
use services::{
    IntakeOutcome, IntakeService, LifecycleEngine, LiveboardService, ModerationService, ReportForm, ReportSubmission,
    SettingsService, WorkflowSettings,
};
use storage_adapters::SqliteStore;

pub const COMMUNITY: CommunityId = CommunityId(7);
pub const REPORTER: MemberId = MemberId(42);
pub const STAFF: MemberId = MemberId(5);
pub const STAFF_CHANNEL: ChannelRef = ChannelRef(555);
pub const REPORTS_CHANNEL: ChannelRef = ChannelRef(900);
pub const RESPONSES_CHANNEL: ChannelRef = ChannelRef(333);
pub const MODLOGS_CHANNEL: ChannelRef = ChannelRef(222);
pub const SUPPORT_CHANNEL: ChannelRef = ChannelRef(444);

pub fn workflow_settings() -> WorkflowSettings {
    WorkflowSettings {
        staff_channel: STAFF_CHANNEL,
        staff_role: RoleId(66),
        support_channel: Some(SUPPORT_CHANNEL),
        report_channels: vec![REPORTS_CHANNEL],
        tv_staff_pings: vec![MemberId(11)],
        vod_staff_pings: vec![MemberId(12)],
        responses_channel: Some(RESPONSES_CHANNEL),
        modlogs_channel: Some(MODLOGS_CHANNEL),
        tickets_category: None,
        liveboard_max_rows: 20,
        message_link_base: "https://discord.com/channels".into(),
    }
}

pub struct Desk {
    pub store: SqliteStore,
    pub gateway: Arc<DryRunGateway>,
    pub intake: IntakeService,
    pub lifecycle: LifecycleEngine,
    pub moderation: ModerationService,
    pub liveboard: Arc<LiveboardService>,
    pub toggles: SettingsService,
}

impl Desk {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_settings(workflow_settings()).await
    }

    pub async fn with_settings(settings: WorkflowSettings) -> anyhow::Result<Self> {
        let store = SqliteStore::in_memory().await?;
        let gateway = Arc::new(DryRunGateway::new());
        let settings = Arc::new(settings);
        let repo = Arc::new(store.clone());

        Ok(Self {
            intake: IntakeService::new(
                repo.clone(),
                repo.clone(),
                SettingsService::new(repo.clone()),
                gateway.clone(),
                settings.clone(),
            ),
            lifecycle: LifecycleEngine::new(repo.clone(), gateway.clone(), settings.clone()),
            moderation: ModerationService::new(repo.clone(), gateway.clone(), settings.clone()),
            liveboard: Arc::new(LiveboardService::new(repo.clone(), repo.clone(), gateway.clone(), settings)),
            toggles: SettingsService::new(repo),
            gateway,
            store,
        })
    }

    /// Files a report and expects it to be accepted.
    pub async fn file(&self, form: ReportForm) -> anyhow::Result<Report> {
        let outcome = self
            .intake
            .submit(ReportSubmission {
                reporter: REPORTER,
                community: COMMUNITY,
                source_location: REPORTS_CHANNEL,
                form,
            })
            .await?;
        match outcome {
            IntakeOutcome::Filed { report, .. } => Ok(report),
            IntakeOutcome::Blocked { notice, .. } => anyhow::bail!("report refused: {notice}"),
        }
    }
}

pub fn tv_form(channel: &str) -> ReportForm {
    ReportForm::Tv {
        channel_name: channel.into(),
        channel_category: "Entertainment".into(),
        issue: "Buffering every few seconds".into(),
    }
}

pub fn vod_form(title: &str) -> ReportForm {
    ReportForm::Vod {
        title: title.into(),
        reference_link: "https://thetvdb.com/series/example".into(),
        quality: "FHD".into(),
        issue: "Subtitles out of sync".into(),
    }
}
