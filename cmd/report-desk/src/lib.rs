//! # report-desk
//!
//! Assembles the desk from configuration: one SQLite store behind every
//! repository port, one chat gateway, and the services built on them. A chat
//! platform adapter dispatches member and staff events into `App`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chat_adapters::DryRunGateway;
use configs::{AppConfig, DeskConfig, LiveboardConfig, LogFormat, TelemetryConfig};
use domains::{ChannelRef, MemberId, RoleId};
use services::{IntakeService, LifecycleEngine, LiveboardService, ModerationService, SettingsService, WorkflowSettings};
use storage_adapters::SqliteStore;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(telemetry: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&telemetry.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match telemetry.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn ids<T: From<i64>>(raw: &[i64]) -> Vec<T> {
    raw.iter().copied().map(T::from).collect()
}

pub fn workflow_settings(desk: &DeskConfig, liveboard: &LiveboardConfig) -> WorkflowSettings {
    WorkflowSettings {
        staff_channel: ChannelRef(desk.staff_channel_id),
        staff_role: RoleId(desk.staff_role_id),
        support_channel: desk.support_channel_id.map(ChannelRef),
        report_channels: ids(&desk.reports_channel_ids),
        tv_staff_pings: ids::<MemberId>(desk.tv_staff_pings()),
        vod_staff_pings: ids::<MemberId>(desk.vod_staff_pings()),
        responses_channel: desk.responses_channel().map(ChannelRef),
        modlogs_channel: desk.modlogs_channel_id.map(ChannelRef),
        tickets_category: desk.tickets_category_id.map(ChannelRef),
        liveboard_max_rows: liveboard.max_rows,
        message_link_base: desk.message_link_base.clone(),
    }
}

pub struct App {
    pub store: SqliteStore,
    pub gateway: Arc<DryRunGateway>,
    pub intake: IntakeService,
    pub lifecycle: LifecycleEngine,
    pub moderation: ModerationService,
    pub liveboard: Arc<LiveboardService>,
    pub toggles: SettingsService,
    refresh_every: Duration,
}

impl App {
    pub async fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("opening database {}", config.database.url))?;

        if config.platform.token.is_some() {
            info!("platform token configured; outbound effects still go through the dry-run gateway");
        }
        let gateway = Arc::new(DryRunGateway::new());
        let settings = Arc::new(workflow_settings(&config.desk, &config.liveboard));
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
            refresh_every: Duration::from_secs(config.liveboard.refresh_secs),
        })
    }

    /// Runs the liveboard refresher until `shutdown` resolves, then stops it
    /// and closes the store.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let pings = self.toggles.report_pings_enabled().await.context("reading settings")?;
        info!(report_pings = pings, refresh_secs = self.refresh_every.as_secs(), "report desk ready");

        let (stop_tx, stop_rx) = watch::channel(false);
        let refresher = tokio::spawn(self.liveboard.clone().run(self.refresh_every, stop_rx));

        shutdown.await;
        info!("shutting down");
        // Receiver may already be gone if the refresher exited on its own
        let _ = stop_tx.send(true);
        refresher.await.context("liveboard refresher panicked")?;

        self.store.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOML: &str = r#"
        [desk]
        staff_channel_id = 555
        reports_channel_ids = [900, 901]
        staff_ping_user_ids = [11]
        vod_staff_ping_user_ids = [12]
        staff_role_id = 66
        public_updates = false
        responses_channel_id = 333

        [database]
        url = "sqlite::memory:"
        max_connections = 1
    "#;

    #[test]
    fn test_settings_mapping() {
        let config = AppConfig::from_parts(TOML, HashMap::new()).unwrap();
        let settings = workflow_settings(&config.desk, &config.liveboard);

        assert_eq!(settings.report_channels, vec![ChannelRef(900), ChannelRef(901)]);
        assert_eq!(settings.tv_staff_pings, vec![MemberId(11)]);
        assert_eq!(settings.vod_staff_pings, vec![MemberId(12)]);
        assert_eq!(settings.responses_channel, None);
        assert_eq!(settings.liveboard_max_rows, 20);
    }

    #[tokio::test]
    async fn test_serve_returns_after_shutdown() {
        let config = AppConfig::from_parts(TOML, HashMap::new()).unwrap();
        let app = App::build(&config).await.unwrap();
        app.serve(async {}).await.unwrap();
    }
}
