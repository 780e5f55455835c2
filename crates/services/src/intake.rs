//! Report intake: validation, block check, persistence and the staff post.

use std::sync::Arc;

use domains::{
    AppError, BlockRepository, BlockStatus, ChannelRef, ChatGateway, CommunityId, MemberId, NewReport, Report,
    ReportRepository, Result,
};
use tracing::{info, instrument, warn};

use crate::outcome::{Failures, SideEffect, SideEffectFailure};
use crate::render;
use crate::settings::{SettingsService, WorkflowSettings};
use crate::validation::{validate_form, ReportForm};

/// A member's filled-in form, with where and by whom it was submitted.
#[derive(Debug, Clone)]
pub struct ReportSubmission {
    pub reporter: MemberId,
    pub community: CommunityId,
    pub source_location: ChannelRef,
    pub form: ReportForm,
}

#[derive(Debug, Clone)]
pub enum IntakeOutcome {
    Filed {
        report: Report,
        /// Shown privately to the reporter
        acknowledgement: String,
        failures: Vec<SideEffectFailure>,
    },
    /// Nothing was stored
    Blocked { status: BlockStatus, notice: String },
}

pub struct IntakeService {
    reports: Arc<dyn ReportRepository>,
    blocks: Arc<dyn BlockRepository>,
    toggles: SettingsService,
    chat: Arc<dyn ChatGateway>,
    settings: Arc<WorkflowSettings>,
}

impl IntakeService {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        blocks: Arc<dyn BlockRepository>,
        toggles: SettingsService,
        chat: Arc<dyn ChatGateway>,
        settings: Arc<WorkflowSettings>,
    ) -> Self {
        Self { reports, blocks, toggles, chat, settings }
    }

    #[instrument(skip(self, submission), fields(reporter = %submission.reporter, community = %submission.community))]
    pub async fn submit(&self, submission: ReportSubmission) -> Result<IntakeOutcome> {
        if !self.settings.accepts_reports_from(submission.source_location) {
            let allowed: Vec<String> = self.settings.report_channels.iter().map(|c| render::channel(*c)).collect();
            return Err(AppError::ValidationError(format!(
                "reports can only be filed in {}",
                allowed.join(", ")
            )));
        }

        let payload = validate_form(submission.form)?;

        let status = self.blocks.is_blocked(submission.community, submission.reporter).await?;
        if status.blocked {
            info!(permanent = status.permanent, "blocked member refused");
            let notice = render::block_notice(&status, self.settings.support_channel);
            return Ok(IntakeOutcome::Blocked { status, notice });
        }

        let kind = payload.kind();
        let pings = if self.toggles.report_pings_enabled().await? {
            render::staff_pings(self.settings.staff_pings(kind))
        } else {
            None
        };

        let id = self
            .reports
            .create_report(NewReport {
                reporter_id: submission.reporter,
                community_id: submission.community,
                source_location_id: submission.source_location,
                payload,
            })
            .await?;
        let mut report = self
            .reports
            .get_report(id)
            .await?
            .ok_or_else(|| AppError::not_found("report", id))?;
        info!(report_id = %id, %kind, "report filed");

        let mut failures = Failures::default();
        let mut message = render::staff_summary(&report);
        if let Some(pings) = pings {
            message.content = format!("{pings}\n{}", message.content);
        }

        match self.chat.send_notification(self.settings.staff_channel, message).await {
            Ok(message_ref) => match self.reports.set_staff_message_ref(id, message_ref).await {
                Ok(true) => report.staff_message_ref = Some(message_ref),
                Ok(false) => warn!(report_id = %id, "staff message reference was already set"),
                Err(e) => failures.record_error(SideEffect::StaffNotification, &e),
            },
            Err(e) => failures.record_error(SideEffect::StaffNotification, &e),
        }

        Ok(IntakeOutcome::Filed {
            acknowledgement: render::acknowledgement(&report),
            report,
            failures: failures.into_vec(),
        })
    }
}
