//! The only path by which a report's status changes.
//!
//! Each transition commits one guarded storage write and then runs its
//! outbound effects. A guard that does not match means another actor got
//! there first; that is reported as an illegal transition.

use std::sync::Arc;

use domains::{
    next_status, AppError, ChannelRef, ChatGateway, DeleteOutcome, DirectMessageOutcome, EditOutcome, MemberId,
    OutboundMessage, PrivateChannelRequest, Report, ReportId, ReportLocator, ReportRepository, ReportStatus,
    ResolveWrite, Result, TransitionAction,
};
use tracing::{debug, info, instrument, warn};

use crate::outcome::{Failures, SideEffect, SideEffectFailure};
use crate::render;
use crate::settings::WorkflowSettings;

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The report as stored after the transition
    pub report: Report,
    pub previous: ReportStatus,
    pub failures: Vec<SideEffectFailure>,
}

pub struct LifecycleEngine {
    reports: Arc<dyn ReportRepository>,
    chat: Arc<dyn ChatGateway>,
    settings: Arc<WorkflowSettings>,
}

impl LifecycleEngine {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        chat: Arc<dyn ChatGateway>,
        settings: Arc<WorkflowSettings>,
    ) -> Self {
        Self { reports, chat, settings }
    }

    pub async fn locate(&self, locator: ReportLocator) -> Result<Report> {
        let found = match locator {
            ReportLocator::Id(id) => self.reports.get_report(id).await?,
            ReportLocator::StaffMessage(message) => self.reports.get_by_staff_message_ref(message).await?,
        };
        found.ok_or_else(|| AppError::not_found("report", locator))
    }

    #[instrument(skip(self, note), fields(%locator, %action, %actor))]
    pub async fn transition(
        &self,
        locator: ReportLocator,
        action: TransitionAction,
        actor: MemberId,
        note: Option<String>,
    ) -> Result<TransitionOutcome> {
        let report = self.locate(locator).await?;
        next_status(report.status, action)?;
        let previous = report.status;
        let mut failures = Failures::default();

        let updated = match action {
            TransitionAction::OpenTicket => self.open_ticket(&report, actor, &mut failures).await?,
            TransitionAction::CloseTicket => self.close_ticket(&report, &mut failures).await?,
            TransitionAction::Resolve => self.resolve(&report, actor, note, &mut failures).await?,
            TransitionAction::Reopen => self.reopen(&report, &mut failures).await?,
        };
        info!(report_id = %updated.id, from = %previous, to = %updated.status, "report transitioned");

        Ok(TransitionOutcome { report: updated, previous, failures: failures.into_vec() })
    }

    async fn open_ticket(&self, report: &Report, actor: MemberId, failures: &mut Failures) -> Result<Report> {
        let id = report.id;
        if let Some(existing) = report.ticket_channel_ref {
            if self.chat.channel_exists(existing).await? {
                return Err(AppError::IllegalTransition(format!(
                    "report #{id} already has a ticket: {}",
                    render::channel(existing)
                )));
            }
            // Channel was removed out of band; forget it so a new one can be stored
            self.reports.set_ticket_channel_ref(id, None).await?;
            debug!(report_id = %id, channel = %existing, "cleared stale ticket reference");
        }

        let request = PrivateChannelRequest {
            name: format!("report-{id}"),
            topic: format!("Ticket for report #{id} | report_id={id}"),
            visible_to: vec![report.reporter_id],
            staff_role: self.settings.staff_role,
            parent: self.settings.tickets_category,
        };
        let channel = self.chat.create_private_channel(report.community_id, request).await?;

        if !self.reports.open_ticket(id, channel, actor).await? {
            if let Err(e) = self.chat.delete_channel(channel).await {
                warn!(report_id = %id, %channel, error = %e, "could not remove unused ticket channel");
            }
            return Err(AppError::IllegalTransition(format!(
                "report #{id} changed while its ticket was being opened"
            )));
        }

        let updated = self.reload(id).await?;
        self.post(channel, render::ticket_intro(&updated), SideEffect::TicketIntro, failures).await;
        self.refresh_summary(&updated, failures).await;
        Ok(updated)
    }

    async fn close_ticket(&self, report: &Report, failures: &mut Failures) -> Result<Report> {
        if !self.reports.close_ticket(report.id).await? {
            return Err(AppError::IllegalTransition(format!("report #{} has no open ticket", report.id)));
        }
        if let Some(ticket) = report.ticket_channel_ref {
            self.delete_ticket(report.id, ticket, failures).await;
        }

        let updated = self.reload(report.id).await?;
        self.refresh_summary(&updated, failures).await;
        Ok(updated)
    }

    async fn resolve(
        &self,
        report: &Report,
        actor: MemberId,
        note: Option<String>,
        failures: &mut Failures,
    ) -> Result<Report> {
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        // The same write clears the ticket reference, so a failed channel
        // deletion below cannot wedge future tickets. The channel to delete
        // is the one the write cleared; a ticket opened after `locate` counts.
        let cleared = match self.reports.mark_resolved(report.id, actor, note).await? {
            ResolveWrite::Resolved { cleared_ticket } => cleared_ticket,
            ResolveWrite::Rejected => {
                return Err(AppError::IllegalTransition(format!("report #{} is already closed", report.id)))
            }
        };
        if let Some(ticket) = cleared {
            self.delete_ticket(report.id, ticket, failures).await;
        }

        let updated = self.reload(report.id).await?;
        self.refresh_summary(&updated, failures).await;

        match self.chat.direct_message(updated.reporter_id, render::resolution_notice(&updated)).await {
            Ok(DirectMessageOutcome::Delivered) => {}
            Ok(DirectMessageOutcome::Blocked) => {
                failures.record(SideEffect::ReporterMessage, "reporter does not accept direct messages")
            }
            Err(e) => failures.record_error(SideEffect::ReporterMessage, &e),
        }

        if let Some(responses) = self.settings.responses_channel {
            self.post(responses, render::public_update(&updated), SideEffect::PublicUpdate, failures).await;
        }
        Ok(updated)
    }

    async fn reopen(&self, report: &Report, failures: &mut Failures) -> Result<Report> {
        if !self.reports.reopen(report.id).await? {
            return Err(AppError::IllegalTransition(format!("report #{} is not closed", report.id)));
        }
        let updated = self.reload(report.id).await?;
        self.refresh_summary(&updated, failures).await;
        Ok(updated)
    }

    async fn reload(&self, id: ReportId) -> Result<Report> {
        self.reports.get_report(id).await?.ok_or_else(|| AppError::not_found("report", id))
    }

    async fn delete_ticket(&self, id: ReportId, ticket: ChannelRef, failures: &mut Failures) {
        match self.chat.delete_channel(ticket).await {
            Ok(DeleteOutcome::Deleted) => debug!(report_id = %id, %ticket, "ticket channel deleted"),
            Ok(DeleteOutcome::NotFound) => debug!(report_id = %id, %ticket, "ticket channel already gone"),
            Ok(DeleteOutcome::Forbidden) => {
                failures.record(SideEffect::TicketDeletion, format!("not allowed to delete {}", render::channel(ticket)))
            }
            Err(e) => failures.record_error(SideEffect::TicketDeletion, &e),
        }
    }

    async fn post(&self, location: ChannelRef, message: OutboundMessage, effect: SideEffect, failures: &mut Failures) {
        if let Err(e) = self.chat.send_notification(location, message).await {
            failures.record_error(effect, &e);
        }
    }

    /// Re-renders the staff notification so its actions match the new status.
    async fn refresh_summary(&self, report: &Report, failures: &mut Failures) {
        let Some(message_ref) = report.staff_message_ref else {
            return;
        };
        let edited = self
            .chat
            .edit_notification(self.settings.staff_channel, message_ref, render::staff_summary(report))
            .await;
        match edited {
            Ok(EditOutcome::Edited) => {}
            Ok(EditOutcome::NotFound) => {
                failures.record(SideEffect::StaffSummaryEdit, "staff notification no longer exists")
            }
            Ok(EditOutcome::Forbidden) => {
                failures.record(SideEffect::StaffSummaryEdit, "not allowed to edit the staff notification")
            }
            Err(e) => failures.record_error(SideEffect::StaffSummaryEdit, &e),
        }
    }
}
