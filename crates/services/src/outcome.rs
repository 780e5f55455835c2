//! Partial-success reporting for operations that touch the chat platform.
//!
//! Storage writes either commit or fail the whole operation. Outbound effects
//! that run after a commit never undo it; when one fails it is logged and
//! handed back to the caller here, which may retry it.

use std::fmt;

use domains::AppError;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    StaffNotification,
    StaffSummaryEdit,
    TicketIntro,
    TicketDeletion,
    ReporterMessage,
    PublicUpdate,
    ModLog,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SideEffect::StaffNotification => "staff notification",
            SideEffect::StaffSummaryEdit => "staff summary edit",
            SideEffect::TicketIntro => "ticket intro",
            SideEffect::TicketDeletion => "ticket deletion",
            SideEffect::ReporterMessage => "reporter message",
            SideEffect::PublicUpdate => "public update",
            SideEffect::ModLog => "mod-log entry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectFailure {
    pub effect: SideEffect,
    pub detail: String,
}

/// Accumulates the failed effects of one operation.
#[derive(Debug, Default)]
pub(crate) struct Failures(Vec<SideEffectFailure>);

impl Failures {
    pub fn record(&mut self, effect: SideEffect, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(%effect, %detail, "outbound effect failed");
        self.0.push(SideEffectFailure { effect, detail });
    }

    pub fn record_error(&mut self, effect: SideEffect, error: &AppError) {
        self.record(effect, error.to_string());
    }

    pub fn into_vec(self) -> Vec<SideEffectFailure> {
        self.0
    }
}
