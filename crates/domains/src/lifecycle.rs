//! Report status machine.
//!
//! ```text
//!            OpenTicket              Resolve
//!   Open ───────────────▶ Ticket Open ──────────▶ Resolved
//!    ▲  ◀───────────────                              │
//!    │      CloseTicket                               │
//!    └────────────────────── Reopen ──────────────────┘
//!   Open ─────────────────── Resolve ──────────────▶ Resolved
//! ```
//!
//! This module only answers "is this move legal and where does it land".
//! Side effects belong to the lifecycle engine in `services`.

use std::fmt;

use crate::error::{AppError, Result};
use crate::models::ReportStatus;

/// A staff action against a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionAction {
    OpenTicket,
    CloseTicket,
    Resolve,
    /// Administrative override of a resolution
    Reopen,
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransitionAction::OpenTicket => "open ticket",
            TransitionAction::CloseTicket => "close ticket",
            TransitionAction::Resolve => "resolve",
            TransitionAction::Reopen => "reopen",
        })
    }
}

/// Target status of `action` applied to `from`, or `IllegalTransition`.
///
/// `OpenTicket` from `Ticket Open` is legal here: a ticket channel deleted
/// out-of-band leaves the status behind, and the engine decides whether the
/// old channel still blocks a new one.
pub fn next_status(from: ReportStatus, action: TransitionAction) -> Result<ReportStatus> {
    use ReportStatus::*;
    use TransitionAction::*;

    match (from, action) {
        (Open | TicketOpen, OpenTicket) => Ok(TicketOpen),
        (TicketOpen, CloseTicket) => Ok(Open),
        (Open | TicketOpen, Resolve) => Ok(Resolved),
        (Resolved, Reopen) => Ok(Open),
        (Resolved, _) => Err(AppError::IllegalTransition("report is already closed".into())),
        (Open, CloseTicket) => Err(AppError::IllegalTransition("report has no open ticket".into())),
        (Open | TicketOpen, Reopen) => Err(AppError::IllegalTransition("report is not closed".into())),
    }
}
