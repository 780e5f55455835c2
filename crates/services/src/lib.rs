//! report-desk/crates/services/src/lib.rs
//!
//! Application services. Each one is constructed with the ports it needs and
//! the read-only `WorkflowSettings`; none of them owns global state.

pub mod intake;
pub mod lifecycle;
pub mod liveboard;
pub mod moderation;
pub mod outcome;
pub mod render;
pub mod settings;
pub mod validation;

pub use intake::{IntakeOutcome, IntakeService, ReportSubmission};
pub use lifecycle::{LifecycleEngine, TransitionOutcome};
pub use liveboard::{LiveboardService, RefreshOutcome};
pub use moderation::{BlockOutcome, ModerationService, UnblockOutcome};
pub use outcome::{SideEffect, SideEffectFailure};
pub use settings::{SettingsService, WorkflowSettings};
pub use validation::{validate_form, ReportForm};
