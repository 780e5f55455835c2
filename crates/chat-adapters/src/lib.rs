//! # chat-adapters
//!
//! Implementations of the `ChatGateway` port. The dry-run gateway keeps every
//! outbound effect in memory and logs it, so the desk can run headless.

#[cfg(feature = "dry-run")]
pub mod dry_run;

#[cfg(feature = "dry-run")]
pub use dry_run::DryRunGateway;
