//! # Ports
//!
//! Storage adapters implement the repository traits; a chat platform adapter
//! implements `ChatGateway`. Services only ever see these traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Block, BlockStatus, BlockTerm, ChannelRef, CommunityId, LiveboardEntry, MemberId, MessageRef,
    NewReport, Report, ReportId, ReportStatus, RoleId,
};

/// Persistence contract for reports.
///
/// The status-changing methods are low-level primitives. Only the lifecycle
/// engine calls them, so each transition's side effects happen exactly once.
/// Guarded writes return `false` when the row was not in the expected state.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Inserts with `status = Open` and returns the new id.
    async fn create_report(&self, report: NewReport) -> Result<ReportId>;

    /// Sets the staff message reference if it is still unset.
    async fn set_staff_message_ref(&self, id: ReportId, message: MessageRef) -> Result<bool>;

    async fn get_report(&self, id: ReportId) -> Result<Option<Report>>;
    async fn get_by_staff_message_ref(&self, message: MessageRef) -> Result<Option<Report>>;

    /// Unconditional status write.
    async fn update_status(&self, id: ReportId, status: ReportStatus) -> Result<bool>;

    /// Open | Ticket Open -> Resolved, stamping the resolver and clearing
    /// any ticket reference in the same write. The cleared reference is the
    /// one stored at commit time, not whatever the caller read earlier.
    async fn mark_resolved(&self, id: ReportId, resolver: MemberId, note: Option<String>) -> Result<ResolveWrite>;

    async fn set_ticket_channel_ref(&self, id: ReportId, channel: Option<ChannelRef>) -> Result<bool>;

    /// -> Ticket Open with the ticket stored and the claim stamped. Requires
    /// no stored ticket and a status other than Resolved.
    async fn open_ticket(&self, id: ReportId, channel: ChannelRef, claimed_by: MemberId) -> Result<bool>;

    /// Ticket Open -> Open with the ticket reference cleared.
    async fn close_ticket(&self, id: ReportId) -> Result<bool>;

    /// Resolved -> Open. Resolution audit fields are kept.
    async fn reopen(&self, id: ReportId) -> Result<bool>;

    /// Reports of a community whose status is not excluded, newest first.
    async fn list_active(&self, community: CommunityId, excluded: &[ReportStatus]) -> Result<Vec<Report>>;
}

/// Result of `ReportRepository::mark_resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveWrite {
    Resolved { cleared_ticket: Option<ChannelRef> },
    /// Already resolved, or no such report
    Rejected,
}

/// Persistence contract for member blocks. Reads apply lazy expiry.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// Upserts; replaces any earlier block for the same member.
    async fn block_member(
        &self,
        community: CommunityId,
        member: MemberId,
        term: BlockTerm,
        reason: String,
        created_by: MemberId,
    ) -> Result<Block>;

    /// True iff a row was removed.
    async fn unblock_member(&self, community: CommunityId, member: MemberId) -> Result<bool>;

    async fn is_blocked(&self, community: CommunityId, member: MemberId) -> Result<BlockStatus>;

    /// Permanent blocks first, then temporary ones by soonest expiry.
    async fn list_blocks(&self, community: CommunityId) -> Result<Vec<Block>>;
}

/// String key/value settings.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

/// One live summary message per community.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LiveboardRepository: Send + Sync {
    async fn register_liveboard(&self, entry: LiveboardEntry) -> Result<()>;
    async fn get_liveboard(&self, community: CommunityId) -> Result<Option<LiveboardEntry>>;
    async fn list_liveboards(&self) -> Result<Vec<LiveboardEntry>>;
    async fn clear_liveboard(&self, community: CommunityId) -> Result<bool>;
}

// ── Chat platform ────────────────────────────────────────────────────────────

/// Interactive controls attached to an outbound message. The platform adapter
/// maps these onto whatever widgets it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Controls {
    #[default]
    None,
    /// Buttons on the staff notification
    ReportActions { open_ticket: bool, resolve: bool },
    /// Button inside a ticket channel
    TicketActions { resolve: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage {
    pub content: String,
    pub controls: Controls,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), controls: Controls::None }
    }

    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }
}

/// Request for a private follow-up channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateChannelRequest {
    pub name: String,
    pub topic: String,
    pub visible_to: Vec<MemberId>,
    pub staff_role: RoleId,
    pub parent: Option<ChannelRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    NotFound,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectMessageOutcome {
    Delivered,
    /// The member does not accept direct messages
    Blocked,
}

/// Outbound calls into the chat platform. Transport failures are returned as
/// `AppError::ExternalUnavailable`; expected negative answers are outcomes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_notification(&self, location: ChannelRef, message: OutboundMessage) -> Result<MessageRef>;

    async fn edit_notification(
        &self,
        location: ChannelRef,
        message_ref: MessageRef,
        message: OutboundMessage,
    ) -> Result<EditOutcome>;

    async fn delete_channel(&self, channel: ChannelRef) -> Result<DeleteOutcome>;

    async fn channel_exists(&self, channel: ChannelRef) -> Result<bool>;

    async fn create_private_channel(
        &self,
        community: CommunityId,
        request: PrivateChannelRequest,
    ) -> Result<ChannelRef>;

    async fn direct_message(&self, member: MemberId, content: String) -> Result<DirectMessageOutcome>;
}
