//! In-process gateway that records what would have been sent.
//!
//! Messages posted to channels it did not create are accepted, since
//! configured channels exist outside of it. Private channels it created can
//! be deleted; after that they are unknown. `revoke_access` makes a channel
//! refuse edits and deletion the way a platform does when permissions are
//! missing.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use domains::{
    ChannelRef, ChatGateway, CommunityId, DeleteOutcome, DirectMessageOutcome, EditOutcome, MemberId, MessageRef,
    OutboundMessage, PrivateChannelRequest, Result,
};
use tracing::{debug, info};

const FIRST_ID: i64 = 1_000_000;

#[derive(Debug, Clone)]
struct Posted {
    channel: ChannelRef,
    message: OutboundMessage,
}

#[derive(Debug)]
pub struct DryRunGateway {
    next_id: AtomicI64,
    messages: DashMap<MessageRef, Posted>,
    private_channels: DashMap<ChannelRef, PrivateChannelRequest>,
    inboxes: DashMap<MemberId, Vec<String>>,
    closed_inboxes: DashSet<MemberId>,
    revoked: DashSet<ChannelRef>,
}

impl Default for DryRunGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl DryRunGateway {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(FIRST_ID),
            messages: DashMap::new(),
            private_channels: DashMap::new(),
            inboxes: DashMap::new(),
            closed_inboxes: DashSet::new(),
            revoked: DashSet::new(),
        }
    }

    fn allocate(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Current content of a posted message.
    pub fn message(&self, message_ref: MessageRef) -> Option<OutboundMessage> {
        self.messages.get(&message_ref).map(|posted| posted.message.clone())
    }

    /// Messages still present in `channel`, oldest first.
    pub fn messages_in(&self, channel: ChannelRef) -> Vec<OutboundMessage> {
        let mut found: Vec<(MessageRef, OutboundMessage)> = self
            .messages
            .iter()
            .filter(|entry| entry.channel == channel)
            .map(|entry| (*entry.key(), entry.message.clone()))
            .collect();
        found.sort_by_key(|(message_ref, _)| message_ref.0);
        found.into_iter().map(|(_, message)| message).collect()
    }

    pub fn private_channel(&self, channel: ChannelRef) -> Option<PrivateChannelRequest> {
        self.private_channels.get(&channel).map(|request| request.clone())
    }

    pub fn direct_messages(&self, member: MemberId) -> Vec<String> {
        self.inboxes.get(&member).map(|inbox| inbox.clone()).unwrap_or_default()
    }

    /// Makes the member refuse direct messages from now on.
    pub fn close_inbox(&self, member: MemberId) {
        self.closed_inboxes.insert(member);
    }

    /// Edits and deletion in `channel` are forbidden until `restore_access`.
    pub fn revoke_access(&self, channel: ChannelRef) {
        self.revoked.insert(channel);
    }

    pub fn restore_access(&self, channel: ChannelRef) {
        self.revoked.remove(&channel);
    }

    /// Removes a message as if someone deleted it by hand.
    pub fn forget_message(&self, message_ref: MessageRef) -> bool {
        self.messages.remove(&message_ref).is_some()
    }

    /// Removes a private channel as if someone deleted it by hand.
    pub fn forget_channel(&self, channel: ChannelRef) -> bool {
        self.messages.retain(|_, posted| posted.channel != channel);
        self.private_channels.remove(&channel).is_some()
    }
}

#[async_trait]
impl ChatGateway for DryRunGateway {
    async fn send_notification(&self, location: ChannelRef, message: OutboundMessage) -> Result<MessageRef> {
        let message_ref = MessageRef(self.allocate());
        info!(channel = %location, message = %message_ref, controls = ?message.controls, "[dry-run] send\n{}", message.content);
        self.messages.insert(message_ref, Posted { channel: location, message });
        Ok(message_ref)
    }

    async fn edit_notification(
        &self,
        location: ChannelRef,
        message_ref: MessageRef,
        message: OutboundMessage,
    ) -> Result<EditOutcome> {
        if self.revoked.contains(&location) {
            debug!(channel = %location, message = %message_ref, "[dry-run] edit forbidden");
            return Ok(EditOutcome::Forbidden);
        }
        match self.messages.get_mut(&message_ref) {
            Some(mut posted) if posted.channel == location => {
                debug!(channel = %location, message = %message_ref, "[dry-run] edit");
                posted.message = message;
                Ok(EditOutcome::Edited)
            }
            _ => Ok(EditOutcome::NotFound),
        }
    }

    async fn delete_channel(&self, channel: ChannelRef) -> Result<DeleteOutcome> {
        if self.revoked.contains(&channel) {
            debug!(%channel, "[dry-run] delete forbidden");
            return Ok(DeleteOutcome::Forbidden);
        }
        if self.forget_channel(channel) {
            info!(%channel, "[dry-run] channel deleted");
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    async fn channel_exists(&self, channel: ChannelRef) -> Result<bool> {
        Ok(self.private_channels.contains_key(&channel))
    }

    async fn create_private_channel(
        &self,
        community: CommunityId,
        request: PrivateChannelRequest,
    ) -> Result<ChannelRef> {
        let channel = ChannelRef(self.allocate());
        info!(%community, %channel, name = %request.name, "[dry-run] private channel created");
        self.private_channels.insert(channel, request);
        Ok(channel)
    }

    async fn direct_message(&self, member: MemberId, content: String) -> Result<DirectMessageOutcome> {
        if self.closed_inboxes.contains(&member) {
            debug!(%member, "[dry-run] direct message refused");
            return Ok(DirectMessageOutcome::Blocked);
        }
        info!(%member, "[dry-run] direct message\n{content}");
        self.inboxes.entry(member).or_default().push(content);
        Ok(DirectMessageOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::RoleId;

    fn request() -> PrivateChannelRequest {
        PrivateChannelRequest {
            name: "report-1".into(),
            topic: "Ticket for report #1 | report_id=1".into(),
            visible_to: vec![MemberId(42)],
            staff_role: RoleId(66),
            parent: None,
        }
    }

    #[tokio::test]
    async fn test_edit_requires_matching_channel() {
        let gateway = DryRunGateway::new();
        let sent = gateway.send_notification(ChannelRef(1), OutboundMessage::text("first")).await.unwrap();

        let wrong = gateway.edit_notification(ChannelRef(2), sent, OutboundMessage::text("x")).await.unwrap();
        assert_eq!(wrong, EditOutcome::NotFound);

        let edited = gateway.edit_notification(ChannelRef(1), sent, OutboundMessage::text("second")).await.unwrap();
        assert_eq!(edited, EditOutcome::Edited);
        assert_eq!(gateway.message(sent).unwrap().content, "second");

        gateway.forget_message(sent);
        let gone = gateway.edit_notification(ChannelRef(1), sent, OutboundMessage::text("third")).await.unwrap();
        assert_eq!(gone, EditOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_private_channel_lifecycle() {
        let gateway = DryRunGateway::new();
        let channel = gateway.create_private_channel(CommunityId(7), request()).await.unwrap();
        assert!(gateway.channel_exists(channel).await.unwrap());

        gateway.send_notification(channel, OutboundMessage::text("intro")).await.unwrap();
        assert_eq!(gateway.messages_in(channel).len(), 1);

        assert_eq!(gateway.delete_channel(channel).await.unwrap(), DeleteOutcome::Deleted);
        assert!(!gateway.channel_exists(channel).await.unwrap());
        assert!(gateway.messages_in(channel).is_empty());
        assert_eq!(gateway.delete_channel(channel).await.unwrap(), DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_revoked_channel_refuses_edit_and_delete() {
        let gateway = DryRunGateway::new();
        let channel = gateway.create_private_channel(CommunityId(7), request()).await.unwrap();
        let sent = gateway.send_notification(channel, OutboundMessage::text("intro")).await.unwrap();
        gateway.revoke_access(channel);

        let edit = gateway.edit_notification(channel, sent, OutboundMessage::text("x")).await.unwrap();
        assert_eq!(edit, EditOutcome::Forbidden);
        assert_eq!(gateway.delete_channel(channel).await.unwrap(), DeleteOutcome::Forbidden);
        assert!(gateway.channel_exists(channel).await.unwrap());
        assert_eq!(gateway.message(sent).unwrap().content, "intro");

        gateway.restore_access(channel);
        assert_eq!(gateway.delete_channel(channel).await.unwrap(), DeleteOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_closed_inbox_refuses_direct_messages() {
        let gateway = DryRunGateway::new();
        gateway.direct_message(MemberId(42), "hello".into()).await.unwrap();
        gateway.close_inbox(MemberId(42));

        let outcome = gateway.direct_message(MemberId(42), "again".into()).await.unwrap();
        assert_eq!(outcome, DirectMessageOutcome::Blocked);
        assert_eq!(gateway.direct_messages(MemberId(42)), vec!["hello".to_string()]);
    }
}
