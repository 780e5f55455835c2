//! Blocking members from the report system.

use std::sync::Arc;

use domains::{
    AppError, Block, BlockRepository, BlockStatus, BlockTerm, ChatGateway, CommunityId, MemberId, OutboundMessage,
    Result,
};
use tracing::{info, instrument};

use crate::outcome::{Failures, SideEffect, SideEffectFailure};
use crate::render;
use crate::settings::WorkflowSettings;

/// Longest temporary block accepted, one year.
pub const MAX_BLOCK_MINUTES: i64 = 525_600;

#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub block: Block,
    pub failures: Vec<SideEffectFailure>,
}

#[derive(Debug, Clone)]
pub struct UnblockOutcome {
    /// False when the member was not blocked
    pub removed: bool,
    pub failures: Vec<SideEffectFailure>,
}

pub struct ModerationService {
    blocks: Arc<dyn BlockRepository>,
    chat: Arc<dyn ChatGateway>,
    settings: Arc<WorkflowSettings>,
}

impl ModerationService {
    pub fn new(blocks: Arc<dyn BlockRepository>, chat: Arc<dyn ChatGateway>, settings: Arc<WorkflowSettings>) -> Self {
        Self { blocks, chat, settings }
    }

    #[instrument(skip(self, reason), fields(%community, %member, %moderator))]
    pub async fn block(
        &self,
        community: CommunityId,
        member: MemberId,
        term: BlockTerm,
        reason: &str,
        moderator: MemberId,
    ) -> Result<BlockOutcome> {
        if let BlockTerm::Temporary(length) = term {
            let minutes = length.num_minutes();
            if !(0..=MAX_BLOCK_MINUTES).contains(&minutes) {
                return Err(AppError::ValidationError(format!(
                    "block duration must be between 0 and {MAX_BLOCK_MINUTES} minutes"
                )));
            }
        }

        let block = self
            .blocks
            .block_member(community, member, term, reason.trim().to_string(), moderator)
            .await?;
        info!(permanent = block.permanent, expires_at = ?block.expires_at, "member blocked");

        let mut failures = Failures::default();
        self.modlog(render::modlog_block(&block), &mut failures).await;
        Ok(BlockOutcome { block, failures: failures.into_vec() })
    }

    #[instrument(skip(self), fields(%community, %member, %moderator))]
    pub async fn unblock(&self, community: CommunityId, member: MemberId, moderator: MemberId) -> Result<UnblockOutcome> {
        let removed = self.blocks.unblock_member(community, member).await?;
        info!(removed, "member unblocked");

        let mut failures = Failures::default();
        self.modlog(render::modlog_unblock(member, moderator, removed), &mut failures).await;
        Ok(UnblockOutcome { removed, failures: failures.into_vec() })
    }

    pub async fn is_blocked(&self, community: CommunityId, member: MemberId) -> Result<BlockStatus> {
        self.blocks.is_blocked(community, member).await
    }

    pub async fn list(&self, community: CommunityId) -> Result<Vec<Block>> {
        self.blocks.list_blocks(community).await
    }

    async fn modlog(&self, message: OutboundMessage, failures: &mut Failures) {
        let Some(channel) = self.settings.modlogs_channel else {
            return;
        };
        if let Err(e) = self.chat.send_notification(channel, message).await {
            failures.record_error(SideEffect::ModLog, &e);
        }
    }
}
