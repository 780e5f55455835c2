use domains::{BlockStatus, BlockTerm, CommunityId, MemberId};
use integration_tests::{Desk, MODLOGS_CHANNEL};

#[tokio::test]
async fn scenario_b_permanent_block_and_unblock() {
    let desk = Desk::new().await.unwrap();
    let (community, member) = (CommunityId(7), MemberId(42));

    desk.moderation.block(community, member, BlockTerm::Permanent, "spam", MemberId(1)).await.unwrap();
    assert_eq!(
        desk.moderation.is_blocked(community, member).await.unwrap(),
        BlockStatus { blocked: true, permanent: true, expires_at: None, reason: "spam".into() }
    );

    let unblocked = desk.moderation.unblock(community, member, MemberId(1)).await.unwrap();
    assert!(unblocked.removed);
    assert_eq!(
        desk.moderation.is_blocked(community, member).await.unwrap(),
        BlockStatus { blocked: false, permanent: false, expires_at: None, reason: String::new() }
    );

    let log = desk.gateway.messages_in(MODLOGS_CHANNEL);
    assert_eq!(log.len(), 2);
    assert!(log[0].content.contains("block"));
    assert!(log[1].content.contains("Unblocked"));
}

#[tokio::test]
async fn zero_minute_block_is_already_expired() {
    let desk = Desk::new().await.unwrap();
    let (community, member) = (CommunityId(7), MemberId(42));

    desk.moderation.block(community, member, BlockTerm::minutes(0), "", MemberId(1)).await.unwrap();
    assert!(!desk.moderation.is_blocked(community, member).await.unwrap().blocked);
    assert!(desk.moderation.list(community).await.unwrap().is_empty());

    let second = desk.moderation.unblock(community, member, MemberId(1)).await.unwrap();
    assert!(!second.removed);
}

#[tokio::test]
async fn list_orders_permanent_first() {
    let desk = Desk::new().await.unwrap();
    let community = CommunityId(7);
    desk.moderation.block(community, MemberId(1), BlockTerm::minutes(60), "", MemberId(9)).await.unwrap();
    desk.moderation.block(community, MemberId(2), BlockTerm::minutes(5), "", MemberId(9)).await.unwrap();
    desk.moderation.block(community, MemberId(3), BlockTerm::Permanent, "", MemberId(9)).await.unwrap();

    let order: Vec<MemberId> = desk.moderation.list(community).await.unwrap().iter().map(|b| b.member_id).collect();
    assert_eq!(order, vec![MemberId(3), MemberId(2), MemberId(1)]);
}
