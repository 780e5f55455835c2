use std::sync::Arc;

use domains::{AppError, Controls, MemberId, ReportLocator, ReportRepository, ReportStatus, TransitionAction};
use integration_tests::{tv_form, Desk, REPORTER, RESPONSES_CHANNEL, STAFF};
use services::SideEffect;

#[tokio::test]
async fn scenario_a_ticket_then_resolve() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    let stored = desk.store.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Open);
    assert_eq!(stored.payload.subject(), "Example One");

    let opened = desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap();
    assert_eq!(opened.report.status, ReportStatus::TicketOpen);
    let ticket = opened.report.ticket_channel_ref.expect("ticket channel stored");
    assert_eq!(opened.report.claimed_by, Some(STAFF));

    let request = desk.gateway.private_channel(ticket).unwrap();
    assert_eq!(request.visible_to, vec![REPORTER]);
    let intro = desk.gateway.messages_in(ticket);
    assert_eq!(intro.len(), 1);
    assert_eq!(intro[0].controls, Controls::TicketActions { resolve: true });

    let resolved = desk.lifecycle.transition(id, TransitionAction::Resolve, STAFF, None).await.unwrap();
    assert_eq!(resolved.report.status, ReportStatus::Resolved);
    assert_eq!(resolved.report.ticket_channel_ref, None);
    assert!(resolved.failures.is_empty(), "{:?}", resolved.failures);
    assert!(desk.gateway.private_channel(ticket).is_none());
}

#[tokio::test]
async fn resolve_updates_summary_notifies_reporter_and_announces() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let staff_message = report.staff_message_ref.unwrap();

    desk.lifecycle
        .transition(
            ReportLocator::StaffMessage(staff_message),
            TransitionAction::Resolve,
            STAFF,
            Some("Feed restarted".into()),
        )
        .await
        .unwrap();

    let summary = desk.gateway.message(staff_message).unwrap();
    assert_eq!(summary.controls, Controls::ReportActions { open_ticket: false, resolve: false });
    assert!(summary.content.contains("Feed restarted"));

    let inbox = desk.gateway.direct_messages(REPORTER);
    assert_eq!(inbox.len(), 1);
    assert!(inbox[0].contains(&format!("#{}", report.id)));

    assert_eq!(desk.gateway.messages_in(RESPONSES_CHANNEL).len(), 1);
}

#[tokio::test]
async fn second_resolve_is_rejected_and_keeps_first_stamp() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    desk.lifecycle.transition(id, TransitionAction::Resolve, STAFF, None).await.unwrap();
    let first = desk.store.get_report(report.id).await.unwrap().unwrap();

    let err = desk.lifecycle.transition(id, TransitionAction::Resolve, STAFF, None).await.unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition(_)));

    let after = desk.store.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(after.resolved_at, first.resolved_at);
    assert_eq!(desk.gateway.direct_messages(REPORTER).len(), 1);
}

#[tokio::test]
async fn duplicate_ticket_rejected_until_closed() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap();
    let err = desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition(_)));

    let closed = desk.lifecycle.transition(id, TransitionAction::CloseTicket, STAFF, None).await.unwrap();
    assert_eq!(closed.report.status, ReportStatus::Open);
    assert_eq!(closed.report.ticket_channel_ref, None);

    let reopened = desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap();
    assert_eq!(reopened.report.status, ReportStatus::TicketOpen);
}

#[tokio::test]
async fn ticket_deleted_out_of_band_does_not_wedge_new_tickets() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    let first = desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap();
    let stale = first.report.ticket_channel_ref.unwrap();
    assert!(desk.gateway.forget_channel(stale));

    let second = desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap();
    let fresh = second.report.ticket_channel_ref.unwrap();
    assert_ne!(fresh, stale);
}

#[tokio::test]
async fn reopen_keeps_resolution_audit() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    let err = desk.lifecycle.transition(id, TransitionAction::Reopen, STAFF, None).await.unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition(_)));

    desk.lifecycle.transition(id, TransitionAction::Resolve, STAFF, Some("done".into())).await.unwrap();
    let reopened = desk.lifecycle.transition(id, TransitionAction::Reopen, STAFF, None).await.unwrap();

    assert_eq!(reopened.report.status, ReportStatus::Open);
    assert_eq!(reopened.report.resolved_by, Some(STAFF));
    assert_eq!(reopened.report.resolution_note.as_deref(), Some("done"));

    let summary = desk.gateway.message(report.staff_message_ref.unwrap()).unwrap();
    assert_eq!(summary.controls, Controls::ReportActions { open_ticket: true, resolve: true });
}

#[tokio::test]
async fn summary_edit_on_deleted_message_is_reported_not_fatal() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    desk.gateway.forget_message(report.staff_message_ref.unwrap());

    let outcome = desk
        .lifecycle
        .transition(ReportLocator::Id(report.id), TransitionAction::Resolve, STAFF, None)
        .await
        .unwrap();
    assert_eq!(outcome.report.status, ReportStatus::Resolved);
    assert_eq!(outcome.failures.len(), 1);
}

#[tokio::test]
async fn forbidden_ticket_deletion_still_resolves() {
    let desk = Desk::new().await.unwrap();
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    let opened = desk.lifecycle.transition(id, TransitionAction::OpenTicket, STAFF, None).await.unwrap();
    let ticket = opened.report.ticket_channel_ref.unwrap();
    desk.gateway.revoke_access(ticket);

    let resolved = desk.lifecycle.transition(id, TransitionAction::Resolve, STAFF, None).await.unwrap();
    assert_eq!(resolved.report.status, ReportStatus::Resolved);
    assert_eq!(resolved.report.ticket_channel_ref, None);
    let effects: Vec<SideEffect> = resolved.failures.iter().map(|f| f.effect).collect();
    assert_eq!(effects, vec![SideEffect::TicketDeletion]);
    assert!(desk.gateway.private_channel(ticket).is_some());

    // The reporter and the public channel still hear about it
    assert_eq!(desk.gateway.direct_messages(REPORTER).len(), 1);
    assert_eq!(desk.gateway.messages_in(RESPONSES_CHANNEL).len(), 1);
}

#[tokio::test]
async fn concurrent_resolves_have_one_winner() {
    let desk = Arc::new(Desk::new().await.unwrap());
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    let mut handles = Vec::new();
    for staff in 1..=4 {
        let desk = desk.clone();
        handles.push(tokio::spawn(async move {
            desk.lifecycle
                .transition(id, TransitionAction::Resolve, MemberId(staff), None)
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                winners += 1;
                assert_eq!(outcome.report.status, ReportStatus::Resolved);
            }
            Err(err) => assert!(matches!(err, AppError::IllegalTransition(_)), "{err}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(desk.gateway.direct_messages(REPORTER).len(), 1);
    assert_eq!(desk.gateway.messages_in(RESPONSES_CHANNEL).len(), 1);
}

#[tokio::test]
async fn concurrent_ticket_opens_leave_one_channel() {
    let desk = Arc::new(Desk::new().await.unwrap());
    let report = desk.file(tv_form("Example One")).await.unwrap();
    let id = ReportLocator::Id(report.id);

    let mut handles = Vec::new();
    for _ in 0..3 {
        let desk = desk.clone();
        handles.push(tokio::spawn(async move {
            desk.lifecycle
                .transition(id, TransitionAction::OpenTicket, STAFF, None)
                .await
        }));
    }

    let mut tickets = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => tickets.push(outcome.report.ticket_channel_ref.unwrap()),
            Err(err) => assert!(matches!(err, AppError::IllegalTransition(_)), "{err}"),
        }
    }
    assert_eq!(tickets.len(), 1);

    let stored = desk.store.get_report(report.id).await.unwrap().unwrap();
    assert_eq!(stored.ticket_channel_ref, Some(tickets[0]));
    assert!(desk.gateway.private_channel(tickets[0]).is_some());
}
