//! Text renderings of reports, boards and moderation events.
//!
//! Output is chat-flavoured markdown; mentions use the `<@member>` /
//! `<#channel>` / `<t:unix:R>` forms the platform adapter passes through.

use chrono::{DateTime, Utc};
use domains::{
    Block, BlockStatus, ChannelRef, CommunityId, Controls, MemberId, OutboundMessage, Report, ReportKind,
    ReportPayload, ReportStatus,
};

use crate::settings::WorkflowSettings;

const FIELD_LIMIT: usize = 1024;

pub fn member(id: MemberId) -> String {
    format!("<@{id}>")
}

pub fn channel(id: ChannelRef) -> String {
    format!("<#{id}>")
}

pub fn relative_time(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

/// Display name of the catalogue a reference link points at.
pub fn reference_label(link: &str) -> &'static str {
    let lower = link.to_ascii_lowercase();
    if lower.contains("thetvdb") {
        "TheTVDB"
    } else if lower.contains("themoviedb") || lower.contains("tmdb") {
        "TMDB"
    } else if lower.contains("imdb") {
        "IMDb"
    } else {
        "Reference"
    }
}

fn payload_lines(payload: &ReportPayload, out: &mut Vec<String>) {
    match payload {
        ReportPayload::Tv(tv) => {
            out.push(format!("**Channel:** {}", tv.channel_name));
            out.push(format!("**Category:** {}", tv.channel_category));
            out.push(format!("**Issue:** {}", clip(&tv.issue, FIELD_LIMIT)));
        }
        ReportPayload::Vod(vod) => {
            out.push(format!("**Title:** {}", vod.title));
            out.push(format!("**Quality:** {}", vod.quality));
            out.push(format!(
                "**Reference:** [{}]({})",
                reference_label(&vod.reference_link),
                vod.reference_link
            ));
            out.push(format!("**Issue:** {}", clip(&vod.issue, FIELD_LIMIT)));
        }
    }
}

fn report_controls(status: ReportStatus) -> Controls {
    match status {
        ReportStatus::Open => Controls::ReportActions { open_ticket: true, resolve: true },
        ReportStatus::TicketOpen => Controls::ReportActions { open_ticket: false, resolve: true },
        ReportStatus::Resolved => Controls::ReportActions { open_ticket: false, resolve: false },
    }
}

/// The notification staff act on. Actions are disabled once resolved.
pub fn staff_summary(report: &Report) -> OutboundMessage {
    let mut lines = vec![
        format!("**Report #{} — {} — {}**", report.id, report.kind(), report.payload.subject()),
        format!("**Status:** {}", report.status),
        format!("**Reporter:** {} ({})", member(report.reporter_id), report.reporter_id),
        format!("**Reported from:** {}", channel(report.source_location_id)),
    ];
    payload_lines(&report.payload, &mut lines);

    if let Some(ticket) = report.ticket_channel_ref {
        lines.push(format!("**Ticket:** {}", channel(ticket)));
    }
    if let (Some(by), Some(at)) = (report.claimed_by, report.claimed_at) {
        lines.push(format!("**Claimed by:** {} {}", member(by), relative_time(at)));
    }
    if report.status.is_closed() {
        if let (Some(by), Some(at)) = (report.resolved_by, report.resolved_at) {
            lines.push(format!("**Resolved by:** {} {}", member(by), relative_time(at)));
        }
        if let Some(note) = &report.resolution_note {
            lines.push(format!("**Resolution:** {}", clip(note, FIELD_LIMIT)));
        }
    } else {
        lines.push(String::new());
        lines.push("✅ **Resolved** closes the report".into());
        lines.push("🎫 **Open ticket** creates a private channel for staff and the reporter".into());
    }

    OutboundMessage::text(lines.join("\n")).with_controls(report_controls(report.status))
}

/// The first message inside a freshly opened ticket channel.
pub fn ticket_intro(report: &Report) -> OutboundMessage {
    let mut lines = vec![
        member(report.reporter_id),
        format!("**Ticket for Report #{}**", report.id),
        format!("**Subject:** {}", report.payload.subject()),
        format!("**Type:** {}", report.kind()),
        format!("**Reported from:** {}", channel(report.source_location_id)),
    ];
    payload_lines(&report.payload, &mut lines);
    lines.push(String::new());
    lines.push("Use the **Resolve** button below when this is finished.".into());

    OutboundMessage::text(lines.join("\n")).with_controls(Controls::TicketActions { resolve: true })
}

pub fn acknowledgement(report: &Report) -> String {
    format!("Your {} report #{} has been submitted.", report.kind(), report.id)
}

/// Direct message to the reporter when their report is resolved.
pub fn resolution_notice(report: &Report) -> String {
    let mut text = format!(
        "✅ Your {} report **#{}** ({}) has been marked **Resolved**.",
        report.kind(),
        report.id,
        report.payload.subject()
    );
    if let Some(note) = &report.resolution_note {
        text.push_str(&format!("\nNote from staff: {note}"));
    }
    text
}

/// Announcement in the public responses channel.
pub fn public_update(report: &Report) -> OutboundMessage {
    let mut text = format!(
        "✅ **Report #{}** ({} — {}) from {} has been resolved.",
        report.id,
        report.kind(),
        report.payload.subject(),
        member(report.reporter_id)
    );
    if let Some(note) = &report.resolution_note {
        text.push_str(&format!("\n> {note}"));
    }
    OutboundMessage::text(text)
}

/// Staff mentions prepended to a new report's notification.
pub fn staff_pings(members: &[MemberId]) -> Option<String> {
    if members.is_empty() {
        return None;
    }
    Some(members.iter().map(|m| member(*m)).collect::<Vec<_>>().join(" "))
}

/// Explains to a blocked member why the report form was refused.
pub fn block_notice(status: &BlockStatus, support: Option<ChannelRef>) -> String {
    let support = support.map_or_else(|| "the support channel".to_string(), channel);
    let mut text = if status.permanent {
        "🚫 You are blocked from using the report system.".to_string()
    } else {
        let mut t = "🚫 You are temporarily blocked from using the report system.".to_string();
        if let Some(expires) = status.expires_at {
            t.push_str(&format!("\nBlock expires: {}", relative_time(expires)));
        }
        t
    };
    text.push_str(&format!("\nTo appeal, please open a ticket in {support}."));
    if !status.reason.is_empty() {
        text.push_str(&format!("\nReason: {}", status.reason));
    }
    text
}

pub fn modlog_block(block: &Block) -> OutboundMessage {
    let duration = match block.expires_at {
        None => "Permanent".to_string(),
        Some(expires) => format!(
            "{} minutes (expires {})",
            (expires - block.created_at).num_minutes(),
            relative_time(expires)
        ),
    };
    let mut lines = vec![
        "🔴 **Report system block**".to_string(),
        format!("**User:** {} (`{}`)", member(block.member_id), block.member_id),
        format!("**By:** {} (`{}`)", member(block.created_by), block.created_by),
        format!("**Duration:** {duration}"),
    ];
    if !block.reason.is_empty() {
        lines.push(format!("**Reason:** {}", block.reason));
    }
    OutboundMessage::text(lines.join("\n"))
}

pub fn modlog_unblock(target: MemberId, by: MemberId, removed: bool) -> OutboundMessage {
    OutboundMessage::text(
        [
            "🟢 **Report system unblock**".to_string(),
            format!("**User:** {} (`{}`)", member(target), target),
            format!("**By:** {} (`{}`)", member(by), by),
            format!("**Result:** {}", if removed { "Unblocked" } else { "User was not blocked" }),
        ]
        .join("\n"),
    )
}

fn liveboard_row(report: &Report, community: CommunityId, settings: &WorkflowSettings) -> String {
    let mut parts = vec![
        format!("**#{}**", report.id),
        format!("`{}`", report.status),
        report.payload.subject().to_string(),
        relative_time(report.created_at),
    ];
    if let Some(message) = report.staff_message_ref {
        parts.push(format!(
            "[staff]({}/{}/{}/{})",
            settings.message_link_base.trim_end_matches('/'),
            community,
            settings.staff_channel,
            message
        ));
    }
    parts.join(" • ")
}

fn liveboard_section(
    heading: &str,
    empty: &str,
    rows: &[&Report],
    community: CommunityId,
    settings: &WorkflowSettings,
) -> String {
    let mut out = format!("\n\n{heading}\n");
    if rows.is_empty() {
        out.push_str(empty);
        return out;
    }
    let lines: Vec<String> = rows
        .iter()
        .take(settings.liveboard_max_rows)
        .map(|r| liveboard_row(r, community, settings))
        .collect();
    out.push_str(&lines.join("\n"));
    if rows.len() > settings.liveboard_max_rows {
        out.push_str(&format!("\n…and {} more.", rows.len() - settings.liveboard_max_rows));
    }
    out
}

/// The summary board: active reports partitioned by kind, newest first.
pub fn liveboard(
    community: CommunityId,
    active: &[Report],
    settings: &WorkflowSettings,
    now: DateTime<Utc>,
) -> OutboundMessage {
    let mut text = format!(
        "📡 **Liveboard — Active Reports**\nThis board updates automatically.\n\
         Reports marked **Resolved** are removed.\n\nLast update: {}",
        relative_time(now)
    );

    let tv: Vec<&Report> = active.iter().filter(|r| r.kind() == ReportKind::Tv).collect();
    let vod: Vec<&Report> = active.iter().filter(|r| r.kind() == ReportKind::Vod).collect();

    if tv.is_empty() && vod.is_empty() {
        text.push_str("\n\n**All clear**\nNo active reports right now.");
    } else {
        text.push_str(&liveboard_section("📺 **Live TV**", "No active TV reports.", &tv, community, settings));
        text.push_str(&liveboard_section(
            "🎬 **Movies / TV Shows**",
            "No active VOD reports.",
            &vod,
            community,
            settings,
        ));
    }

    OutboundMessage::text(text)
}
