//! # Domain Models
//!
//! These structs represent the core entities of the report desk: reports and
//! their payloads, member blocks, liveboard registrations and settings keys.
//! External identifiers are 64-bit snowflakes owned by the chat platform; we
//! wrap them so a channel can never be passed where a member is expected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake!(
    /// Auto-increment identity of a report. Strictly increasing, never reused.
    ReportId
);
snowflake!(
    /// A community (server) on the chat platform.
    CommunityId
);
snowflake!(MemberId);
snowflake!(RoleId);
snowflake!(
    /// A channel: the source of a report, the staff channel, or a ticket.
    ChannelRef
);
snowflake!(MessageRef);

// ── Reports ──────────────────────────────────────────────────────────────────

/// Which catalogue the report is about. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    #[serde(rename = "TV")]
    Tv,
    #[serde(rename = "VOD")]
    Vod,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Tv => "TV",
            ReportKind::Vod => "VOD",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TV" => Ok(ReportKind::Tv),
            "VOD" => Ok(ReportKind::Vod),
            other => Err(AppError::ValidationError(format!("unknown report kind '{other}'"))),
        }
    }
}

/// Quality tier a VOD problem was observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QualityTier {
    Sd,
    Hd,
    Fhd,
    Uhd4k,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Sd => "SD",
            QualityTier::Hd => "HD",
            QualityTier::Fhd => "FHD",
            QualityTier::Uhd4k => "4K",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SD" | "480P" => Ok(QualityTier::Sd),
            "HD" | "720P" => Ok(QualityTier::Hd),
            "FHD" | "1080P" => Ok(QualityTier::Fhd),
            "4K" | "UHD" | "2160P" => Ok(QualityTier::Uhd4k),
            _ => Err(AppError::ValidationError(format!(
                "quality must be one of SD, HD, FHD or 4K (got '{}')",
                s.trim()
            ))),
        }
    }
}

impl TryFrom<String> for QualityTier {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QualityTier> for String {
    fn from(tier: QualityTier) -> Self {
        tier.as_str().to_string()
    }
}

/// Fields of a live TV report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvPayload {
    pub channel_name: String,
    pub channel_category: String,
    pub issue: String,
}

/// Fields of a movie / TV show report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VodPayload {
    pub title: String,
    /// TheTVDB, TMDB or IMDb page for the title
    #[serde(alias = "thetvdb_link")]
    pub reference_link: String,
    pub quality: QualityTier,
    pub issue: String,
}

/// Kind-specific content of a report. The variant *is* the kind, so a TV
/// report can never carry a reference link and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportPayload {
    Tv(TvPayload),
    Vod(VodPayload),
}

impl ReportPayload {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportPayload::Tv(_) => ReportKind::Tv,
            ReportPayload::Vod(_) => ReportKind::Vod,
        }
    }

    /// Short human label: the channel name or the title.
    pub fn subject(&self) -> &str {
        match self {
            ReportPayload::Tv(tv) => &tv.channel_name,
            ReportPayload::Vod(vod) => &vod.title,
        }
    }

    pub fn issue(&self) -> &str {
        match self {
            ReportPayload::Tv(tv) => &tv.issue,
            ReportPayload::Vod(vod) => &vod.issue,
        }
    }

    /// Encodes the variant body; the kind is stored alongside, not inside.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            ReportPayload::Tv(tv) => serde_json::to_string(tv),
            ReportPayload::Vod(vod) => serde_json::to_string(vod),
        }
    }

    pub fn from_json(kind: ReportKind, raw: &str) -> serde_json::Result<Self> {
        Ok(match kind {
            ReportKind::Tv => ReportPayload::Tv(serde_json::from_str(raw)?),
            ReportKind::Vod => ReportPayload::Vod(serde_json::from_str(raw)?),
        })
    }
}

/// Lifecycle status. `Resolved` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    Open,
    #[serde(rename = "Ticket Open")]
    TicketOpen,
    Resolved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [ReportStatus::Open, ReportStatus::TicketOpen, ReportStatus::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "Open",
            ReportStatus::TicketOpen => "Ticket Open",
            ReportStatus::Resolved => "Resolved",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ReportStatus::Resolved)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| AppError::Internal(format!("unknown report status '{s}'")))
    }
}

/// A filed issue and everything the desk knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub id: ReportId,
    pub reporter_id: MemberId,
    pub community_id: CommunityId,
    /// Channel the report was filed from
    pub source_location_id: ChannelRef,
    pub payload: ReportPayload,
    pub status: ReportStatus,
    /// Staff notification; the reverse lookup key for staff button flows
    pub staff_message_ref: Option<MessageRef>,
    pub ticket_channel_ref: Option<ChannelRef>,
    pub claimed_by: Option<MemberId>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<MemberId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        self.payload.kind()
    }
}

/// Input to `ReportRepository::create_report`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub reporter_id: MemberId,
    pub community_id: CommunityId,
    pub source_location_id: ChannelRef,
    pub payload: ReportPayload,
}

/// How a report is addressed by a staff action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLocator {
    /// Ticket channel flow: the channel knows its report id
    Id(ReportId),
    /// Staff channel flow: the button lives on the staff notification
    StaffMessage(MessageRef),
}

impl fmt::Display for ReportLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLocator::Id(id) => write!(f, "#{id}"),
            ReportLocator::StaffMessage(msg) => write!(f, "staff message {msg}"),
        }
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────────

/// Length of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTerm {
    Permanent,
    Temporary(Duration),
}

impl BlockTerm {
    pub fn minutes(minutes: i64) -> Self {
        BlockTerm::Temporary(Duration::minutes(minutes))
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, BlockTerm::Permanent)
    }

    /// Expiry for a block starting at `from`; `None` for permanent blocks.
    pub fn expires_at(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BlockTerm::Permanent => None,
            BlockTerm::Temporary(length) => Some(from + *length),
        }
    }
}

/// A member suppressed from filing reports in one community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub community_id: CommunityId,
    pub member_id: MemberId,
    pub permanent: bool,
    /// Set iff not permanent
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
}

impl Block {
    /// Expiry is inclusive: a block expiring exactly now no longer applies.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        !self.permanent && self.expires_at.map_or(true, |expires| expires <= now)
    }
}

/// Answer to "may this member file a report?".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockStatus {
    pub blocked: bool,
    pub permanent: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: String,
}

impl BlockStatus {
    pub fn unblocked() -> Self {
        Self::default()
    }
}

impl From<&Block> for BlockStatus {
    fn from(block: &Block) -> Self {
        Self {
            blocked: true,
            permanent: block.permanent,
            expires_at: block.expires_at,
            reason: block.reason.clone(),
        }
    }
}

// ── Liveboard & settings ─────────────────────────────────────────────────────

/// Where a community's live summary message lives. One per community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveboardEntry {
    pub community_id: CommunityId,
    pub channel_ref: ChannelRef,
    pub message_ref: MessageRef,
}

/// Known feature toggles, each with a default used when the row is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Ping the configured staff members when a new report arrives
    ReportPingsEnabled,
}

impl SettingKey {
    pub fn key(&self) -> &'static str {
        match self {
            SettingKey::ReportPingsEnabled => "report_pings_enabled",
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            SettingKey::ReportPingsEnabled => "1",
        }
    }
}

impl FromStr for SettingKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "report_pings_enabled" => Ok(SettingKey::ReportPingsEnabled),
            other => Err(AppError::ValidationError(format!("unknown setting '{other}'"))),
        }
    }
}
