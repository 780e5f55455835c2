//! report-desk/crates/domains/src/lib.rs
//!
//! Domain models, lifecycle rules and port definitions for the report desk.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use lifecycle::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;

    #[test]
    fn test_payload_kind_follows_variant() {
        let payload = ReportPayload::Vod(VodPayload {
            title: "Inception".into(),
            reference_link: "https://www.themoviedb.org/movie/27205".into(),
            quality: QualityTier::Uhd4k,
            issue: "Audio out of sync".into(),
        });
        assert_eq!(payload.kind(), ReportKind::Vod);
        assert_eq!(payload.subject(), "Inception");
    }

    #[test]
    fn test_payload_json_round_trip_preserves_fields() {
        let payload = ReportPayload::Tv(TvPayload {
            channel_name: "Example One".into(),
            channel_category: "Entertainment".into(),
            issue: "Stuck on \"loading\" since 8pm".into(),
        });
        let raw = payload.to_json().unwrap();
        assert_eq!(ReportPayload::from_json(ReportKind::Tv, &raw).unwrap(), payload);
    }

    #[test]
    fn test_vod_payload_accepts_legacy_link_field() {
        let raw = r#"{"title":"Dune","thetvdb_link":"https://thetvdb.com/movies/dune","quality":"fhd","issue":"x"}"#;
        match ReportPayload::from_json(ReportKind::Vod, raw).unwrap() {
            ReportPayload::Vod(vod) => {
                assert_eq!(vod.reference_link, "https://thetvdb.com/movies/dune");
                assert_eq!(vod.quality, QualityTier::Fhd);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in ReportStatus::ALL {
            assert_eq!(status.as_str().parse::<ReportStatus>().unwrap(), status);
        }
        assert!("Fixed".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn test_block_expiry_is_inclusive() {
        let now = chrono::Utc::now();
        let block = Block {
            community_id: CommunityId(7),
            member_id: MemberId(42),
            permanent: false,
            expires_at: BlockTerm::minutes(0).expires_at(now),
            reason: String::new(),
            created_by: MemberId(1),
            created_at: now,
        };
        assert!(block.is_expired_at(now));

        let permanent = Block { permanent: true, expires_at: None, ..block };
        assert!(!permanent.is_expired_at(now));
    }
}
