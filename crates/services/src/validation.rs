//! Form validation. Everything here runs before any storage write.

use domains::{AppError, QualityTier, ReportPayload, Result, TvPayload, VodPayload};
use url::Url;

pub const MAX_CHANNEL_NAME: usize = 100;
pub const MAX_CATEGORY: usize = 100;
pub const MAX_TITLE: usize = 150;
pub const MAX_REFERENCE_LINK: usize = 300;
pub const MAX_ISSUE: usize = 1000;

/// Catalogue sites a VOD reference link may point at.
const REFERENCE_HOSTS: [&str; 3] = ["thetvdb.com", "themoviedb.org", "imdb.com"];

/// Raw form input as typed by the member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportForm {
    Tv {
        channel_name: String,
        channel_category: String,
        issue: String,
    },
    Vod {
        title: String,
        reference_link: String,
        quality: String,
        issue: String,
    },
}

fn field(name: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::ValidationError(format!("{name} is required")));
    }
    if value.chars().count() > max {
        return Err(AppError::ValidationError(format!("{name} must be at most {max} characters")));
    }
    Ok(value.to_string())
}

/// Accepts http(s) links on the catalogue sites, including subdomains such
/// as `www.` and `m.`.
pub fn validate_reference_link(raw: &str) -> Result<String> {
    let raw = field("reference link", raw, MAX_REFERENCE_LINK)?;
    let invalid = || {
        AppError::ValidationError(format!(
            "reference link must be a TheTVDB, TMDB or IMDb page (got '{raw}')"
        ))
    };

    let url = Url::parse(&raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    let allowed = REFERENCE_HOSTS
        .iter()
        .any(|site| host == *site || host.ends_with(&format!(".{site}")));
    if !allowed {
        return Err(invalid());
    }
    Ok(raw)
}

/// Turns a raw form into a typed payload or explains what is wrong with it.
pub fn validate_form(form: ReportForm) -> Result<ReportPayload> {
    match form {
        ReportForm::Tv { channel_name, channel_category, issue } => Ok(ReportPayload::Tv(TvPayload {
            channel_name: field("channel name", &channel_name, MAX_CHANNEL_NAME)?,
            channel_category: field("channel category", &channel_category, MAX_CATEGORY)?,
            issue: field("issue", &issue, MAX_ISSUE)?,
        })),
        ReportForm::Vod { title, reference_link, quality, issue } => Ok(ReportPayload::Vod(VodPayload {
            title: field("title", &title, MAX_TITLE)?,
            reference_link: validate_reference_link(&reference_link)?,
            quality: quality.parse::<QualityTier>()?,
            issue: field("issue", &issue, MAX_ISSUE)?,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vod(link: &str, quality: &str) -> ReportForm {
        ReportForm::Vod {
            title: "Inception".into(),
            reference_link: link.into(),
            quality: quality.into(),
            issue: "Stutters at 01:12:00".into(),
        }
    }

    #[test]
    fn test_accepts_catalogue_links() {
        for link in [
            "https://thetvdb.com/series/breaking-bad",
            "https://www.themoviedb.org/movie/27205-inception",
            "http://m.imdb.com/title/tt1375666/",
        ] {
            tokio_test::assert_ok!(validate_form(vod(link, "4K")), "{link} should be accepted");
        }
    }

    #[test]
    fn test_rejects_other_links() {
        for link in [
            "https://example.com/thetvdb.com",
            "https://thetvdb.com.evil.net/series/x",
            "ftp://thetvdb.com/series/x",
            "thetvdb.com/series/x",
            "",
        ] {
            let err = validate_form(vod(link, "FHD")).unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)), "{link:?} should be rejected");
        }
    }

    #[test]
    fn test_quality_must_be_known_tier() {
        assert!(validate_form(vod("https://thetvdb.com/series/x", "potato")).is_err());
        match validate_form(vod("https://thetvdb.com/series/x", " fhd ")).unwrap() {
            ReportPayload::Vod(payload) => assert_eq!(payload.quality, QualityTier::Fhd),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_tv_fields_are_trimmed_and_bounded() {
        let payload = validate_form(ReportForm::Tv {
            channel_name: "  Example One ".into(),
            channel_category: "News".into(),
            issue: "No audio".into(),
        })
        .unwrap();
        assert_eq!(payload.subject(), "Example One");

        let too_long = ReportForm::Tv {
            channel_name: "x".repeat(MAX_CHANNEL_NAME + 1),
            channel_category: "News".into(),
            issue: "No audio".into(),
        };
        assert!(validate_form(too_long).is_err());
    }
}
