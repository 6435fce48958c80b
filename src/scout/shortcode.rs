//! Canonical post identifier ("shortcode") resolution.
//!
//! Post and reel URLs come in several shapes:
//! * `https://www.instagram.com/p/SHORTCODE/`
//! * `https://www.instagram.com/reel/SHORTCODE/`
//! * `https://www.instagram.com/<user>/p/SHORTCODE/?img_index=2`
//!
//! Current shortcodes are exactly 11 chars of `[A-Za-z0-9_-]`; a looser 5–20
//! char pattern is accepted as a fallback for older or truncated links.

use std::sync::OnceLock;

use regex::Regex;

use crate::core::error::{ScoutError, ScoutResult};

fn strict_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(?:p|reel)/([A-Za-z0-9_-]{11})([/?#]|$)").expect("valid regex"))
}

fn loose_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(?:p|reel)/([A-Za-z0-9_-]{5,20})([/?#]|$)").expect("valid regex")
    })
}

/// Resolve the canonical shortcode from a post/reel URL.
///
/// Prefers the exact 11-character token; falls back to the 5–20 character
/// pattern under the same `/p/` / `/reel/` marker. Fails with
/// [`ScoutError::ShortcodeParse`] when neither matches.
pub fn extract_shortcode(url: &str) -> ScoutResult<String> {
    if let Some(caps) = strict_re().captures(url) {
        return Ok(caps[1].to_string());
    }
    if let Some(caps) = loose_re().captures(url) {
        return Ok(caps[1].to_string());
    }
    Err(ScoutError::ShortcodeParse(url.to_string()))
}

/// The liked-by view for a shortcode. Deterministic: canonical post URL plus
/// the fixed `liked_by` suffix segment.
pub fn liked_by_url(shortcode: &str) -> String {
    format!("https://www.instagram.com/p/{shortcode}/liked_by")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_eleven_char_shortcode() {
        assert_eq!(
            extract_shortcode("https://www.instagram.com/p/ABCDEFGHIJK/").unwrap(),
            "ABCDEFGHIJK"
        );
    }

    #[test]
    fn test_reel_with_user_segment_and_query() {
        assert_eq!(
            extract_shortcode("https://www.instagram.com/someuser/reel/AB12_-3/?x=1").unwrap(),
            "AB12_-3"
        );
    }

    #[test]
    fn test_strict_preferred_over_loose() {
        // An 11-char token must be taken verbatim, not shortened by the loose
        // pattern's lazy lower bound.
        assert_eq!(
            extract_shortcode("https://www.instagram.com/reel/C1d2E3f4G5h/").unwrap(),
            "C1d2E3f4G5h"
        );
    }

    #[test]
    fn test_unterminated_url_still_matches() {
        assert_eq!(
            extract_shortcode("https://www.instagram.com/p/AB12_-3").unwrap(),
            "AB12_-3"
        );
    }

    #[test]
    fn test_no_marker_is_a_parse_error() {
        let err = extract_shortcode("https://www.instagram.com/explore/").unwrap_err();
        assert!(matches!(err, ScoutError::ShortcodeParse(_)));
    }

    #[test]
    fn test_too_short_token_is_a_parse_error() {
        assert!(extract_shortcode("https://www.instagram.com/p/ab1/").is_err());
    }

    #[test]
    fn test_liked_by_destination_shape() {
        assert_eq!(
            liked_by_url("ABCDEFGHIJK"),
            "https://www.instagram.com/p/ABCDEFGHIJK/liked_by"
        );
    }
}
