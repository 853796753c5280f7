//! Presence credential shape checks.
//!
//! The chat service's user tokens are three dot-separated base64url
//! segments. Checking the shape locally before a publish attempt separates
//! "you pasted half a token" from "the service rejected your token", without
//! any network access.

use serde::Serialize;
use std::fmt;

/// Tokens shorter than this can't be complete.
pub const MIN_TOKEN_LEN: usize = 50;

/// Minimum observed lengths of the three token segments.
const MIN_SEGMENT_LENS: [usize; 3] = [24, 6, 27];

/// Outcome of a local credential shape check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenVerdict {
    Valid,
    TooShort,
    WrongSegmentCount,
    /// Segments present but one is shorter than ever observed in a working
    /// token — usually a copy-paste truncation. Publishing may still work.
    SegmentTruncated,
}

impl TokenVerdict {
    /// Whether a publish attempt should proceed with this verdict.
    ///
    /// `SegmentTruncated` proceeds (with a warning): truncation heuristics
    /// have false positives and the service is the final authority.
    pub fn permits_publish(self) -> bool {
        matches!(self, TokenVerdict::Valid | TokenVerdict::SegmentTruncated)
    }
}

impl fmt::Display for TokenVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenVerdict::Valid => "valid",
            TokenVerdict::TooShort => "too short",
            TokenVerdict::WrongSegmentCount => "wrong segment count",
            TokenVerdict::SegmentTruncated => "segment appears truncated",
        };
        f.write_str(s)
    }
}

/// Check the shape of `token` without calling the service.
pub fn validate(token: &str) -> TokenVerdict {
    if token.len() < MIN_TOKEN_LEN {
        return TokenVerdict::TooShort;
    }
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != MIN_SEGMENT_LENS.len() {
        return TokenVerdict::WrongSegmentCount;
    }
    let truncated = segments
        .iter()
        .zip(MIN_SEGMENT_LENS)
        .any(|(segment, min)| segment.len() < min);
    if truncated {
        TokenVerdict::SegmentTruncated
    } else {
        TokenVerdict::Valid
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_token(a: usize, b: usize, c: usize) -> String {
        format!("{}.{}.{}", "A".repeat(a), "B".repeat(b), "C".repeat(c))
    }

    #[test]
    fn well_shaped_token_is_valid() {
        let verdict = validate(&fake_token(24, 6, 27));
        assert_eq!(verdict, TokenVerdict::Valid);
        assert!(verdict.permits_publish());
    }

    #[test]
    fn short_token_is_too_short() {
        assert_eq!(validate("abc"), TokenVerdict::TooShort);
        assert!(!TokenVerdict::TooShort.permits_publish());
    }

    #[test]
    fn wrong_segment_count_is_rejected() {
        let two = format!("{}.{}", "A".repeat(30), "B".repeat(30));
        assert_eq!(validate(&two), TokenVerdict::WrongSegmentCount);
    }

    #[test]
    fn short_final_segment_is_flagged_but_publishable() {
        let verdict = validate(&fake_token(24, 6, 20));
        assert_eq!(verdict, TokenVerdict::SegmentTruncated);
        assert!(verdict.permits_publish());
    }
}
