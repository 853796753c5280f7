//! Integration tests for the publish decision and the credential validator.

use presenced::presence::{decide, PublishDecision, PublishState, SkipReason, TokenVerdict};
use presenced::presence::token;

fn state_at(status: &str, t: i64) -> PublishState {
    PublishState {
        current_status: status.to_string(),
        last_published_ms: t,
    }
}

// ── Cooldown decision table ──────────────────────────────────────────────────

#[test]
fn test_same_status_inside_cooldown_skips() {
    let t = 1_000_000;
    assert_eq!(
        decide("Coding", &state_at("Coding", t), t + 1_000),
        PublishDecision::Skip(SkipReason::DuplicateWithinCooldown)
    );
}

#[test]
fn test_same_status_after_cooldown_sends() {
    let t = 1_000_000;
    assert_eq!(
        decide("Coding", &state_at("Coding", t), t + 4_000),
        PublishDecision::Send
    );
}

#[test]
fn test_new_status_sends_regardless_of_cooldown() {
    let t = 1_000_000;
    assert_eq!(
        decide("Watching Netflix", &state_at("Coding", t), t + 100),
        PublishDecision::Send
    );
}

#[test]
fn test_skip_reason_reads_like_the_log_entry() {
    assert_eq!(
        SkipReason::DuplicateWithinCooldown.to_string(),
        "duplicate-within-cooldown"
    );
}

// ── Credential shape ─────────────────────────────────────────────────────────

#[test]
fn test_token_verdicts() {
    let good = format!("{}.{}.{}", "A".repeat(26), "B".repeat(6), "C".repeat(38));
    assert_eq!(token::validate(&good), TokenVerdict::Valid);

    assert_eq!(token::validate(""), TokenVerdict::TooShort);
    assert_eq!(token::validate("short.token"), TokenVerdict::TooShort);

    let flat = "A".repeat(60);
    assert_eq!(token::validate(&flat), TokenVerdict::WrongSegmentCount);

    let four = format!("{}.{}.{}.{}", "A".repeat(24), "B".repeat(6), "C".repeat(27), "D");
    assert_eq!(token::validate(&four), TokenVerdict::WrongSegmentCount);

    let clipped = format!("{}.{}.{}", "A".repeat(26), "B".repeat(6), "C".repeat(20));
    assert_eq!(token::validate(&clipped), TokenVerdict::SegmentTruncated);
}

#[test]
fn test_only_hard_failures_block_publishing() {
    assert!(TokenVerdict::Valid.permits_publish());
    assert!(TokenVerdict::SegmentTruncated.permits_publish());
    assert!(!TokenVerdict::TooShort.permits_publish());
    assert!(!TokenVerdict::WrongSegmentCount.permits_publish());
}
