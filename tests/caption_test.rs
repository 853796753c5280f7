//! Integration tests for the caption sanitizer.

use presenced::caption::{sanitize, MAX_CAPTION_CHARS, PLACEHOLDER_CAPTION};
use proptest::prelude::*;

#[test]
fn test_spec_inputs() {
    // Empty input falls back to the placeholder.
    assert_eq!(sanitize(""), PLACEHOLDER_CAPTION);

    // A quoted caption buried in prose is extracted.
    assert_eq!(sanitize(r#""Nice!"  said no one"#), "Nice!");

    // A 500-char quoteless response is cut to exactly the cap, ellipsis
    // included.
    let long = "a".repeat(500);
    let out = sanitize(&long);
    assert_eq!(out.chars().count(), MAX_CAPTION_CHARS);
    assert!(out.ends_with('…'));
}

#[test]
fn test_model_chatter_variants() {
    assert_eq!(sanitize("\"Just the caption\""), "Just the caption");
    assert_eq!(
        sanitize("Sure! Here's a caption: “When the tab count wins”"),
        "When the tab count wins"
    );
    assert_eq!(sanitize("  plain caption, no games  "), "plain caption, no games");
}

proptest! {
    /// Sanitize is total: never panics, never returns empty, never exceeds
    /// the display cap.
    #[test]
    fn sanitize_is_total(raw in ".{0,600}") {
        let out = sanitize(&raw);
        prop_assert!(!out.is_empty());
        prop_assert!(out.chars().count() <= MAX_CAPTION_CHARS);
    }
}
