//! Caption sanitizer.
//!
//! Model responses are not guaranteed to follow the "caption only"
//! instruction — they arrive wrapped in quotes, buried in explanatory prose,
//! or occasionally empty. [`sanitize`] is total: any input produces a
//! non-empty caption bounded to [`MAX_CAPTION_CHARS`].

/// Upper bound on the rendered caption length, in characters.
pub const MAX_CAPTION_CHARS: usize = 100;

/// Used when nothing usable survives sanitization.
pub const PLACEHOLDER_CAPTION: &str = "(no caption)";

/// Quote pairs recognized both as wrappers and as inline delimiters.
const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];

/// Extract a usable caption from a raw model response.
///
/// Steps, applied in order: trim; strip a wrapping quote pair; prefer the
/// first quoted substring of what remains; fall back to the first non-blank
/// line of the raw input; fall back to [`PLACEHOLDER_CAPTION`]; truncate to
/// [`MAX_CAPTION_CHARS`] with a trailing `…` when cut.
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim();
    let unwrapped = strip_wrapping_pair(trimmed).trim();

    let mut caption = match first_quoted(unwrapped) {
        Some(inner) => inner.trim().to_string(),
        None => unwrapped.to_string(),
    };

    if caption.is_empty() {
        caption = raw
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();
    }

    if caption.is_empty() {
        caption = PLACEHOLDER_CAPTION.to_string();
    }

    truncate_chars(&caption, MAX_CAPTION_CHARS)
}

/// Strip one leading and one trailing quote when they form a pair.
///
/// Only a matched pair is stripped: removing a single unbalanced quote would
/// destroy the pair that the quoted-substring step needs to find.
fn strip_wrapping_pair(text: &str) -> &str {
    let mut chars = text.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return text;
    };
    for &(open, close) in QUOTE_PAIRS {
        if first == open && last == close && text.chars().count() >= 2 {
            return &text[first.len_utf8()..text.len() - last.len_utf8()];
        }
    }
    text
}

/// The first non-empty quoted substring, if any.
fn first_quoted(text: &str) -> Option<&str> {
    for &(open, close) in QUOTE_PAIRS {
        let Some(start) = text.find(open) else {
            continue;
        };
        let after = &text[start + open.len_utf8()..];
        if let Some(len) = after.find(close) {
            let inner = &after[..len];
            if !inner.trim().is_empty() {
                return Some(inner);
            }
        }
    }
    None
}

/// Bound `text` to `max` characters, spending the last one on `…` when cut.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_placeholder() {
        assert_eq!(sanitize(""), PLACEHOLDER_CAPTION);
        assert_eq!(sanitize("   \n\t "), PLACEHOLDER_CAPTION);
    }

    #[test]
    fn quoted_substring_is_preferred_over_prose() {
        assert_eq!(sanitize(r#""Nice!"  said no one"#), "Nice!");
        assert_eq!(
            sanitize(r#"Here is your caption: "Monday strikes again""#),
            "Monday strikes again"
        );
    }

    #[test]
    fn wrapping_quotes_are_stripped() {
        assert_eq!(sanitize("\"A cat typing furiously\""), "A cat typing furiously");
        assert_eq!(sanitize("'single quoted'"), "single quoted");
        assert_eq!(sanitize("“curly wrapped”"), "curly wrapped");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize("When the build finally passes"), "When the build finally passes");
    }

    #[test]
    fn long_input_truncates_to_exactly_max_chars() {
        let long = "x".repeat(500);
        let out = sanitize(&long);
        assert_eq!(out.chars().count(), MAX_CAPTION_CHARS);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn empty_after_unwrap_falls_back_to_first_non_blank_line_of_raw() {
        // A quote pair wrapping only whitespace unwraps to nothing, so the
        // first non-blank line of the raw input is used verbatim.
        assert_eq!(sanitize("\"   \""), "\"   \"");
    }

    #[test]
    fn exactly_max_chars_is_not_truncated() {
        let text = "y".repeat(MAX_CAPTION_CHARS);
        assert_eq!(sanitize(&text), text);
    }
}
