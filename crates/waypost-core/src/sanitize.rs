// crates/waypost-core/src/sanitize.rs
// ============================================================================
// Module: Waypost Sanitizer
// Description: HTML-escaping and length-capping for caller-supplied text.
// Purpose: Produce storage-safe field values before identity resolution.
// Dependencies: (none)
// ============================================================================

//! ## Overview
//! Every caller-supplied text field passes through [`sanitize`] before it is
//! compared, stored, or echoed back. Escaping happens first and truncation
//! second, so the length ceiling is measured in escaped characters — stored
//! data was written under that order and lookups must preserve it.

// ============================================================================
// SECTION: Sanitizer
// ============================================================================

/// HTML-escapes `text` and truncates the result to `max_len` characters.
///
/// The truncation boundary is measured after escaping: a quote that expands
/// to `&quot;` counts as six characters against the ceiling. Empty input
/// yields an empty string.
#[must_use]
pub fn sanitize(text: &str, max_len: usize) -> String {
    escape_html(text).chars().take(max_len).collect()
}

/// Sanitizes an optional field, collapsing absent or empty input to `None`.
#[must_use]
pub fn sanitize_optional(text: Option<&str>, max_len: usize) -> Option<String> {
    match text {
        None => None,
        Some(raw) if raw.is_empty() => None,
        Some(raw) => Some(sanitize(raw, max_len)),
    }
}

/// Escapes the five HTML-significant characters.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use proptest::proptest;

    use super::sanitize;
    use super::sanitize_optional;

    #[test]
    fn sanitize_escapes_html_significant_characters() {
        assert_eq!(
            sanitize("<script>alert('x')</script>", 500),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"
        );
        assert_eq!(sanitize("a & b", 500), "a &amp; b");
        assert_eq!(sanitize("say \"hi\"", 500), "say &quot;hi&quot;");
    }

    #[test]
    fn sanitize_truncates_after_escaping() {
        // A single quote escapes to six characters, so a ceiling of 6 keeps
        // exactly the escape sequence and nothing else.
        assert_eq!(sanitize("\"abc", 6), "&quot;");
        assert_eq!(sanitize("\"abc", 7), "&quot;a");
    }

    #[test]
    fn sanitize_passes_plain_text_unchanged() {
        assert_eq!(sanitize("Ada Lovelace", 100), "Ada Lovelace");
    }

    #[test]
    fn sanitize_preserves_surrounding_whitespace() {
        // Near-duplicate names that differ only in whitespace stay distinct
        // identities; the sanitizer must not trim.
        assert_eq!(sanitize(" Ada ", 100), " Ada ");
    }

    #[test]
    fn sanitize_of_empty_input_is_empty() {
        assert_eq!(sanitize("", 100), "");
    }

    #[test]
    fn sanitize_optional_collapses_absent_and_empty() {
        assert_eq!(sanitize_optional(None, 100), None);
        assert_eq!(sanitize_optional(Some(""), 100), None);
        assert_eq!(sanitize_optional(Some("GPT"), 100), Some("GPT".to_string()));
    }

    proptest! {
        #[test]
        fn sanitized_output_never_exceeds_ceiling(text in ".*", max_len in 0_usize..64) {
            let out = sanitize(&text, max_len);
            assert!(out.chars().count() <= max_len);
        }

        #[test]
        fn sanitized_output_contains_no_raw_markup(text in ".*") {
            let out = sanitize(&text, 4096);
            assert!(!out.contains('<'));
            assert!(!out.contains('>'));
            assert!(!out.contains('"'));
        }
    }
}
