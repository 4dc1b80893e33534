//! Text normalization helpers shared by the source adapters.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex should compile"));

static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x?[0-9a-fA-F]+);").expect("entity regex should compile"));

/// Collapses all whitespace runs to single spaces and trims the ends.
#[must_use]
pub fn collapse_whitespace(input: &str) -> String {
    WHITESPACE_RE.replace_all(input.trim(), " ").into_owned()
}

/// Strips HTML tags, leaving the text content.
#[must_use]
pub fn strip_tags(input: &str) -> String {
    TAG_RE.replace_all(input, "").into_owned()
}

/// Decodes the named and numeric HTML entities that appear in the
/// dashboards we scrape.
#[must_use]
pub fn decode_html_entities(input: &str) -> String {
    let named = input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let decoded = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = if let Some(hex) = raw.strip_prefix('x').or_else(|| raw.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            raw.parse().ok()
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });

    // &amp; last, so "&amp;lt;" does not double-decode.
    decoded.replace("&amp;", "&")
}

/// Normalizes an HTML fragment into comparable plain text: tags stripped,
/// entities decoded, whitespace collapsed.
#[must_use]
pub fn normalize_html(input: &str) -> String {
    collapse_whitespace(&decode_html_entities(&strip_tags(input)))
}

/// Decodes percent-encoded bytes to UTF-8, replacing invalid sequences.
#[must_use]
pub fn percent_decode_lossy(input: &str) -> String {
    percent_encoding::percent_decode_str(input)
        .decode_utf8_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_whitespace_flattens_runs() {
        assert_eq!(collapse_whitespace("  a\t b\n\nc  "), "a b c");
    }

    #[test]
    fn strip_tags_keeps_text() {
        assert_eq!(strip_tags("<p>hello <b>world</b></p>"), "hello world");
    }

    #[test]
    fn decodes_named_entities() {
        assert_eq!(decode_html_entities("a &lt;b&gt; &amp; c&nbsp;d"), "a <b> & c d");
    }

    #[test]
    fn decodes_numeric_entities() {
        // Decimal and hex forms of 규모.
        assert_eq!(decode_html_entities("&#44508;&#xBAA8;"), "규모");
    }

    #[test]
    fn amp_decodes_last() {
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn normalize_html_is_stable_for_equal_content() {
        let a = normalize_html("<p>2025/12/25  05:14:43</p>");
        let b = normalize_html("<p> 2025/12/25 05:14:43 </p>");
        assert_eq!(a, b);
    }

    #[test]
    fn percent_decode_handles_utf8() {
        assert_eq!(percent_decode_lossy("%EA%B2%BD%EB%82%A8"), "경남");
        assert_eq!(percent_decode_lossy("plain"), "plain");
    }
}
