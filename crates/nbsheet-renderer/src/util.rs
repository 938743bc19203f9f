//! Shared helpers for markdown rendering.

use std::borrow::Cow;

use pulldown_cmark::HeadingLevel;

/// URL schemes that never become hyperlinks.
const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Escape `&`, `<` and `>` the way inline Markdown text is escaped for HTML.
///
/// # Examples
///
/// ```
/// use nbsheet_renderer::escape_text;
///
/// assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
/// assert_eq!(escape_text("plain"), "plain");
/// ```
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Return the link target, or `None` if it is empty or uses a blocked scheme.
///
/// Characters other than ASCII alphanumerics, `/` and `:` are ignored when
/// checking the scheme, so `java\tscript:` is still rejected.
pub(crate) fn sanitize_link(url: &str) -> Option<&str> {
    let trimmed = url.trim_matches(|c: char| c.is_whitespace() || c == '\0' || c == '\u{1a}');
    if trimmed.is_empty() {
        return None;
    }
    let compact: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '/' || *c == ':')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if BLOCKED_SCHEMES
        .iter()
        .any(|scheme| compact.starts_with(scheme))
    {
        return None;
    }
    Some(trimmed)
}

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
