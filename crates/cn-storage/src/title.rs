//! Title annotation encoding.
//!
//! A conversation's display title is not a separate column: it is embedded as
//! a prefix on the first user message of the conversation window, as
//! `CUSTOM_TITLE:<title>|<original content>`. Encoding always replaces an
//! existing annotation; decoding splits the title back out.

pub const TITLE_MARKER: &str = "CUSTOM_TITLE:";
pub const TITLE_DELIMITER: char = '|';

/// Split content into `(title, body)`. Content without the marker comes back
/// unchanged with no title.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix(TITLE_MARKER) else {
        return (None, content);
    };
    match rest.split_once(TITLE_DELIMITER) {
        Some((title, body)) => (Some(title), body),
        // Degenerate row with a marker but no delimiter: treat everything
        // after the marker as the title.
        None => (Some(rest), ""),
    }
}

/// Prefix `content` with a title annotation, replacing any annotation it
/// already carries.
pub fn annotate(content: &str, title: &str) -> String {
    let (_, body) = split(content);
    format!("{TITLE_MARKER}{title}{TITLE_DELIMITER}{body}")
}
