//! Text helpers for rendered content
//!
//! Provides:
//! - HTML excerpts for descriptions and list views
//! - URL-friendly titles

use regex_lite::Regex;
use std::sync::OnceLock;

const URL_TITLE_MAX_LEN: usize = 150;

fn tag_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok()).as_ref()
}

fn space_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").ok()).as_ref()
}

/// Strip tags from an HTML fragment and collapse whitespace
pub fn strip_html(html: &str) -> String {
    let text = match tag_pattern() {
        Some(pattern) => pattern.replace_all(html, " ").into_owned(),
        None => html.to_string(),
    };
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    match space_pattern() {
        Some(pattern) => pattern.replace_all(text.trim(), " ").into_owned(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Plain-text excerpt of at most `limit` characters, followed by `trim_marker` when cut
pub fn excerpt(html: &str, trim_marker: &str, limit: usize) -> String {
    let text = strip_html(html);
    if text.chars().count() <= limit {
        return text;
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str(trim_marker);
    cut
}

/// Lowercased slug used in content URLs
pub fn url_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.chars().count() > URL_TITLE_MAX_LEN {
        slug = slug.chars().take(URL_TITLE_MAX_LEN).collect();
        slug.truncate(slug.trim_end_matches('-').len());
    }
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug
    }
}
