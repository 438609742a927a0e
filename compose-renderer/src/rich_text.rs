//! Rich text conversion and HTML snippets handling.
//!
//! Formatted content uses a small markdown-like subset: `**bold**`,
//! `[text](url)` links and `\n` line breaks.

use std::sync::OnceLock;

use regex::{Captures, Regex};

static BOLD_REGEX: OnceLock<Regex> = OnceLock::new();
static LINK_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static STYLE_ATTR_REGEX: OnceLock<Regex> = OnceLock::new();
static BR_REGEX: OnceLock<Regex> = OnceLock::new();

fn bold_regex() -> &'static Regex {
    BOLD_REGEX.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("Invalid bold regex"))
}

fn link_regex() -> &'static Regex {
    LINK_REGEX
        .get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("Invalid link regex"))
}

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"</?[a-zA-Z][a-zA-Z0-9-]*(\s[^<>]*)?/?>").expect("Invalid tag regex")
    })
}

fn style_attr_regex() -> &'static Regex {
    STYLE_ATTR_REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\s+style\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
            .expect("Invalid style attribute regex")
    })
}

fn br_regex() -> &'static Regex {
    BR_REGEX.get_or_init(|| Regex::new(r"(?i)<br\s*/?>").expect("Invalid br regex"))
}

/// Convert formatted content to HTML.
///
/// `**x**` becomes `<strong>x</strong>`, `[text](url)` becomes
/// `<a href="url">text</a>` with the URL attribute-escaped, and newlines
/// become `<br>`. Other text passes through unchanged.
#[must_use]
pub fn format_rich_text(input: &str) -> String {
    let bold = bold_regex().replace_all(input, "<strong>$1</strong>");
    let linked = link_regex().replace_all(&bold, |caps: &Captures<'_>| {
        format!(
            "<a href=\"{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(&caps[2]),
            &caps[1]
        )
    });
    linked.replace("\r\n", "\n").replace('\n', "<br>")
}

/// Whether the content already contains HTML markup.
#[must_use]
pub fn contains_html(input: &str) -> bool {
    tag_regex().is_match(input)
}

/// Replace line breaks, both `\n` and `<br>`, with single spaces.
#[must_use]
pub fn strip_line_breaks(input: &str) -> String {
    let without_tags = br_regex().replace_all(input, " ");
    without_tags
        .split(['\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove every inline `style` attribute from an HTML snippet.
#[must_use]
pub fn strip_inline_styles(html: &str) -> String {
    style_attr_regex().replace_all(html, "").into_owned()
}

/// The first `limit` characters of `text` followed by `...`.
#[must_use]
pub fn excerpt(text: &str, limit: usize) -> String {
    let head: String = text.trim().chars().take(limit).collect();
    format!("{}...", head.trim_end())
}
