//! Stylesheet parsing into class and element lookup tables.
//!
//! The parser understands the subset of CSS the editor produces: simple class
//! selectors (`.lead`) and bare element selectors for `p`, `h1`..`h6` and
//! `img`. Everything else (combinators, pseudo-classes, at-rules) is skipped.
//! Parsing never fails; invalid declarations are dropped and valid ones kept.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::TextElement;

/// Identifier of a stylesheet in the stylesheet service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StylesheetId(String);

impl StylesheetId {
    /// Wrap an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StylesheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StylesheetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StylesheetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Element tags that can carry default styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementTag {
    /// Paragraph or heading.
    Text(TextElement),
    /// Image.
    Img,
}

impl ElementTag {
    /// HTML tag name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text(element) => element.tag(),
            Self::Img => "img",
        }
    }

    /// Parse a bare tag name.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case("img") {
            return Some(Self::Img);
        }
        TextElement::from_tag(tag).map(Self::Text)
    }
}

impl From<TextElement> for ElementTag {
    fn from(element: TextElement) -> Self {
        Self::Text(element)
    }
}

/// Ordered CSS declarations: property → value.
///
/// Setting an existing property replaces its value in place, so iteration
/// order is the order in which properties were first declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap {
    entries: Vec<(String, String)>,
}

impl StyleMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) {
        let property = property.into().trim().to_ascii_lowercase();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(p, _)| *p == property) {
            entry.1 = value;
        } else {
            self.entries.push((property, value));
        }
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(property, value);
        self
    }

    /// Value of a property.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(property))
            .map(|(_, v)| v.as_str())
    }

    /// Remove a property, returning its value.
    pub fn remove(&mut self, property: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(p, _)| p.eq_ignore_ascii_case(property))?;
        Some(self.entries.remove(index).1)
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Self) {
        for (property, value) in &other.entries {
            self.set(property.clone(), value.clone());
        }
    }

    /// `self` overlaid with `other`.
    #[must_use]
    pub fn merged(mut self, other: &Self) -> Self {
        self.merge(other);
        self
    }

    /// Iterate declarations in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }

    /// Keep only declarations matching the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|(p, v)| keep(p, v));
    }

    /// Number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no declarations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inline `style` attribute text, e.g. `color: red; margin: 0`.
    #[must_use]
    pub fn to_css(&self) -> String {
        self.entries
            .iter()
            .map(|(p, v)| format!("{p}: {v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StyleMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (property, value) in iter {
            map.set(property, value);
        }
        map
    }
}

/// Parsed lookup tables of a stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStylesheet {
    classes: BTreeMap<String, StyleMap>,
    elements: BTreeMap<ElementTag, StyleMap>,
}

impl ParsedStylesheet {
    /// Rules declared for `.class_name`.
    #[must_use]
    pub fn class_rule(&self, class_name: &str) -> Option<&StyleMap> {
        self.classes.get(class_name)
    }

    /// Default rules declared for a bare element tag.
    #[must_use]
    pub fn element_rule(&self, tag: ElementTag) -> Option<&StyleMap> {
        self.elements.get(&tag)
    }

    /// All class names, sorted.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    /// Number of class rules.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Whether neither table has any rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.elements.is_empty()
    }
}

/// A stylesheet: raw source plus its cached parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    id: StylesheetId,
    source: String,
    parsed: Arc<ParsedStylesheet>,
}

impl Stylesheet {
    /// Parse `source` into a new stylesheet.
    #[must_use]
    pub fn new(id: impl Into<StylesheetId>, source: impl Into<String>) -> Self {
        let source = source.into();
        let parsed = Arc::new(parse_css(&source));
        Self {
            id: id.into(),
            source,
            parsed,
        }
    }

    /// Replace the raw source, recomputing the parse when it changed.
    pub fn set_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if source != self.source {
            self.parsed = Arc::new(parse_css(&source));
            self.source = source;
        }
    }

    /// Identifier.
    #[must_use]
    pub fn id(&self) -> &StylesheetId {
        &self.id
    }

    /// Raw CSS source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Shared parse.
    #[must_use]
    pub fn parsed(&self) -> &ParsedStylesheet {
        &self.parsed
    }
}

enum Selector {
    Class(String),
    Element(ElementTag),
}

/// Parse CSS source into class and element tables.
#[must_use]
pub fn parse_css(source: &str) -> ParsedStylesheet {
    let cleaned = strip_comments(source);
    let mut sheet = ParsedStylesheet::default();
    let mut rest = cleaned.as_str();

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        if rest.starts_with('@') {
            rest = skip_at_rule(rest);
            continue;
        }

        let Some(open) = find_unquoted(rest, |c| c == '{') else {
            tracing::trace!("ignoring trailing css text without a rule block");
            break;
        };
        // A stray `}` before the selector belongs to nothing.
        let selectors = rest[..open].rsplit('}').next().unwrap_or_default();
        let after = &rest[open + 1..];
        let Some(close) = find_block_end(after) else {
            tracing::trace!(selectors = selectors.trim(), "dropping unterminated css rule");
            break;
        };
        let declarations = parse_declarations(&after[..close]);
        rest = &after[close + 1..];

        if declarations.is_empty() {
            continue;
        }

        for selector in selectors.split(',') {
            match classify_selector(selector.trim()) {
                Some(Selector::Class(name)) => {
                    sheet.classes.entry(name).or_default().merge(&declarations);
                }
                Some(Selector::Element(tag)) => {
                    sheet.elements.entry(tag).or_default().merge(&declarations);
                }
                None => tracing::trace!(selector = selector.trim(), "ignoring unsupported selector"),
            }
        }
    }

    sheet
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Byte index of the first char matching `pred` outside quotes.
fn find_unquoted(text: &str, pred: impl Fn(char) -> bool) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if pred(c) => return Some(i),
            None => {}
        }
    }
    None
}

/// Index of the `}` closing a block whose `{` was just consumed.
fn find_block_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth == 0 => return Some(i),
                '}' => depth -= 1,
                _ => {}
            },
        }
    }
    None
}

fn skip_at_rule(text: &str) -> &str {
    let Some(index) = find_unquoted(text, |c| c == ';' || c == '{') else {
        return "";
    };
    if text[index..].starts_with(';') {
        return &text[index + 1..];
    }
    let body = &text[index + 1..];
    find_block_end(body).map_or("", |close| &body[close + 1..])
}

/// Split on `sep` outside quotes and parentheses.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c == sep && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_declarations(body: &str) -> StyleMap {
    let mut map = StyleMap::new();
    for declaration in split_top_level(body, ';') {
        let declaration = declaration.trim();
        if declaration.is_empty() {
            continue;
        }
        let Some((property, value)) = declaration.split_once(':') else {
            tracing::trace!(declaration = declaration, "skipping css declaration without a colon");
            continue;
        };
        let property = property.trim();
        let value = value.trim();
        if !is_valid_property(property) || value.is_empty() || value.contains(['{', '}']) {
            tracing::trace!(declaration = declaration, "skipping invalid css declaration");
            continue;
        }
        map.set(property, value);
    }
    map
}

fn is_valid_property(property: &str) -> bool {
    let body = property.strip_prefix("--").or_else(|| property.strip_prefix('-')).unwrap_or(property);
    body.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_class_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn classify_selector(selector: &str) -> Option<Selector> {
    if let Some(name) = selector.strip_prefix('.') {
        return is_valid_class_name(name).then(|| Selector::Class(name.to_string()));
    }
    ElementTag::from_tag(selector)
        .filter(|_| selector.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(Selector::Element)
}
