//! Content blocks - the building blocks of compositions.
//!
//! Blocks decode from the editor's JSON shape: a flat object discriminated by
//! `type`, camelCase field names. Every variant field has a default so that a
//! half-filled block still decodes and can degrade to a placeholder at render
//! time instead of failing the whole composition.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance tag marking a block as composition metadata.
pub const FRONTMATTER_SOURCE: &str = "frontmatter";

/// Unique identifier for a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Create a new unique block ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier verbatim.
    #[must_use]
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Block provenance metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Where the block came from, e.g. `"frontmatter"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A content block: common fields plus the variant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    /// Unique identifier.
    #[serde(default)]
    pub id: BlockId,
    /// Sortable rank. Ties keep insertion order.
    #[serde(default)]
    pub order: f64,
    /// Class name looked up in the active stylesheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_class_name: Option<String>,
    /// Provenance metadata.
    #[serde(default)]
    pub metadata: BlockMetadata,
    /// Variant payload, discriminated by `type`.
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl ContentBlock {
    /// Create a new block with a fresh ID and rank 0.
    #[must_use]
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: BlockId::new(),
            order: 0.0,
            css_class_name: None,
            metadata: BlockMetadata::default(),
            kind,
        }
    }

    /// Set the block ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the sort rank.
    #[must_use]
    pub fn with_order(mut self, order: f64) -> Self {
        self.order = order;
        self
    }

    /// Set the stylesheet class name.
    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.css_class_name = Some(class_name.into());
        self
    }

    /// Set the provenance tag.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    /// Whether this block carries composition metadata rather than content.
    #[must_use]
    pub fn is_frontmatter(&self) -> bool {
        matches!(self.kind, BlockKind::Frontmatter(_))
            || self.metadata.source.as_deref() == Some(FRONTMATTER_SOURCE)
    }

    /// The non-empty class name, if any.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        self.css_class_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Short lowercase name of the block type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }
}

/// The type of content a block contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockKind {
    /// Paragraph or heading.
    Text(TextBlock),
    /// Static image.
    Image(ImageBlock),
    /// Embedded video.
    Video(VideoBlock),
    /// Call-to-action button.
    Button(ButtonBlock),
    /// Horizontal rule.
    Divider(DividerBlock),
    /// Vertical whitespace.
    Spacer(SpacerBlock),
    /// Layout columns referencing other blocks by ID.
    Columns(ColumnsBlock),
    /// Bulleted or numbered list.
    List(ListBlock),
    /// Operator-authored raw HTML.
    Html(HtmlBlock),
    /// Composition metadata; never rendered as content.
    Frontmatter(FrontmatterBlock),
    /// A `type` this version does not know.
    #[serde(other)]
    Unknown,
}

impl BlockKind {
    /// Short lowercase name of the variant, matching the JSON tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Button(_) => "button",
            Self::Divider(_) => "divider",
            Self::Spacer(_) => "spacer",
            Self::Columns(_) => "columns",
            Self::List(_) => "list",
            Self::Html(_) => "html",
            Self::Frontmatter(_) => "frontmatter",
            Self::Unknown => "unknown",
        }
    }
}

/// Text element tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TextElement {
    /// Paragraph.
    #[default]
    P,
    /// Heading level 1.
    H1,
    /// Heading level 2.
    H2,
    /// Heading level 3.
    H3,
    /// Heading level 4.
    H4,
    /// Heading level 5.
    H5,
    /// Heading level 6.
    H6,
}

impl TextElement {
    /// HTML tag name.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::P => "p",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
        }
    }

    /// Whether this is one of `h1`..`h6`.
    #[must_use]
    pub const fn is_heading(self) -> bool {
        !matches!(self, Self::P)
    }

    /// Parse a tag name; unknown tags yield `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "p" => Some(Self::P),
            "h1" => Some(Self::H1),
            "h2" => Some(Self::H2),
            "h3" => Some(Self::H3),
            "h4" => Some(Self::H4),
            "h5" => Some(Self::H5),
            "h6" => Some(Self::H6),
            _ => None,
        }
    }
}

impl From<String> for TextElement {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag).unwrap_or_default()
    }
}

impl From<TextElement> for String {
    fn from(element: TextElement) -> Self {
        element.tag().to_string()
    }
}

/// Horizontal alignment for media blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Alignment {
    /// Left aligned.
    Left,
    /// Centered.
    #[default]
    Center,
    /// Right aligned.
    Right,
}

impl Alignment {
    /// CSS `text-align` value.
    #[must_use]
    pub const fn as_css(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl From<String> for Alignment {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Center,
        }
    }
}

impl From<Alignment> for String {
    fn from(alignment: Alignment) -> Self {
        alignment.as_css().to_string()
    }
}

/// A width or height: bare pixels or a CSS length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    /// Pixel count.
    Pixels(f64),
    /// Any CSS length, e.g. `"50%"` or `"320px"`.
    Css(String),
}

impl Dimension {
    /// CSS length representation.
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Pixels(px) => format!("{}px", format_number(*px)),
            Self::Css(value) => {
                let value = value.trim();
                if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    format!("{value}px")
                } else {
                    value.to_string()
                }
            }
        }
    }

    /// Value for an HTML `width`/`height` attribute, which only takes pixels.
    #[must_use]
    pub fn to_html_attr(&self) -> Option<String> {
        match self {
            Self::Pixels(px) => Some(format_number(*px)),
            Self::Css(value) => {
                let digits = value.trim().trim_end_matches("px");
                (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
                    .then(|| digits.to_string())
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Rich formatting carried alongside plain text content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RichFormatting {
    /// Markdown-like subset: `**bold**`, `[text](url)`, `\n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_content: Option<String>,
}

/// Paragraph or heading content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextBlock {
    /// Plain content.
    pub content: String,
    /// Element tag.
    pub element: TextElement,
    /// Optional formatted variant of `content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rich_formatting: Option<RichFormatting>,
}

impl TextBlock {
    /// A paragraph with plain content.
    #[must_use]
    pub fn paragraph(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            element: TextElement::P,
            rich_formatting: None,
        }
    }

    /// A heading with plain content.
    #[must_use]
    pub fn heading(element: TextElement, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            element,
            rich_formatting: None,
        }
    }

    /// Attach formatted content.
    #[must_use]
    pub fn with_formatted(mut self, formatted: impl Into<String>) -> Self {
        self.rich_formatting = Some(RichFormatting {
            formatted_content: Some(formatted.into()),
        });
        self
    }

    /// Content to render: the formatted variant when present and non-empty.
    #[must_use]
    pub fn resolved_content(&self) -> &str {
        self.rich_formatting
            .as_ref()
            .and_then(|r| r.formatted_content.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.content)
    }
}

/// Email-specific image settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageEmailSettings {
    /// Render edge to edge in email header position.
    pub is_full_width: bool,
    /// Background color of the full-bleed container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

/// Static image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageBlock {
    /// Image URL.
    pub image_url: String,
    /// Alt text.
    pub alt_text: String,
    /// Optional caption below the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Display width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Dimension>,
    /// Display height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Dimension>,
    /// Horizontal alignment.
    pub alignment: Alignment,
    /// Email settings.
    pub email: ImageEmailSettings,
}

impl ImageBlock {
    /// An image with the given URL.
    #[must_use]
    pub fn new(image_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            ..Self::default()
        }
    }

    /// Mark as full width for email header extraction.
    #[must_use]
    pub fn full_width(mut self, background_color: Option<&str>) -> Self {
        self.email.is_full_width = true;
        self.email.background_color = background_color.map(str::to_string);
        self
    }

    /// Whether the image qualifies for the email header partition.
    #[must_use]
    pub fn is_email_full_width(&self) -> bool {
        self.email.is_full_width
    }
}

/// Video hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VideoPlatform {
    /// YouTube.
    Youtube,
    /// Vimeo.
    Vimeo,
    /// Any other platform name, kept for diagnostics.
    Other(String),
}

impl From<String> for VideoPlatform {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "youtube" => Self::Youtube,
            "vimeo" => Self::Vimeo,
            _ => Self::Other(value),
        }
    }
}

impl From<VideoPlatform> for String {
    fn from(platform: VideoPlatform) -> Self {
        match platform {
            VideoPlatform::Youtube => "youtube".to_string(),
            VideoPlatform::Vimeo => "vimeo".to_string(),
            VideoPlatform::Other(name) => name,
        }
    }
}

/// Declared video aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AspectRatio {
    /// 16:9 widescreen.
    Widescreen,
    /// 4:3 standard.
    Standard,
    /// 1:1 square.
    Square,
}

impl AspectRatio {
    /// Ratio notation, e.g. `"16:9"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Widescreen => "16:9",
            Self::Standard => "4:3",
            Self::Square => "1:1",
        }
    }
}

impl From<String> for AspectRatio {
    fn from(value: String) -> Self {
        match value.trim() {
            "16:9" => Self::Widescreen,
            "4:3" => Self::Standard,
            _ => Self::Square,
        }
    }
}

impl From<AspectRatio> for String {
    fn from(ratio: AspectRatio) -> Self {
        ratio.as_str().to_string()
    }
}

/// Embedded video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoBlock {
    /// Original video page URL.
    pub url: String,
    /// Hosting platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<VideoPlatform>,
    /// Platform video ID.
    pub embed_id: String,
    /// Aspect ratio; square when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    /// Title used for the iframe and email links.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Horizontal alignment.
    pub alignment: Alignment,
}

/// Call-to-action button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ButtonBlock {
    /// Label.
    pub text: String,
    /// Target URL.
    pub url: String,
    /// Background color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Label color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    /// Corner radius.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<String>,
    /// Inner padding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<String>,
}

/// Horizontal rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DividerBlock {
    /// Line thickness.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thickness: Option<String>,
    /// Line color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Vertical margin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<String>,
}

/// Vertical whitespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpacerBlock {
    /// Height as a CSS length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
}

/// Layout columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnsBlock {
    /// Declared column count.
    pub column_count: usize,
    /// Gap between columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<String>,
    /// Block IDs per column, in display order.
    pub columns: Vec<Vec<BlockId>>,
}

impl ColumnsBlock {
    /// Every block ID referenced by any column.
    pub fn referenced_ids(&self) -> impl Iterator<Item = &BlockId> {
        self.columns.iter().flatten()
    }
}

/// Bulleted or numbered list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListBlock {
    /// Items, in order.
    pub items: Vec<String>,
    /// Numbered list.
    pub ordered: bool,
}

/// Raw HTML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HtmlBlock {
    /// Markup inserted verbatim.
    pub content: String,
}

/// Frontmatter record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrontmatterBlock {
    /// Metadata payload.
    pub data: FrontmatterData,
}

/// Composition metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrontmatterData {
    /// Title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Subtitle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Publication date, already formatted for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Author name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Cover image URL.
    #[serde(alias = "cover", skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Status badge text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Call-to-action label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
    /// Call-to-action target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action_url: Option<String>,
    /// Gallery image URLs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<String>,
}
