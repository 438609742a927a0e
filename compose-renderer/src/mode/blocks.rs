//! Per-block rendering shared by every mode.

use std::collections::{HashMap, HashSet};

use compose_core::{
    content_blocks, Alignment, AspectRatio, BlockId, BlockKind, ButtonBlock, ColumnsBlock,
    ContentBlock, DividerBlock, ElementTag, HtmlBlock, ImageBlock, ListBlock, SpacerBlock,
    StyleMap, TextBlock, TextElement, VideoBlock, VideoPlatform,
};

use crate::error::{BlockRenderFallback, FallbackReason};
use crate::html::{HtmlElement, HtmlNode};
use crate::rich_text::{contains_html, format_rich_text, strip_inline_styles, strip_line_breaks};
use crate::style::StyleContext;

/// Column nesting limit.
const MAX_COLUMN_DEPTH: usize = 4;
/// Widest supported columns row.
const MAX_COLUMN_COUNT: usize = 12;

const DEFAULT_BUTTON_BACKGROUND: &str = "#007bff";
const DEFAULT_BUTTON_TEXT: &str = "#ffffff";
const DEFAULT_BUTTON_RADIUS: &str = "4px";
const DEFAULT_BUTTON_PADDING: &str = "12px 24px";
const DEFAULT_SPACER_HEIGHT: &str = "20px";

/// Default text classes for a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Typography {
    /// Live preview and web export.
    Clean,
    /// News article layout: larger headings, rule under `h2`.
    Article,
}

impl Typography {
    fn text_class(self, element: TextElement) -> &'static str {
        match (self, element) {
            (Self::Clean, TextElement::H1) => "text-3xl font-bold mb-4",
            (Self::Clean, TextElement::H2) => "text-2xl font-semibold mb-3",
            (Self::Clean, TextElement::H3) => "text-xl font-semibold mb-2",
            (Self::Clean, TextElement::H4 | TextElement::H5 | TextElement::H6) => {
                "text-lg font-medium mb-2"
            }
            (Self::Clean, TextElement::P) => "mb-4 leading-relaxed",
            (Self::Article, TextElement::H1) => "text-4xl font-bold mb-6",
            (Self::Article, TextElement::H2) => {
                "text-3xl font-bold mb-4 pb-2 border-b border-gray-200"
            }
            (Self::Article, TextElement::H3) => "text-2xl font-semibold mb-3",
            (Self::Article, TextElement::H4 | TextElement::H5 | TextElement::H6) => {
                "text-xl font-semibold mb-2"
            }
            (Self::Article, TextElement::P) => "text-lg leading-relaxed mb-6",
        }
    }

    fn list_class(self, ordered: bool) -> &'static str {
        match (self, ordered) {
            (Self::Clean, false) => "list-disc pl-6 mb-4",
            (Self::Clean, true) => "list-decimal pl-6 mb-4",
            (Self::Article, false) => "list-disc pl-8 mb-6 text-lg",
            (Self::Article, true) => "list-decimal pl-8 mb-6 text-lg",
        }
    }
}

/// Inline typographic scale for email text, where classes do not apply.
#[must_use]
pub(crate) fn email_text_defaults(element: TextElement) -> StyleMap {
    let (size, weight, margin, line_height) = match element {
        TextElement::H1 => ("32px", "bold", "0 0 16px 0", "1.2"),
        TextElement::H2 => ("26px", "bold", "0 0 14px 0", "1.25"),
        TextElement::H3 => ("22px", "bold", "0 0 12px 0", "1.3"),
        TextElement::H4 => ("18px", "bold", "0 0 10px 0", "1.3"),
        TextElement::H5 => ("16px", "bold", "0 0 8px 0", "1.4"),
        TextElement::H6 => ("14px", "bold", "0 0 8px 0", "1.4"),
        TextElement::P => ("16px", "normal", "0 0 16px 0", "1.6"),
    };
    StyleMap::new()
        .with("font-size", size)
        .with("font-weight", weight)
        .with("margin", margin)
        .with("line-height", line_height)
}

/// Blocks rendered in the top-level stream: sorted, without frontmatter and
/// without blocks placed inside a columns cell.
///
/// A block counts as placed only when a top-level block reaches it through
/// column cells. Columns that only reference each other have no such root;
/// the first of them in order stays at the top level so the cycle renders as
/// a placeholder inside its cells.
#[must_use]
pub(crate) fn top_level_blocks(blocks: &[ContentBlock]) -> Vec<&ContentBlock> {
    let content = content_blocks(blocks);

    let mut cells: HashMap<&str, &ColumnsBlock> = HashMap::new();
    for block in content.iter().copied() {
        if let BlockKind::Columns(columns) = &block.kind {
            cells.entry(block.id.as_str()).or_insert(columns);
        }
    }
    let referenced: HashSet<&str> = cells
        .values()
        .copied()
        .flat_map(ColumnsBlock::referenced_ids)
        .map(BlockId::as_str)
        .collect();

    let mut placed: HashSet<&str> = HashSet::new();
    let mut top_level = vec![false; content.len()];
    for (index, block) in content.iter().copied().enumerate() {
        if !referenced.contains(block.id.as_str()) {
            top_level[index] = true;
            place_cells(block.id.as_str(), &cells, &mut placed);
        }
    }
    for (index, block) in content.iter().copied().enumerate() {
        if !top_level[index] && !placed.contains(block.id.as_str()) {
            top_level[index] = true;
            place_cells(block.id.as_str(), &cells, &mut placed);
        }
    }

    content
        .into_iter()
        .zip(top_level)
        .filter_map(|(block, top)| top.then_some(block))
        .collect()
}

/// Mark `root` and everything its column cells reach as placed.
fn place_cells<'a>(
    root: &'a str,
    cells: &HashMap<&'a str, &'a ColumnsBlock>,
    placed: &mut HashSet<&'a str>,
) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !placed.insert(id) {
            continue;
        }
        if let Some(&columns) = cells.get(id) {
            stack.extend(columns.referenced_ids().map(BlockId::as_str));
        }
    }
}

/// Renders individual blocks and records placeholders.
pub(crate) struct BlockWriter<'a> {
    styles: StyleContext<'a>,
    typography: Typography,
    strip_html_styles: bool,
    index: HashMap<&'a str, &'a ContentBlock>,
    ancestors: Vec<&'a str>,
    fallbacks: Vec<BlockRenderFallback>,
}

impl<'a> BlockWriter<'a> {
    /// Writer over a block snapshot. `blocks` is used to resolve column cells.
    pub(crate) fn new(
        blocks: &'a [ContentBlock],
        styles: StyleContext<'a>,
        typography: Typography,
    ) -> Self {
        let mut index = HashMap::with_capacity(blocks.len());
        for block in blocks {
            index.entry(block.id.as_str()).or_insert(block);
        }
        Self {
            styles,
            typography,
            strip_html_styles: false,
            index,
            ancestors: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    /// Strip inline `style` attributes from HTML blocks.
    #[must_use]
    pub(crate) fn strip_html_styles(mut self) -> Self {
        self.strip_html_styles = true;
        self
    }

    /// Render a sequence of blocks.
    pub(crate) fn render_all(&mut self, blocks: &[&'a ContentBlock]) -> Vec<HtmlNode> {
        blocks.iter().map(|block| self.render_block(block)).collect()
    }

    /// Placeholder diagnostics recorded so far.
    pub(crate) fn into_fallbacks(self) -> Vec<BlockRenderFallback> {
        self.fallbacks
    }

    /// Render one block.
    pub(crate) fn render_block(&mut self, block: &'a ContentBlock) -> HtmlNode {
        match &block.kind {
            BlockKind::Text(text) => self.text(block, text),
            BlockKind::Image(image) => self.image(block, image),
            BlockKind::Video(video) => self.video(block, video),
            BlockKind::Button(button) => self.button(block, button),
            BlockKind::Divider(divider) => self.divider(block, divider),
            BlockKind::Spacer(spacer) => self.spacer(block, spacer),
            BlockKind::Columns(columns) => self.columns(block, columns),
            BlockKind::List(list) => self.list(block, list),
            BlockKind::Html(html) => self.html(block, html),
            BlockKind::Frontmatter(_) => HtmlNode::empty(),
            BlockKind::Unknown => self.placeholder(block, FallbackReason::UnknownBlockType),
        }
    }

    /// Record a fallback and render the placeholder marker.
    pub(crate) fn placeholder(&mut self, block: &ContentBlock, reason: FallbackReason) -> HtmlNode {
        self.placeholder_for(&block.id, block.type_name(), reason)
    }

    fn placeholder_for(
        &mut self,
        block_id: &BlockId,
        block_type: &'static str,
        reason: FallbackReason,
    ) -> HtmlNode {
        tracing::warn!(
            block_id = %block_id,
            block_type = block_type,
            reason = %reason,
            "rendering block placeholder"
        );
        let node = HtmlElement::new("div")
            .attr("class", "block-placeholder")
            .attr("data-placeholder", block_type)
            .attr("data-block-id", block_id.as_str())
            .style(
                &StyleMap::new()
                    .with("padding", "16px")
                    .with("border", "1px dashed #cccccc")
                    .with("color", "#999999")
                    .with("text-align", "center"),
            )
            .text(format!("{block_type} block unavailable: {reason}"));
        self.fallbacks.push(BlockRenderFallback {
            block_id: block_id.clone(),
            block_type,
            reason,
        });
        node.into()
    }

    fn is_email(&self) -> bool {
        self.styles.is_email()
    }

    /// Class attribute for web output: the block's own class, else `default`.
    fn web_class(&self, block: &ContentBlock, default: &'static str) -> String {
        if self.is_email() {
            return String::new();
        }
        block.class_name().unwrap_or(default).to_string()
    }

    fn text(&mut self, block: &ContentBlock, text: &TextBlock) -> HtmlNode {
        let content = text.resolved_content();
        if content.trim().is_empty() {
            return self.placeholder(block, FallbackReason::EmptyContent);
        }
        let class_name = block.class_name();

        if contains_html(content) {
            return HtmlElement::new("div")
                .class(&self.web_class(block, ""))
                .style(&self.styles.class_styles(class_name))
                .child(HtmlNode::raw(format_rich_text(content)))
                .into();
        }

        let element = text.element;
        let body = if element.is_heading() {
            strip_line_breaks(content)
        } else {
            content.to_string()
        };

        let mut styles = if self.is_email() && class_name.is_none() {
            email_text_defaults(element)
        } else {
            StyleMap::new()
        };
        styles.merge(&self.styles.merged(ElementTag::from(element), class_name));

        let tag = element.tag();
        HtmlElement::new(tag)
            .class(&self.web_class(block, self.typography.text_class(element)))
            .style(&styles)
            .child(HtmlNode::raw(format_rich_text(&body)))
            .into()
    }

    fn image(&mut self, block: &ContentBlock, image: &ImageBlock) -> HtmlNode {
        if image.image_url.trim().is_empty() {
            return self.placeholder(block, FallbackReason::MissingImageUrl);
        }

        let mut styles = StyleMap::new().with("max-width", "100%").with("height", "auto");
        if self.is_email() {
            styles.set("display", "block");
            styles.set("border", "0");
            styles.set("margin", align_margin(image.alignment));
        }
        if let Some(width) = &image.width {
            styles.set("width", width.to_css());
        }
        if let Some(height) = &image.height {
            styles.set("height", height.to_css());
        }
        styles.merge(&self.styles.merged(ElementTag::Img, block.class_name()));

        let img = HtmlElement::new("img")
            .attr("src", image.image_url.trim())
            .attr("alt", image.alt_text.as_str())
            .attr_opt("width", image.width.as_ref().and_then(|w| w.to_html_attr()))
            .attr_opt("height", image.height.as_ref().and_then(|h| h.to_html_attr()))
            .style(&styles);

        let mut figure = HtmlElement::new("div")
            .class(&self.web_class(block, "image-block"))
            .style(&StyleMap::new().with("text-align", image.alignment.as_css()))
            .child(img);
        if let Some(caption) = image.caption.as_deref().filter(|c| !c.trim().is_empty()) {
            figure = figure.child(self.caption(caption));
        }
        figure.into()
    }

    fn caption(&self, caption: &str) -> HtmlElement {
        let element = HtmlElement::new("p");
        if self.is_email() {
            element
                .style(
                    &StyleMap::new()
                        .with("font-size", "14px")
                        .with("color", "#666666")
                        .with("margin", "8px 0 0 0"),
                )
                .text(caption)
        } else {
            element.class("image-caption").text(caption)
        }
    }

    fn video(&mut self, block: &ContentBlock, video: &VideoBlock) -> HtmlNode {
        let embed_id = video.embed_id.trim();
        let platform = match &video.platform {
            Some(platform) if !video.url.trim().is_empty() && !embed_id.is_empty() => platform,
            _ => return self.placeholder(block, FallbackReason::IncompleteVideo),
        };
        if let VideoPlatform::Other(name) = platform {
            return self.placeholder(
                block,
                FallbackReason::UnsupportedVideoPlatform(name.clone()),
            );
        }
        let title = video.title.as_deref().unwrap_or("Video");

        if self.is_email() {
            return self.email_video(block, video, platform, embed_id, title);
        }

        let embed_url = match platform {
            VideoPlatform::Youtube => format!("https://www.youtube.com/embed/{embed_id}"),
            _ => format!("https://player.vimeo.com/video/{embed_id}"),
        };
        let (aspect_class, padding) = aspect(video.aspect_ratio.unwrap_or(AspectRatio::Square));

        let iframe = HtmlElement::new("iframe")
            .attr("src", embed_url)
            .attr("title", title)
            .attr("frameborder", "0")
            .attr(
                "allow",
                "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture",
            )
            .attr("allowfullscreen", "")
            .style(
                &StyleMap::new()
                    .with("position", "absolute")
                    .with("top", "0")
                    .with("left", "0")
                    .with("width", "100%")
                    .with("height", "100%"),
            );
        let frame = HtmlElement::new("div")
            .class(&format!("video-embed {aspect_class}"))
            .style(
                &StyleMap::new()
                    .with("position", "relative")
                    .with("width", "100%")
                    .with("padding-bottom", padding)
                    .with("height", "0"),
            )
            .child(iframe);

        HtmlElement::new("div")
            .class(&self.web_class(block, "video-block"))
            .style(
                &StyleMap::new()
                    .with("text-align", video.alignment.as_css())
                    .merged(&self.styles.class_styles(block.class_name())),
            )
            .child(frame)
            .into()
    }

    fn email_video(
        &self,
        block: &ContentBlock,
        video: &VideoBlock,
        platform: &VideoPlatform,
        embed_id: &str,
        title: &str,
    ) -> HtmlNode {
        let link = HtmlElement::new("a").attr("href", video.url.trim());
        let link = match platform {
            VideoPlatform::Youtube => link.child(
                HtmlElement::new("img")
                    .attr(
                        "src",
                        format!("https://img.youtube.com/vi/{embed_id}/hqdefault.jpg"),
                    )
                    .attr("alt", title)
                    .style(
                        &StyleMap::new()
                            .with("display", "block")
                            .with("width", "100%")
                            .with("max-width", "600px")
                            .with("height", "auto")
                            .with("border", "0")
                            .with("margin", align_margin(video.alignment)),
                    ),
            ),
            _ => link
                .style(
                    &StyleMap::new()
                        .with("color", "#007bff")
                        .with("font-weight", "bold"),
                )
                .text(format!("\u{25b6} {title}")),
        };
        HtmlElement::new("div")
            .style(
                &StyleMap::new()
                    .with("text-align", video.alignment.as_css())
                    .with("margin", "0 0 16px 0")
                    .merged(&self.styles.class_styles(block.class_name())),
            )
            .child(link)
            .into()
    }

    fn button(&mut self, block: &ContentBlock, button: &ButtonBlock) -> HtmlNode {
        if button.text.trim().is_empty() {
            return self.placeholder(block, FallbackReason::EmptyContent);
        }
        let url = Some(button.url.trim()).filter(|u| !u.is_empty()).unwrap_or("#");
        let background = button
            .background_color
            .as_deref()
            .unwrap_or(DEFAULT_BUTTON_BACKGROUND);
        let color = button.text_color.as_deref().unwrap_or(DEFAULT_BUTTON_TEXT);
        let radius = button
            .border_radius
            .as_deref()
            .unwrap_or(DEFAULT_BUTTON_RADIUS);
        let padding = button.padding.as_deref().unwrap_or(DEFAULT_BUTTON_PADDING);

        let anchor_styles = StyleMap::new()
            .with("display", "inline-block")
            .with("background-color", background)
            .with("color", color)
            .with("border-radius", radius)
            .with("padding", padding)
            .with("text-decoration", "none")
            .with("font-weight", "bold")
            .merged(&self.styles.class_styles(block.class_name()));

        let anchor = HtmlElement::new("a")
            .attr("href", url)
            .class(&self.web_class(block, "button-block"))
            .style(&anchor_styles)
            .text(button.text.trim());

        if !self.is_email() {
            return HtmlElement::new("div")
                .style(&StyleMap::new().with("text-align", "center").with("margin", "16px 0"))
                .child(anchor)
                .into();
        }

        // Table-wrapped so Outlook keeps the background and padding.
        let cell = HtmlElement::new("td")
            .attr("align", "center")
            .attr("bgcolor", background)
            .style(
                &StyleMap::new()
                    .with("border-radius", radius)
                    .with("background-color", background),
            )
            .child(anchor);
        presentation_table()
            .attr("align", "center")
            .style(&StyleMap::new().with("margin", "16px auto"))
            .child(HtmlElement::new("tr").child(cell))
            .into()
    }

    fn divider(&mut self, block: &ContentBlock, divider: &DividerBlock) -> HtmlNode {
        let thickness = divider.thickness.as_deref().unwrap_or("1px");
        let color = divider.color.as_deref().unwrap_or("#e5e7eb");
        let margin = divider.margin.as_deref().unwrap_or("24px");
        let styles = StyleMap::new()
            .with("border", "none")
            .with("border-top", format!("{thickness} solid {color}"))
            .with("margin", format!("{margin} 0"))
            .merged(&self.styles.class_styles(block.class_name()));
        HtmlElement::new("hr")
            .class(&self.web_class(block, ""))
            .style(&styles)
            .into()
    }

    fn spacer(&mut self, block: &ContentBlock, spacer: &SpacerBlock) -> HtmlNode {
        let height = spacer
            .height
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_SPACER_HEIGHT);
        let mut styles = StyleMap::new().with("height", height);
        if self.is_email() {
            styles.set("line-height", height);
            styles.set("font-size", "1px");
        }
        styles.merge(&self.styles.class_styles(block.class_name()));

        let spacer = HtmlElement::new("div").style(&styles);
        if self.is_email() {
            spacer.child(HtmlNode::raw("&nbsp;")).into()
        } else {
            spacer.attr("aria-hidden", "true").into()
        }
    }

    fn columns(&mut self, block: &'a ContentBlock, columns: &'a ColumnsBlock) -> HtmlNode {
        let count = columns.column_count.max(columns.columns.len());
        if count == 0 {
            return self.placeholder(block, FallbackReason::EmptyContent);
        }
        if count > MAX_COLUMN_COUNT {
            return self.placeholder(block, FallbackReason::TooManyColumns(count));
        }
        if self.ancestors.len() >= MAX_COLUMN_DEPTH || self.ancestors.contains(&block.id.as_str())
        {
            return self.placeholder(block, FallbackReason::ColumnNestingTooDeep);
        }

        self.ancestors.push(block.id.as_str());
        let mut cells = Vec::with_capacity(count);
        for index in 0..count {
            let mut children = Vec::new();
            if let Some(ids) = columns.columns.get(index) {
                for id in ids {
                    children.push(self.cell_child(id));
                }
            }
            cells.push(children);
        }
        self.ancestors.pop();

        let gap = columns.gap.as_deref().unwrap_or("16px");
        let custom = self.styles.class_styles(block.class_name());

        if self.is_email() {
            let width = format!("{}%", 100 / count);
            let last = count - 1;
            let row = HtmlElement::new("tr").children(cells.into_iter().enumerate().map(
                |(index, children)| {
                    let mut styles = StyleMap::new();
                    if index < last {
                        styles.set("padding-right", gap);
                    }
                    HtmlElement::new("td")
                        .attr("valign", "top")
                        .attr("width", width.as_str())
                        .style(&styles)
                        .children(children)
                        .into()
                },
            ));
            return presentation_table()
                .attr("width", "100%")
                .style(&custom)
                .child(row)
                .into();
        }

        HtmlElement::new("div")
            .class(&self.web_class(block, "columns-block"))
            .style(
                &StyleMap::new()
                    .with("display", "flex")
                    .with("gap", gap)
                    .merged(&custom),
            )
            .children(cells.into_iter().map(|children| {
                HtmlElement::new("div")
                    .class("column")
                    .style(&StyleMap::new().with("flex", "1").with("min-width", "0"))
                    .children(children)
                    .into()
            }))
            .into()
    }

    fn cell_child(&mut self, id: &BlockId) -> HtmlNode {
        let Some(child) = self.index.get(id.as_str()).copied() else {
            return self.placeholder_for(
                id,
                "missing",
                FallbackReason::MissingColumnBlock(id.to_string()),
            );
        };
        if child.is_frontmatter() {
            return HtmlNode::empty();
        }
        if self.ancestors.contains(&child.id.as_str()) {
            return self.placeholder(child, FallbackReason::ColumnNestingTooDeep);
        }
        self.render_block(child)
    }

    fn list(&mut self, block: &ContentBlock, list: &ListBlock) -> HtmlNode {
        let items: Vec<&str> = list
            .items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return self.placeholder(block, FallbackReason::EmptyContent);
        }

        let mut styles = if self.is_email() {
            StyleMap::new()
                .with("margin", "0 0 16px 0")
                .with("padding-left", "24px")
        } else {
            StyleMap::new()
        };
        styles.merge(&self.styles.class_styles(block.class_name()));

        let tag = if list.ordered { "ol" } else { "ul" };
        HtmlElement::new(tag)
            .class(&self.web_class(block, self.typography.list_class(list.ordered)))
            .style(&styles)
            .children(
                items
                    .into_iter()
                    .map(|item| HtmlElement::new("li").text(item).into()),
            )
            .into()
    }

    fn html(&mut self, block: &ContentBlock, html: &HtmlBlock) -> HtmlNode {
        if html.content.trim().is_empty() {
            return self.placeholder(block, FallbackReason::EmptyContent);
        }
        let wrapper = HtmlElement::new("div").class(&self.web_class(block, "html-block"));
        if self.strip_html_styles {
            return wrapper
                .child(HtmlNode::raw(strip_inline_styles(&html.content)))
                .into();
        }
        wrapper
            .style(&self.styles.class_styles(block.class_name()))
            .child(HtmlNode::raw(html.content.as_str()))
            .into()
    }
}

/// `<table role="presentation">` with the usual email resets.
pub(crate) fn presentation_table() -> HtmlElement {
    HtmlElement::new("table")
        .attr("role", "presentation")
        .attr("border", "0")
        .attr("cellpadding", "0")
        .attr("cellspacing", "0")
}

/// Margin that aligns a block-level image in email clients.
fn align_margin(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "0 auto 0 0",
        Alignment::Center => "0 auto",
        Alignment::Right => "0 0 0 auto",
    }
}

/// Aspect-ratio class and intrinsic-ratio padding.
fn aspect(ratio: AspectRatio) -> (&'static str, &'static str) {
    match ratio {
        AspectRatio::Widescreen => ("aspect-video", "56.25%"),
        AspectRatio::Standard => ("aspect-4-3", "75%"),
        AspectRatio::Square => ("aspect-square", "100%"),
    }
}
