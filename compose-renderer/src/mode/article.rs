//! News article renderer.

use compose_core::{find_frontmatter, BlockKind, ContentBlock, FrontmatterData};

use crate::error::RenderResult;
use crate::html::{HtmlElement, HtmlNode};
use crate::mode::blocks::{top_level_blocks, BlockWriter, Typography};
use crate::mode::ModeRenderer;
use crate::rich_text::excerpt;
use crate::style::StyleTarget;
use crate::{RenderMode, RenderOptions, RenderOutput, RenderedOutput};

/// Title when no frontmatter provides one.
pub const DEFAULT_TITLE: &str = "Article Title";
/// Author when no frontmatter provides one.
pub const DEFAULT_AUTHOR: &str = "Motive Archive";
/// Status badge when no frontmatter provides one.
pub const DEFAULT_STATUS: &str = "LIVE AUCTION";
/// Tags when no frontmatter provides any.
pub const DEFAULT_TAGS: &[&str] = &["Automotive", "Collector Cars", "Auction"];
/// Call-to-action label when no frontmatter provides one.
pub const DEFAULT_CALL_TO_ACTION: &str = "Learn More";
/// Call-to-action target when no frontmatter provides one.
pub const DEFAULT_CALL_TO_ACTION_URL: &str = "#";

/// Length of the subtitle excerpt taken from the first text block.
const SUBTITLE_EXCERPT_CHARS: usize = 150;

/// Article metadata after applying block data, external data and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFrontmatter {
    /// Headline.
    pub title: String,
    /// Standfirst.
    pub subtitle: Option<String>,
    /// Display date.
    pub date: Option<String>,
    /// Byline.
    pub author: String,
    /// Hero image URL.
    pub cover_image: Option<String>,
    /// Status badge.
    pub status: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Call-to-action label.
    pub call_to_action: String,
    /// Call-to-action target.
    pub call_to_action_url: String,
}

impl ArticleFrontmatter {
    /// Resolve the effective article metadata.
    ///
    /// Each field comes from the first frontmatter block when set there,
    /// else from `external`, else from the content or a fixed default.
    #[must_use]
    pub fn resolve(blocks: &[ContentBlock], external: Option<&FrontmatterData>) -> Self {
        let block = find_frontmatter(blocks);
        let pick = |field: fn(&FrontmatterData) -> Option<&String>| -> Option<String> {
            block
                .and_then(field)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| external.and_then(field).filter(|v| !v.trim().is_empty()))
                .map(|v| v.trim().to_string())
        };

        let content = top_level_blocks(blocks);
        let first_text = content.iter().find_map(|b| match &b.kind {
            BlockKind::Text(text) if !text.content.trim().is_empty() => Some(text.content.as_str()),
            _ => None,
        });
        let first_image = content.iter().find_map(|b| match &b.kind {
            BlockKind::Image(image) if !image.image_url.trim().is_empty() => {
                Some(image.image_url.trim().to_string())
            }
            _ => None,
        });

        let tags = [block, external]
            .into_iter()
            .flatten()
            .find_map(|data| data.tags.clone().filter(|tags| !tags.is_empty()))
            .unwrap_or_else(|| DEFAULT_TAGS.iter().map(|t| (*t).to_string()).collect());

        Self {
            title: pick(|d| d.title.as_ref()).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            subtitle: pick(|d| d.subtitle.as_ref())
                .or_else(|| first_text.map(|t| excerpt(t, SUBTITLE_EXCERPT_CHARS))),
            date: pick(|d| d.date.as_ref()),
            author: pick(|d| d.author.as_ref()).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            cover_image: pick(|d| d.cover_image.as_ref()).or(first_image),
            status: pick(|d| d.status.as_ref()).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            tags,
            call_to_action: pick(|d| d.call_to_action.as_ref())
                .unwrap_or_else(|| DEFAULT_CALL_TO_ACTION.to_string()),
            call_to_action_url: pick(|d| d.call_to_action_url.as_ref())
                .unwrap_or_else(|| DEFAULT_CALL_TO_ACTION_URL.to_string()),
        }
    }
}

/// Renders a composition as a news article page.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewsArticleRenderer;

impl ModeRenderer for NewsArticleRenderer {
    fn mode(&self) -> RenderMode {
        RenderMode::Article
    }

    fn render(&self, blocks: &[ContentBlock], options: &RenderOptions) -> RenderResult<RenderOutput> {
        let styles = options.style_context(StyleTarget::Web)?;
        let meta = ArticleFrontmatter::resolve(blocks, options.frontmatter.as_ref());

        let stream = top_level_blocks(blocks);
        let mut writer = BlockWriter::new(blocks, styles, Typography::Article).strip_html_styles();
        let body = writer.render_all(&stream);

        let mut article = HtmlElement::new("article").attr("class", "news-article");
        if let Some(sheet) = options.active_stylesheet() {
            article = article.child(
                HtmlElement::new("style")
                    .attr("data-stylesheet", sheet.id().as_str())
                    .child(HtmlNode::raw(sheet.source().replace("</style", "<\\/style"))),
            );
        }
        if let Some(cover) = &meta.cover_image {
            article = article.child(hero(cover, &meta));
        }
        article = article
            .child(header(&meta))
            .child(
                HtmlElement::new("div")
                    .attr("class", "article-body")
                    .children(body),
            );
        if options.show_call_to_action {
            article = article.child(
                HtmlElement::new("aside").attr("class", "article-cta").child(
                    HtmlElement::new("a")
                        .attr("class", "article-cta-button")
                        .attr("href", meta.call_to_action_url.as_str())
                        .text(meta.call_to_action.as_str()),
                ),
            );
        }

        Ok(RenderOutput {
            output: RenderedOutput::Tree(article.into()),
            fallbacks: writer.into_fallbacks(),
        })
    }
}

fn hero(cover: &str, meta: &ArticleFrontmatter) -> HtmlElement {
    HtmlElement::new("div")
        .attr("class", "article-hero")
        .child(
            HtmlElement::new("img")
                .attr("class", "article-hero-image")
                .attr("src", cover)
                .attr("alt", meta.title.as_str()),
        )
        .child(
            HtmlElement::new("span")
                .attr("class", "article-status")
                .text(meta.status.as_str()),
        )
}

fn header(meta: &ArticleFrontmatter) -> HtmlElement {
    let mut header = HtmlElement::new("header")
        .attr("class", "article-header")
        .child(
            HtmlElement::new("h1")
                .attr("class", "article-title")
                .text(meta.title.as_str()),
        );
    if let Some(subtitle) = &meta.subtitle {
        header = header.child(
            HtmlElement::new("p")
                .attr("class", "article-subtitle")
                .text(subtitle.as_str()),
        );
    }

    let mut byline = HtmlElement::new("div").attr("class", "article-meta").child(
        HtmlElement::new("span")
            .attr("class", "article-author")
            .text(format!("By {}", meta.author)),
    );
    if let Some(date) = &meta.date {
        byline = byline.child(
            HtmlElement::new("time")
                .attr("class", "article-date")
                .text(date.as_str()),
        );
    }
    header = header.child(byline);

    if !meta.tags.is_empty() {
        header = header.child(
            HtmlElement::new("ul")
                .attr("class", "article-tags")
                .children(meta.tags.iter().map(|tag| {
                    HtmlElement::new("li")
                        .attr("class", "article-tag")
                        .text(tag.as_str())
                        .into()
                })),
        );
    }
    header
}
