//! Clean renderer: live preview, web export and the styled email body.

use compose_core::{BlockKind, ContentBlock, StyleMap};

use crate::error::{BlockRenderFallback, RenderResult};
use crate::html::{HtmlElement, HtmlNode};
use crate::mode::blocks::{presentation_table, top_level_blocks, BlockWriter, Typography};
use crate::mode::ModeRenderer;
use crate::style::{StyleContext, StyleTarget};
use crate::{RenderMode, RenderOptions, RenderOutput, RenderedOutput};

/// Split sorted blocks into the email header run and the body.
///
/// The header is the leading contiguous run of full-width images. The first
/// block that does not qualify ends the run for good, so later full-width
/// images stay in the body.
#[must_use]
pub fn partition_header<'a>(
    blocks: &[&'a ContentBlock],
) -> (Vec<&'a ContentBlock>, Vec<&'a ContentBlock>) {
    let mut header = Vec::new();
    let mut body = Vec::new();
    let mut found_non_header = false;
    for block in blocks {
        let qualifies = matches!(&block.kind, BlockKind::Image(image) if image.is_email_full_width());
        if qualifies && !found_non_header {
            header.push(*block);
        } else {
            found_non_header = true;
            body.push(*block);
        }
    }
    (header, body)
}

/// Renders compositions as a plain block stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanRenderer;

impl CleanRenderer {
    /// Render for the web.
    #[must_use]
    pub fn render_web(
        blocks: &[ContentBlock],
        styles: StyleContext<'_>,
    ) -> (HtmlNode, Vec<BlockRenderFallback>) {
        let stream = top_level_blocks(blocks);
        let mut writer = BlockWriter::new(blocks, styles, Typography::Clean);
        let nodes = writer.render_all(&stream);
        (HtmlNode::Fragment(nodes), writer.into_fallbacks())
    }

    /// Render the email sub-mode: full-bleed header images, then the body in
    /// a 600px container.
    #[must_use]
    pub fn render_email(
        blocks: &[ContentBlock],
        styles: StyleContext<'_>,
    ) -> (HtmlNode, Vec<BlockRenderFallback>) {
        let stream = top_level_blocks(blocks);
        let (header, body) = partition_header(&stream);
        tracing::debug!(
            header = header.len(),
            body = body.len(),
            "partitioned email blocks"
        );

        let mut writer = BlockWriter::new(blocks, styles, Typography::Clean);
        let mut nodes = Vec::with_capacity(header.len() + 1);
        for block in header {
            let image = writer.render_block(block);
            nodes.push(full_bleed(block, image));
        }

        let content = writer.render_all(&body);
        nodes.push(
            presentation_table()
                .attr("class", "email-container")
                .attr("width", "600")
                .attr("align", "center")
                .style(
                    &StyleMap::new()
                        .with("max-width", "600px")
                        .with("width", "100%")
                        .with("margin", "0 auto"),
                )
                .child(
                    HtmlElement::new("tr").child(
                        HtmlElement::new("td")
                            .attr("class", "email-body")
                            .style(&StyleMap::new().with("padding", "24px"))
                            .children(content),
                    ),
                )
                .into(),
        );

        (HtmlNode::Fragment(nodes), writer.into_fallbacks())
    }
}

impl ModeRenderer for CleanRenderer {
    fn mode(&self) -> RenderMode {
        RenderMode::Clean
    }

    fn render(&self, blocks: &[ContentBlock], options: &RenderOptions) -> RenderResult<RenderOutput> {
        let styles = options.style_context(StyleTarget::Web)?;
        let (tree, fallbacks) = Self::render_web(blocks, styles);
        Ok(RenderOutput {
            output: RenderedOutput::Tree(tree),
            fallbacks,
        })
    }
}

/// Wrap a header image in a full-width container with its own background.
fn full_bleed(block: &ContentBlock, image: HtmlNode) -> HtmlNode {
    let background = match &block.kind {
        BlockKind::Image(img) => img.email.background_color.as_deref(),
        _ => None,
    };
    let mut styles = StyleMap::new();
    if let Some(color) = background.filter(|c| !c.trim().is_empty()) {
        styles.set("background-color", color.trim());
    }
    presentation_table()
        .attr("class", "email-header-image")
        .attr("width", "100%")
        .attr_opt("bgcolor", background.map(str::trim).filter(|c| !c.is_empty()))
        .style(&styles)
        .child(
            HtmlElement::new("tr").child(
                HtmlElement::new("td")
                    .attr("align", "center")
                    .style(&StyleMap::new().with("padding", "0"))
                    .child(image),
            ),
        )
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{EmailCssPolicy, EmailPlatform};
    use compose_core::{ImageBlock, TextBlock};

    fn image(id: &str, order: f64, full: bool) -> ContentBlock {
        let mut img = ImageBlock::new(format!("https://x/{id}.jpg"));
        if full {
            img = img.full_width(Some("#111111"));
        }
        ContentBlock::new(BlockKind::Image(img))
            .with_id(id)
            .with_order(order)
    }

    fn text(id: &str, order: f64) -> ContentBlock {
        ContentBlock::new(BlockKind::Text(TextBlock::paragraph(id)))
            .with_id(id)
            .with_order(order)
    }

    fn ids(blocks: &[&ContentBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.id.to_string()).collect()
    }

    #[test]
    fn test_partition_leading_run_only() {
        let blocks = [
            image("a", 0.0, true),
            image("b", 1.0, true),
            text("t", 2.0),
            image("c", 3.0, true),
        ];
        let refs: Vec<&ContentBlock> = blocks.iter().collect();

        let (header, body) = partition_header(&refs);

        assert_eq!(ids(&header), vec!["a", "b"]);
        assert_eq!(ids(&body), vec!["t", "c"]);
    }

    #[test]
    fn test_partition_without_leading_image() {
        let blocks = [text("t", 0.0), image("a", 1.0, true)];
        let refs: Vec<&ContentBlock> = blocks.iter().collect();

        let (header, body) = partition_header(&refs);

        assert!(header.is_empty());
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_email_header_uses_background_color() {
        let blocks = vec![image("a", 0.0, true), text("t", 1.0)];
        let policy = EmailCssPolicy::default();
        let styles = StyleContext::unstyled(StyleTarget::Email {
            platform: EmailPlatform::Mailchimp,
            policy: &policy,
        });

        let (tree, fallbacks) = CleanRenderer::render_email(&blocks, styles);
        let html = tree.to_html();

        assert!(fallbacks.is_empty());
        assert!(html.starts_with("<table role=\"presentation\""));
        assert!(html.contains("class=\"email-header-image\""));
        assert!(html.contains("background-color: #111111"));
        assert!(html.contains("class=\"email-container\""));
    }

    #[test]
    fn test_web_render_is_fragment_of_blocks() {
        let blocks = vec![text("b", 1.0), text("a", 0.0)];
        let (tree, _) = CleanRenderer::render_web(&blocks, StyleContext::unstyled(StyleTarget::Web));
        let html = tree.to_html();
        let a = html.find(">a<").expect("a rendered");
        let b = html.find(">b<").expect("b rendered");
        assert!(a < b);
    }
}
