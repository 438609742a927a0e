//! Email document generation.
//!
//! Two strategies produce a complete, self-contained HTML document:
//!
//! - [`StyledCompositionEmail`] renders the composition through the Clean
//!   email sub-mode with class styles compiled for the target platform.
//! - [`TemplatedEmail`] ignores the stylesheet and lays the blocks out in a
//!   fixed template with header, content, call-to-action and footer.

use std::fmt;
use std::str::FromStr;

use compose_core::{find_frontmatter, ContentBlock, FrontmatterData, StyleMap};
use serde::{Deserialize, Serialize};

use crate::error::RenderResult;
use crate::html::{HtmlElement, HtmlNode};
use crate::mode::blocks::{presentation_table, top_level_blocks, BlockWriter, Typography};
use crate::mode::clean::CleanRenderer;
use crate::mode::ModeRenderer;
use crate::style::{EmailPlatform, StyleContext, StyleTarget};
use crate::{RenderMode, RenderOptions, RenderOutput, RenderedOutput};

/// Title used when neither options nor frontmatter provide one.
const DEFAULT_EMAIL_TITLE: &str = "Email";

/// Client reset inlined into every email document.
const RESET_CSS: &str = "\
body, table, td, a { -webkit-text-size-adjust: 100%; -ms-text-size-adjust: 100%; }
table, td { mso-table-lspace: 0pt; mso-table-rspace: 0pt; border-collapse: collapse; }
img { -ms-interpolation-mode: bicubic; border: 0; height: auto; line-height: 100%; outline: none; text-decoration: none; }
body { margin: 0 !important; padding: 0 !important; width: 100% !important; height: 100% !important; }
a[x-apple-data-detectors] { color: inherit !important; text-decoration: none !important; }";

const DARK_MODE_CSS: &str = "\
@media (prefers-color-scheme: dark) {
  body, .email-wrapper { background-color: #121212 !important; }
  .email-container, .email-content { background-color: #1e1e1e !important; }
  h1, h2, h3, h4, h5, h6, p, li, td { color: #f1f1f1 !important; }
  a { color: #8ab4f8 !important; }
}";

const RESPONSIVE_CSS: &str = "\
@media screen and (max-width: 600px) {
  .email-container { width: 100% !important; max-width: 100% !important; }
  .email-body, .email-content { padding: 16px !important; }
  img { max-width: 100% !important; height: auto !important; }
  .email-column { display: block !important; width: 100% !important; }
}";

/// Fixed stylesheet of the templated generator.
const TEMPLATE_CSS: &str = "\
body { background-color: #f4f4f4; font-family: Arial, Helvetica, sans-serif; color: #333333; }
h1 { font-size: 32px; line-height: 1.2; margin: 0 0 16px 0; }
h2 { font-size: 26px; line-height: 1.25; margin: 0 0 14px 0; }
h3 { font-size: 22px; line-height: 1.3; margin: 0 0 12px 0; }
p { font-size: 16px; line-height: 1.6; margin: 0 0 16px 0; }
a { color: #007bff; }
.email-header { text-align: center; padding: 32px 24px 16px 24px; }
.email-subtitle { font-size: 18px; color: #666666; }
.cta-button { display: inline-block; background-color: #007bff; color: #ffffff !important; padding: 14px 28px; border-radius: 4px; font-weight: bold; text-decoration: none; }
.email-footer { font-size: 12px; color: #999999; text-align: center; padding: 24px; }
.email-footer a { color: #999999; }";

/// Which email layout to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTemplate {
    /// Clean email sub-mode with the composition's stylesheet.
    #[default]
    Styled,
    /// Fixed template with inline styles from block fields.
    Templated,
}

impl EmailTemplate {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Styled => "styled",
            Self::Templated => "templated",
        }
    }

    /// Strategy implementing this template.
    #[must_use]
    pub fn strategy(self) -> &'static dyn EmailStrategy {
        match self {
            Self::Styled => &StyledCompositionEmail,
            Self::Templated => &TemplatedEmail,
        }
    }
}

impl fmt::Display for EmailTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "styled" => Ok(Self::Styled),
            "templated" => Ok(Self::Templated),
            other => Err(format!("Unknown email template: {other}")),
        }
    }
}

/// Produces a complete email document from a block snapshot.
pub trait EmailStrategy: Send + Sync {
    /// Template this strategy implements.
    fn template(&self) -> EmailTemplate;

    /// Render the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy needs a stylesheet that is not
    /// resolved.
    fn render_document(
        &self,
        blocks: &[ContentBlock],
        options: &RenderOptions,
    ) -> RenderResult<RenderOutput>;
}

/// Clean email sub-mode wrapped in the email shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyledCompositionEmail;

impl EmailStrategy for StyledCompositionEmail {
    fn template(&self) -> EmailTemplate {
        EmailTemplate::Styled
    }

    fn render_document(
        &self,
        blocks: &[ContentBlock],
        options: &RenderOptions,
    ) -> RenderResult<RenderOutput> {
        let styles = options.style_context(StyleTarget::Email {
            platform: options.email_platform,
            policy: options.email_policy.as_ref(),
        })?;
        let (body, fallbacks) = CleanRenderer::render_email(blocks, styles);
        let title = document_title(blocks, options);
        Ok(RenderOutput {
            output: RenderedOutput::Document(email_document(&title, "", &body)),
            fallbacks,
        })
    }
}

/// Fixed-layout email generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatedEmail;

impl EmailStrategy for TemplatedEmail {
    fn template(&self) -> EmailTemplate {
        EmailTemplate::Templated
    }

    fn render_document(
        &self,
        blocks: &[ContentBlock],
        options: &RenderOptions,
    ) -> RenderResult<RenderOutput> {
        let styles = StyleContext::unstyled(StyleTarget::Email {
            platform: options.email_platform,
            policy: options.email_policy.as_ref(),
        });
        let stream = top_level_blocks(blocks);
        let mut writer = BlockWriter::new(blocks, styles, Typography::Clean);
        let content = writer.render_all(&stream);

        let data = TemplateData::collect(blocks, options.frontmatter.as_ref());
        let title = document_title(blocks, options);

        let mut rows: Vec<HtmlNode> = Vec::new();
        if let Some(cover) = &data.cover_image {
            rows.push(row(HtmlElement::new("td").style(&StyleMap::new().with("padding", "0")).child(
                HtmlElement::new("img")
                    .attr("class", "email-cover")
                    .attr("src", cover.as_str())
                    .attr("alt", title.as_str())
                    .attr("width", "600")
                    .style(
                        &StyleMap::new()
                            .with("display", "block")
                            .with("width", "100%")
                            .with("max-width", "600px"),
                    ),
            )));
        }

        let mut header = HtmlElement::new("td")
            .attr("class", "email-header")
            .child(HtmlElement::new("h1").text(title.as_str()));
        if let Some(subtitle) = &data.subtitle {
            header = header.child(
                HtmlElement::new("p")
                    .attr("class", "email-subtitle")
                    .text(subtitle.as_str()),
            );
        }
        rows.push(row(header));

        rows.push(row(HtmlElement::new("td")
            .attr("class", "email-content")
            .style(&StyleMap::new().with("padding", "24px"))
            .children(content)));

        if options.show_call_to_action {
            if let Some((label, url)) = &data.call_to_action {
                rows.push(row(HtmlElement::new("td")
                    .attr("align", "center")
                    .style(&StyleMap::new().with("padding", "8px 24px 32px 24px"))
                    .child(
                        HtmlElement::new("a")
                            .attr("class", "cta-button")
                            .attr("href", url.as_str())
                            .text(label.as_str()),
                    )));
            }
        }

        rows.push(row(footer(options.email_platform)));

        let container = presentation_table()
            .attr("class", "email-container")
            .attr("width", "600")
            .attr("align", "center")
            .style(
                &StyleMap::new()
                    .with("max-width", "600px")
                    .with("width", "100%")
                    .with("margin", "0 auto")
                    .with("background-color", "#ffffff"),
            )
            .children(rows);

        tracing::debug!(
            platform = %options.email_platform,
            blocks = stream.len(),
            "rendered templated email"
        );

        Ok(RenderOutput {
            output: RenderedOutput::Document(email_document(
                &title,
                TEMPLATE_CSS,
                &container.into(),
            )),
            fallbacks: writer.into_fallbacks(),
        })
    }
}

/// Header fields of the templated email.
struct TemplateData {
    subtitle: Option<String>,
    cover_image: Option<String>,
    call_to_action: Option<(String, String)>,
}

impl TemplateData {
    fn collect(blocks: &[ContentBlock], external: Option<&FrontmatterData>) -> Self {
        let block = find_frontmatter(blocks);
        let pick = |field: fn(&FrontmatterData) -> Option<&String>| -> Option<String> {
            [block, external]
                .into_iter()
                .flatten()
                .find_map(|data| field(data).filter(|v| !v.trim().is_empty()))
                .map(|v| v.trim().to_string())
        };
        let call_to_action = pick(|d| d.call_to_action.as_ref())
            .map(|label| {
                let url = pick(|d| d.call_to_action_url.as_ref()).unwrap_or_else(|| "#".into());
                (label, url)
            });
        Self {
            subtitle: pick(|d| d.subtitle.as_ref()),
            cover_image: pick(|d| d.cover_image.as_ref()),
            call_to_action,
        }
    }
}

fn row(cell: HtmlElement) -> HtmlNode {
    HtmlElement::new("tr").child(cell).into()
}

fn footer(platform: EmailPlatform) -> HtmlElement {
    HtmlElement::new("td")
        .attr("class", "email-footer")
        .child(HtmlElement::new("p").text("You are receiving this email because you subscribed."))
        .child(
            HtmlElement::new("p").child(
                HtmlElement::new("a")
                    .attr("class", "unsubscribe-link")
                    .attr("href", platform.unsubscribe_tag())
                    .text("Unsubscribe"),
            ),
        )
}

/// Title from the options, else the frontmatter, else a fixed default.
fn document_title(blocks: &[ContentBlock], options: &RenderOptions) -> String {
    options
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            [find_frontmatter(blocks), options.frontmatter.as_ref()]
                .into_iter()
                .flatten()
                .find_map(|data| data.title.clone().filter(|t| !t.trim().is_empty()))
        })
        .unwrap_or_else(|| DEFAULT_EMAIL_TITLE.to_string())
}

/// Wrap an email body in a complete document.
///
/// The shell carries the doctype, charset and viewport meta, the client
/// reset, a dark-mode block and the 600px breakpoint. `extra_css` is
/// appended to the embedded stylesheet.
#[must_use]
pub fn email_document(title: &str, extra_css: &str, body: &HtmlNode) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\" xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str("<meta http-equiv=\"X-UA-Compatible\" content=\"IE=edge\">\n");
    html.push_str("<meta name=\"color-scheme\" content=\"light dark\">\n");
    html.push_str("<meta name=\"supported-color-schemes\" content=\"light dark\">\n");
    html.push_str("<title>");
    html.push_str(&html_escape::encode_text(title));
    html.push_str("</title>\n<style type=\"text/css\">\n");
    html.push_str(RESET_CSS);
    html.push('\n');
    if !extra_css.is_empty() {
        html.push_str(extra_css);
        html.push('\n');
    }
    html.push_str(DARK_MODE_CSS);
    html.push('\n');
    html.push_str(RESPONSIVE_CSS);
    html.push_str("\n</style>\n</head>\n");
    html.push_str("<body style=\"margin: 0; padding: 0; background-color: #f4f4f4;\">\n");

    let wrapper = presentation_table()
        .attr("class", "email-wrapper")
        .attr("width", "100%")
        .style(&StyleMap::new().with("background-color", "#f4f4f4"))
        .child(row(HtmlElement::new("td").attr("align", "center").child(body.clone())));
    HtmlNode::from(wrapper).write_html(&mut html);

    html.push_str("\n</body>\n</html>\n");
    html
}

/// Renders email documents, dispatching on the selected template.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailRenderer;

impl ModeRenderer for EmailRenderer {
    fn mode(&self) -> RenderMode {
        RenderMode::Email
    }

    fn render(&self, blocks: &[ContentBlock], options: &RenderOptions) -> RenderResult<RenderOutput> {
        let strategy = options.email_template.strategy();
        tracing::debug!(
            template = %strategy.template(),
            platform = %options.email_platform,
            "dispatching email strategy"
        );
        strategy.render_document(blocks, options)
    }
}
