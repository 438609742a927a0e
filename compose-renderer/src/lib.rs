//! # Compose Renderer
//!
//! Turns a block snapshot into HTML for live preview, web export, a news
//! article page or an email client.
//!
//! ## Rendering Modes
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              ModeRenderer Trait             │
//! ├─────────────┬─────────────┬─────────────────┤
//! │ Clean       │ Article     │ Email           │
//! │ (web tree)  │ (web tree)  │ (document)      │
//! └─────────────┴─────────────┴───────┬─────────┘
//!                                     │
//!                        ┌────────────┴────────────┐
//!                        │ Styled      │ Templated │
//!                        └─────────────┴───────────┘
//! ```
//!
//! Every render receives its stylesheet state explicitly through
//! [`RenderOptions`]. A requested stylesheet that has not resolved is a
//! precondition failure, never a silent render with defaults.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod email;
pub mod error;
pub mod export;
pub mod html;
pub mod mode;
pub mod rich_text;
pub mod style;

pub use email::{
    email_document, EmailRenderer, EmailStrategy, EmailTemplate, StyledCompositionEmail,
    TemplatedEmail,
};
pub use error::{BlockRenderFallback, FallbackReason, RenderError, RenderResult};
pub use export::{
    export_file_name, web_document, Delivery, DeliveryAction, ExportFormat, ExportOptions,
    ExportResult, ExportSession, ExportState, Exporter, MemoryDelivery, SystemDelivery,
};
pub use html::{HtmlElement, HtmlNode};
pub use mode::article::{ArticleFrontmatter, NewsArticleRenderer};
pub use mode::clean::{partition_header, CleanRenderer};
pub use mode::ModeRenderer;
pub use style::{
    class_styles_to_email_inline, class_styles_to_inline, element_styles, EmailCssPolicy,
    EmailPlatform, PlatformRules, StyleContext, StyleTarget,
};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use compose_core::{ContentBlock, FrontmatterData, StyleState, Stylesheet};
use serde::{Deserialize, Serialize};

/// Output layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Live preview and plain web export.
    #[default]
    Clean,
    /// News article page.
    Article,
    /// Email-client-safe document.
    Email,
}

impl RenderMode {
    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Article => "article",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clean" | "web" => Ok(Self::Clean),
            "article" | "news-article" | "news" => Ok(Self::Article),
            "email" => Ok(Self::Email),
            other => Err(format!("Unknown render mode: {other}")),
        }
    }
}

/// Options for a single render call.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Stylesheet state for the composition.
    pub style: StyleState,
    /// Whether class and element styles are compiled at all.
    pub include_css: bool,
    /// Target email platform.
    pub email_platform: EmailPlatform,
    /// Email layout strategy.
    pub email_template: EmailTemplate,
    /// Email CSS deny-list table.
    pub email_policy: Arc<EmailCssPolicy>,
    /// Frontmatter supplied outside the block list.
    pub frontmatter: Option<FrontmatterData>,
    /// Whether call-to-action panels are rendered.
    pub show_call_to_action: bool,
    /// Document title override.
    pub title: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            style: StyleState::None,
            include_css: true,
            email_platform: EmailPlatform::default(),
            email_template: EmailTemplate::default(),
            email_policy: Arc::new(EmailCssPolicy::default()),
            frontmatter: None,
            show_call_to_action: true,
            title: None,
        }
    }
}

impl RenderOptions {
    /// Options with the given stylesheet state.
    #[must_use]
    pub fn with_style(mut self, style: StyleState) -> Self {
        self.style = style;
        self
    }

    /// Enable or disable stylesheet compilation.
    #[must_use]
    pub fn with_include_css(mut self, include_css: bool) -> Self {
        self.include_css = include_css;
        self
    }

    /// Set the email platform.
    #[must_use]
    pub fn with_email_platform(mut self, platform: EmailPlatform) -> Self {
        self.email_platform = platform;
        self
    }

    /// Set the email template.
    #[must_use]
    pub fn with_email_template(mut self, template: EmailTemplate) -> Self {
        self.email_template = template;
        self
    }

    /// Set the email CSS policy.
    #[must_use]
    pub fn with_email_policy(mut self, policy: Arc<EmailCssPolicy>) -> Self {
        self.email_policy = policy;
        self
    }

    /// Set external frontmatter.
    #[must_use]
    pub fn with_frontmatter(mut self, frontmatter: Option<FrontmatterData>) -> Self {
        self.frontmatter = frontmatter;
        self
    }

    /// Set the document title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The stylesheet to apply, if styling is enabled and it has resolved.
    #[must_use]
    pub fn active_stylesheet(&self) -> Option<&Stylesheet> {
        if self.include_css {
            self.style.stylesheet()
        } else {
            None
        }
    }

    /// Build the style context for a render.
    ///
    /// With `include_css` off the stylesheet state is ignored entirely.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::StyleResolutionPending`] or
    /// [`RenderError::StyleResolutionFailed`] when a stylesheet was requested
    /// but is not ready.
    pub fn style_context<'a>(&'a self, target: StyleTarget<'a>) -> RenderResult<StyleContext<'a>> {
        if !self.include_css {
            return Ok(StyleContext::unstyled(target));
        }
        match &self.style {
            StyleState::None => Ok(StyleContext::unstyled(target)),
            StyleState::Ready(sheet) => Ok(StyleContext::new(Some(sheet.parsed()), target)),
            StyleState::Pending(id) => Err(RenderError::StyleResolutionPending(id.to_string())),
            StyleState::Failed { id, reason } => Err(RenderError::StyleResolutionFailed {
                id: id.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// What a render produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedOutput {
    /// Displayable tree (Clean and Article).
    Tree(HtmlNode),
    /// Complete HTML document (Email).
    Document(String),
}

impl RenderedOutput {
    /// Serialize to HTML.
    #[must_use]
    pub fn to_html(&self) -> String {
        match self {
            Self::Tree(node) => node.to_html(),
            Self::Document(html) => html.clone(),
        }
    }

    /// The tree, if this is tree output.
    #[must_use]
    pub fn as_tree(&self) -> Option<&HtmlNode> {
        match self {
            Self::Tree(node) => Some(node),
            Self::Document(_) => None,
        }
    }

    /// The document, if this is document output.
    #[must_use]
    pub fn as_document(&self) -> Option<&str> {
        match self {
            Self::Document(html) => Some(html),
            Self::Tree(_) => None,
        }
    }
}

/// Render output with the placeholders that were substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Rendered output.
    pub output: RenderedOutput,
    /// Blocks rendered as placeholders.
    pub fallbacks: Vec<BlockRenderFallback>,
}

impl RenderOutput {
    /// Serialize the output to HTML.
    #[must_use]
    pub fn to_html(&self) -> String {
        self.output.to_html()
    }
}

/// Renderer for a mode.
#[must_use]
pub fn renderer_for(mode: RenderMode) -> &'static dyn ModeRenderer {
    match mode {
        RenderMode::Clean => &CleanRenderer,
        RenderMode::Article => &NewsArticleRenderer,
        RenderMode::Email => &EmailRenderer,
    }
}

/// Render a block snapshot in the given mode.
///
/// # Errors
///
/// Returns an error if a requested stylesheet has not resolved.
pub fn render(
    blocks: &[ContentBlock],
    mode: RenderMode,
    options: &RenderOptions,
) -> RenderResult<RenderOutput> {
    let renderer = renderer_for(mode);
    tracing::debug!(
        mode = %renderer.mode(),
        blocks = blocks.len(),
        include_css = options.include_css,
        "rendering composition"
    );
    let output = renderer.render(blocks, options)?;
    if !output.fallbacks.is_empty() {
        tracing::debug!(count = output.fallbacks.len(), "rendered with placeholders");
    }
    Ok(output)
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
