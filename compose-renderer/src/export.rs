//! Composition export to web or email HTML.
//!
//! An [`Exporter`] renders a [`Composition`] according to [`ExportOptions`]
//! and hands the HTML to a [`Delivery`] (clipboard or file download).
//! [`ExportSession`] wraps one export in the
//! `Idle → Configuring → Exporting → Done | Failed` state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use compose_core::{Composition, StyleState};
use serde::{Deserialize, Serialize};

use crate::email::EmailTemplate;
use crate::error::{BlockRenderFallback, RenderError, RenderResult};
use crate::style::{EmailCssPolicy, EmailPlatform};
use crate::{render, RenderMode, RenderOptions};

/// Name used when neither the request nor the composition provide one.
const FALLBACK_FILE_STEM: &str = "composition";

/// Export target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Web page or fragment.
    #[default]
    Web,
    /// Email document.
    Email,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Web => "web",
            Self::Email => "email",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" | "html" => Ok(Self::Web),
            "email" => Ok(Self::Email),
            other => Err(format!("Unknown export format: {other}")),
        }
    }
}

/// How the exported HTML is handed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryAction {
    /// Copy to the clipboard.
    #[default]
    Copy,
    /// Save as an `.html` file.
    Download,
}

impl fmt::Display for DeliveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Copy => "copy",
            Self::Download => "download",
        })
    }
}

impl FromStr for DeliveryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" | "clipboard" => Ok(Self::Copy),
            "download" | "file" => Ok(Self::Download),
            other => Err(format!("Unknown delivery action: {other}")),
        }
    }
}

/// Export configuration.
///
/// Setters keep the options consistent: minimal HTML forces web output
/// without CSS, while choosing email or CSS turns minimal HTML off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    format: ExportFormat,
    email_platform: EmailPlatform,
    email_template: EmailTemplate,
    action: DeliveryAction,
    include_css: bool,
    minimal_html: bool,
    file_name: Option<String>,
}

impl ExportOptions {
    /// Default options: web, copy, no CSS.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Export target.
    #[must_use]
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Email platform.
    #[must_use]
    pub fn email_platform(&self) -> EmailPlatform {
        self.email_platform
    }

    /// Email template.
    #[must_use]
    pub fn email_template(&self) -> EmailTemplate {
        self.email_template
    }

    /// Delivery action.
    #[must_use]
    pub fn action(&self) -> DeliveryAction {
        self.action
    }

    /// Whether the stylesheet is compiled and embedded.
    #[must_use]
    pub fn include_css(&self) -> bool {
        self.include_css
    }

    /// Whether web output is a bare fragment.
    #[must_use]
    pub fn minimal_html(&self) -> bool {
        self.minimal_html
    }

    /// Requested download file name.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Set the export target. Email turns minimal HTML off.
    pub fn set_format(&mut self, format: ExportFormat) {
        self.format = format;
        if format == ExportFormat::Email {
            self.minimal_html = false;
        }
    }

    /// Set the email platform.
    pub fn set_email_platform(&mut self, platform: EmailPlatform) {
        self.email_platform = platform;
    }

    /// Set the email template.
    pub fn set_email_template(&mut self, template: EmailTemplate) {
        self.email_template = template;
    }

    /// Set the delivery action.
    pub fn set_action(&mut self, action: DeliveryAction) {
        self.action = action;
    }

    /// Toggle CSS. Turning it on turns minimal HTML off.
    pub fn set_include_css(&mut self, include_css: bool) {
        self.include_css = include_css;
        if include_css {
            self.minimal_html = false;
        }
    }

    /// Toggle minimal HTML. Turning it on forces web output without CSS.
    pub fn set_minimal_html(&mut self, minimal_html: bool) {
        self.minimal_html = minimal_html;
        if minimal_html {
            self.format = ExportFormat::Web;
            self.include_css = false;
        }
    }

    /// Set the download file name.
    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name.filter(|name| !name.trim().is_empty());
    }

    /// Builder form of [`Self::set_format`].
    #[must_use]
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.set_format(format);
        self
    }

    /// Builder form of [`Self::set_email_platform`].
    #[must_use]
    pub fn with_email_platform(mut self, platform: EmailPlatform) -> Self {
        self.set_email_platform(platform);
        self
    }

    /// Builder form of [`Self::set_email_template`].
    #[must_use]
    pub fn with_email_template(mut self, template: EmailTemplate) -> Self {
        self.set_email_template(template);
        self
    }

    /// Builder form of [`Self::set_action`].
    #[must_use]
    pub fn with_action(mut self, action: DeliveryAction) -> Self {
        self.set_action(action);
        self
    }

    /// Builder form of [`Self::set_include_css`].
    #[must_use]
    pub fn with_include_css(mut self, include_css: bool) -> Self {
        self.set_include_css(include_css);
        self
    }

    /// Builder form of [`Self::set_minimal_html`].
    #[must_use]
    pub fn with_minimal_html(mut self, minimal_html: bool) -> Self {
        self.set_minimal_html(minimal_html);
        self
    }

    /// Builder form of [`Self::set_file_name`].
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.set_file_name(Some(file_name.into()));
        self
    }
}

/// A completed export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    /// Delivered HTML.
    pub html: String,
    /// How it was delivered.
    pub delivered_via: DeliveryAction,
    /// File name used for a download.
    pub file_name: Option<String>,
    /// Where a download was written.
    pub location: Option<PathBuf>,
    /// Blocks rendered as placeholders.
    pub fallbacks: Vec<BlockRenderFallback>,
}

/// Clipboard and file-download primitives.
pub trait Delivery {
    /// Copy HTML to the clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeliveryFailed`] if the clipboard is unavailable.
    fn copy(&mut self, html: &str) -> RenderResult<()>;

    /// Offer HTML as a file and return where it went.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DeliveryFailed`] if the file cannot be written.
    fn download(&mut self, file_name: &str, html: &str) -> RenderResult<PathBuf>;
}

/// Delivery through the system clipboard and a download directory.
#[derive(Debug, Clone)]
pub struct SystemDelivery {
    download_dir: PathBuf,
}

impl SystemDelivery {
    /// Deliver downloads into `download_dir`.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// Download directory.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

impl Delivery for SystemDelivery {
    #[cfg(feature = "clipboard")]
    fn copy(&mut self, html: &str) -> RenderResult<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| RenderError::DeliveryFailed(format!("Clipboard unavailable: {e}")))?;
        clipboard
            .set_text(html.to_string())
            .map_err(|e| RenderError::DeliveryFailed(format!("Clipboard write failed: {e}")))?;
        tracing::debug!(bytes = html.len(), "copied export to clipboard");
        Ok(())
    }

    #[cfg(not(feature = "clipboard"))]
    fn copy(&mut self, _html: &str) -> RenderResult<()> {
        Err(RenderError::DeliveryFailed(
            "Clipboard support is not enabled".to_string(),
        ))
    }

    fn download(&mut self, file_name: &str, html: &str) -> RenderResult<PathBuf> {
        std::fs::create_dir_all(&self.download_dir).map_err(|e| {
            RenderError::DeliveryFailed(format!(
                "Cannot create {}: {e}",
                self.download_dir.display()
            ))
        })?;
        let path = self.download_dir.join(file_name);
        std::fs::write(&path, html).map_err(|e| {
            RenderError::DeliveryFailed(format!("Cannot write {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), bytes = html.len(), "wrote export file");
        Ok(path)
    }
}

/// In-memory delivery that records what it receives.
#[derive(Debug, Clone, Default)]
pub struct MemoryDelivery {
    /// Copied payloads.
    pub copied: Vec<String>,
    /// Downloaded `(file_name, html)` pairs.
    pub downloads: Vec<(String, String)>,
    failure: Option<String>,
}

impl MemoryDelivery {
    /// Delivery that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery that fails every action with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    fn check(&self) -> RenderResult<()> {
        match &self.failure {
            Some(reason) => Err(RenderError::DeliveryFailed(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Delivery for MemoryDelivery {
    fn copy(&mut self, html: &str) -> RenderResult<()> {
        self.check()?;
        self.copied.push(html.to_string());
        Ok(())
    }

    fn download(&mut self, file_name: &str, html: &str) -> RenderResult<PathBuf> {
        self.check()?;
        self.downloads.push((file_name.to_string(), html.to_string()));
        Ok(PathBuf::from(file_name))
    }
}

/// Download file name for an export.
///
/// Uses the requested name, else the composition name, else
/// `composition`. Path separators are replaced and `.html` is appended
/// once.
#[must_use]
pub fn export_file_name(requested: Option<&str>, composition_name: &str) -> String {
    let stem = [requested.unwrap_or_default(), composition_name]
        .into_iter()
        .map(|name| sanitize_stem(name.trim()))
        .find(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_STEM.to_string());
    format!("{stem}.html")
}

fn sanitize_stem(name: &str) -> String {
    let split = name
        .len()
        .checked_sub(".html".len())
        .and_then(|index| name.get(index..).map(|ext| (index, ext)));
    let stem = match split {
        Some((index, ext)) if ext.eq_ignore_ascii_case(".html") => &name[..index],
        _ => name,
    };
    stem.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Wrap a rendered fragment in a complete web page.
///
/// `css` is embedded in a `<style>` element when present.
#[must_use]
pub fn web_document(title: &str, css: Option<&str>, body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str("<title>");
    html.push_str(&html_escape::encode_text(title));
    html.push_str("</title>\n");
    if let Some(css) = css.filter(|css| !css.trim().is_empty()) {
        html.push_str("<style>\n");
        html.push_str(&css.replace("</style", "<\\/style"));
        html.push_str("\n</style>\n");
    }
    html.push_str("</head>\n<body>\n");
    html.push_str(body);
    html.push_str("\n</body>\n</html>\n");
    html
}

/// With CSS requested, the composition's own stylesheet must be resolved.
fn check_export_style(composition: &Composition, style: &StyleState) -> RenderResult<()> {
    let Some(id) = composition.stylesheet_id.as_ref() else {
        return Err(RenderError::ExportPreconditionViolated(
            "CSS requested but the composition has no stylesheet".to_string(),
        ));
    };
    match style {
        StyleState::None => Err(RenderError::StyleResolutionPending(id.to_string())),
        StyleState::Ready(sheet) if sheet.id() != id => {
            Err(RenderError::ExportPreconditionViolated(format!(
                "stylesheet {} does not belong to the composition (expected {id})",
                sheet.id()
            )))
        }
        StyleState::Pending(_) | StyleState::Ready(_) | StyleState::Failed { .. } => Ok(()),
    }
}

/// Renders and delivers compositions.
#[derive(Debug, Clone, Default)]
pub struct Exporter {
    policy: Arc<EmailCssPolicy>,
}

impl Exporter {
    /// Exporter using the given email CSS policy.
    #[must_use]
    pub fn new(policy: Arc<EmailCssPolicy>) -> Self {
        Self { policy }
    }

    /// Exporter with the default email CSS policy.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Email CSS policy in use.
    #[must_use]
    pub fn policy(&self) -> &EmailCssPolicy {
        &self.policy
    }

    /// Render the export HTML without delivering it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ExportPreconditionViolated`] when CSS is
    /// requested for a composition without a stylesheet or with a resolved
    /// sheet for another id, and a style resolution error when the
    /// stylesheet is not ready.
    pub fn build(
        &self,
        composition: &Composition,
        options: &ExportOptions,
        style: &StyleState,
    ) -> RenderResult<(String, Vec<BlockRenderFallback>)> {
        if options.include_css() {
            check_export_style(composition, style)?;
        }

        let render_options = RenderOptions {
            style: style.clone(),
            include_css: options.include_css(),
            email_platform: options.email_platform(),
            email_template: options.email_template(),
            email_policy: Arc::clone(&self.policy),
            frontmatter: composition.frontmatter.clone(),
            show_call_to_action: true,
            title: Some(composition.name.clone()).filter(|name| !name.trim().is_empty()),
        };

        match options.format() {
            ExportFormat::Web => {
                let output = render(composition.blocks(), RenderMode::Clean, &render_options)?;
                let body = output.to_html();
                if options.minimal_html() {
                    return Ok((body, output.fallbacks));
                }
                let css = render_options.active_stylesheet().map(|sheet| sheet.source());
                let title = render_options.title.as_deref().unwrap_or(FALLBACK_FILE_STEM);
                Ok((web_document(title, css, &body), output.fallbacks))
            }
            ExportFormat::Email => {
                let output = render(composition.blocks(), RenderMode::Email, &render_options)?;
                Ok((output.to_html(), output.fallbacks))
            }
        }
    }

    /// Render and deliver a composition.
    ///
    /// Nothing is delivered if rendering fails.
    ///
    /// # Errors
    ///
    /// Returns a precondition, style resolution or delivery error.
    pub fn export(
        &self,
        composition: &Composition,
        options: &ExportOptions,
        style: &StyleState,
        delivery: &mut dyn Delivery,
    ) -> RenderResult<ExportResult> {
        let (html, fallbacks) = self.build(composition, options, style)?;

        let (file_name, location) = match options.action() {
            DeliveryAction::Copy => {
                delivery.copy(&html)?;
                (None, None)
            }
            DeliveryAction::Download => {
                let name = export_file_name(options.file_name(), &composition.name);
                let location = delivery.download(&name, &html)?;
                (Some(name), Some(location))
            }
        };

        tracing::info!(
            composition = %composition.name,
            format = %options.format(),
            action = %options.action(),
            bytes = html.len(),
            placeholders = fallbacks.len(),
            "exported composition"
        );

        Ok(ExportResult {
            html,
            delivered_via: options.action(),
            file_name,
            location,
            fallbacks,
        })
    }
}

/// Export session state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExportState {
    /// Nothing configured yet.
    #[default]
    Idle,
    /// Options are being edited.
    Configuring,
    /// Rendering and delivering.
    Exporting,
    /// Export completed.
    Done(ExportResult),
    /// Export failed with a human-readable reason.
    Failed(String),
}

impl ExportState {
    /// State name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configuring => "configuring",
            Self::Exporting => "exporting",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether the session has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

/// One export of one composition.
pub struct ExportSession<'a> {
    composition: &'a Composition,
    exporter: &'a Exporter,
    options: ExportOptions,
    state: ExportState,
}

impl<'a> ExportSession<'a> {
    /// Start a session in [`ExportState::Idle`].
    #[must_use]
    pub fn new(composition: &'a Composition, exporter: &'a Exporter) -> Self {
        Self {
            composition,
            exporter,
            options: ExportOptions::default(),
            state: ExportState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ExportState {
        &self.state
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Whether CSS can be included at all.
    #[must_use]
    pub fn include_css_available(&self) -> bool {
        self.composition.stylesheet_id.is_some()
    }

    /// Set the export target.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_format(&mut self, format: ExportFormat) -> RenderResult<()> {
        self.configure("configure")?;
        self.options.set_format(format);
        Ok(())
    }

    /// Set the email platform.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_email_platform(&mut self, platform: EmailPlatform) -> RenderResult<()> {
        self.configure("configure")?;
        self.options.set_email_platform(platform);
        Ok(())
    }

    /// Set the email template.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_email_template(&mut self, template: EmailTemplate) -> RenderResult<()> {
        self.configure("configure")?;
        self.options.set_email_template(template);
        Ok(())
    }

    /// Set the delivery action.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_action(&mut self, action: DeliveryAction) -> RenderResult<()> {
        self.configure("configure")?;
        self.options.set_action(action);
        Ok(())
    }

    /// Toggle CSS.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ExportPreconditionViolated`] when enabling CSS
    /// on a composition without a stylesheet, or
    /// [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_include_css(&mut self, include_css: bool) -> RenderResult<()> {
        self.configure("configure")?;
        if include_css && !self.include_css_available() {
            return Err(RenderError::ExportPreconditionViolated(
                "CSS is unavailable: the composition has no stylesheet".to_string(),
            ));
        }
        self.options.set_include_css(include_css);
        Ok(())
    }

    /// Toggle minimal HTML.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_minimal_html(&mut self, minimal_html: bool) -> RenderResult<()> {
        self.configure("configure")?;
        self.options.set_minimal_html(minimal_html);
        Ok(())
    }

    /// Set the download file name.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTransition`] after the export finished.
    pub fn set_file_name(&mut self, file_name: Option<String>) -> RenderResult<()> {
        self.configure("configure")?;
        self.options.set_file_name(file_name);
        Ok(())
    }

    /// Run the export.
    ///
    /// # Errors
    ///
    /// Returns the export error after moving to [`ExportState::Failed`], or
    /// [`RenderError::InvalidTransition`] after the export finished.
    pub fn export(
        &mut self,
        style: &StyleState,
        delivery: &mut dyn Delivery,
    ) -> RenderResult<ExportResult> {
        self.configure("export")?;
        self.state = ExportState::Exporting;
        tracing::debug!(composition = %self.composition.name, "export started");

        match self
            .exporter
            .export(self.composition, &self.options, style, delivery)
        {
            Ok(result) => {
                self.state = ExportState::Done(result.clone());
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(composition = %self.composition.name, error = %e, "export failed");
                self.state = ExportState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Return to [`ExportState::Idle`], keeping the options.
    pub fn reset(&mut self) {
        self.state = ExportState::Idle;
    }

    fn configure(&mut self, action: &'static str) -> RenderResult<()> {
        match self.state {
            ExportState::Idle | ExportState::Configuring => {
                self.state = ExportState::Configuring;
                Ok(())
            }
            _ => Err(RenderError::InvalidTransition {
                state: self.state.name(),
                action,
            }),
        }
    }
}

impl fmt::Debug for ExportSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportSession")
            .field("composition", &self.composition.name)
            .field("options", &self.options)
            .field("state", &self.state.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose_core::{BlockKind, ContentBlock, Stylesheet, StylesheetId, TextBlock};

    fn composition(with_sheet: bool) -> Composition {
        let mut composition = Composition::from_blocks(
            "Spring Sale",
            vec![ContentBlock::new(BlockKind::Text(TextBlock::paragraph("Hello")))
                .with_class("lead")],
        );
        if with_sheet {
            composition = composition.with_stylesheet("brand");
        }
        composition
    }

    fn ready() -> StyleState {
        StyleState::ready(Stylesheet::new(
            StylesheetId::new("brand"),
            ".lead { color: red; }",
        ))
    }

    // ===== Options Tests =====

    #[test]
    fn test_minimal_html_forces_web_without_css() {
        let options = ExportOptions::new()
            .with_format(ExportFormat::Email)
            .with_include_css(true)
            .with_minimal_html(true);

        assert!(options.minimal_html());
        assert_eq!(options.format(), ExportFormat::Web);
        assert!(!options.include_css());
    }

    #[test]
    fn test_email_and_css_clear_minimal_html() {
        let options = ExportOptions::new()
            .with_minimal_html(true)
            .with_format(ExportFormat::Email);
        assert!(!options.minimal_html());

        let options = ExportOptions::new()
            .with_minimal_html(true)
            .with_include_css(true);
        assert!(!options.minimal_html());
        assert!(options.include_css());
    }

    #[test]
    fn test_blank_file_name_is_ignored() {
        let options = ExportOptions::new().with_file_name("  ");
        assert_eq!(options.file_name(), None);
    }

    #[test]
    fn test_parse_format_and_action() {
        assert_eq!("email".parse::<ExportFormat>(), Ok(ExportFormat::Email));
        assert_eq!("Download".parse::<DeliveryAction>(), Ok(DeliveryAction::Download));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    // ===== File Name Tests =====

    #[test]
    fn test_file_names() {
        assert_eq!(export_file_name(Some("promo"), "Sale"), "promo.html");
        assert_eq!(export_file_name(Some("promo.html"), "Sale"), "promo.html");
        assert_eq!(export_file_name(Some("Promo.HTML"), "Sale"), "Promo.html");
        assert_eq!(export_file_name(None, "Spring Sale"), "Spring Sale.html");
        assert_eq!(export_file_name(Some(""), ""), "composition.html");
        assert_eq!(export_file_name(None, "a/b"), "a-b.html");
    }

    // ===== Build Tests =====

    #[test]
    fn test_web_document_with_css() {
        let exporter = Exporter::with_defaults();
        let options = ExportOptions::new().with_include_css(true);

        let (html, _) = exporter
            .build(&composition(true), &options, &ready())
            .expect("should build");

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Spring Sale</title>"));
        assert!(html.contains("<style>\n.lead { color: red; }\n</style>"));
        assert!(html.contains("style=\"color: red\""));
    }

    #[test]
    fn test_minimal_html_is_bare_fragment() {
        let exporter = Exporter::with_defaults();
        let options = ExportOptions::new().with_minimal_html(true);

        let (html, _) = exporter
            .build(&composition(true), &options, &ready())
            .expect("should build");

        assert!(!html.contains("<!DOCTYPE"));
        assert!(!html.contains("<style"));
        assert!(!html.contains("color: red"));
        assert!(html.starts_with("<p"));
    }

    #[test]
    fn test_css_without_stylesheet_is_precondition_error() {
        let exporter = Exporter::with_defaults();
        let options = ExportOptions::new().with_include_css(true);

        match exporter.build(&composition(false), &options, &StyleState::None) {
            Err(RenderError::ExportPreconditionViolated(_)) => {}
            other => panic!("Expected ExportPreconditionViolated, got {other:?}"),
        }
    }

    #[test]
    fn test_css_requires_the_composition_stylesheet() {
        let exporter = Exporter::with_defaults();
        let options = ExportOptions::new().with_include_css(true);

        match exporter.build(&composition(true), &options, &StyleState::None) {
            Err(RenderError::StyleResolutionPending(id)) => assert_eq!(id, "brand"),
            other => panic!("Expected StyleResolutionPending, got {other:?}"),
        }

        let other_sheet = StyleState::ready(Stylesheet::new(
            StylesheetId::new("holiday"),
            ".lead { color: green; }",
        ));
        match exporter.build(&composition(true), &options, &other_sheet) {
            Err(RenderError::ExportPreconditionViolated(reason)) => {
                assert!(reason.contains("holiday"));
            }
            other => panic!("Expected ExportPreconditionViolated, got {other:?}"),
        }
    }

    #[test]
    fn test_css_escapes_closing_style_tag() {
        let html = web_document("t", Some("a::after { content: '</style>'; }"), "");
        assert!(!html.contains("'</style>'"));
    }

    // ===== Session Tests =====

    #[test]
    fn test_session_happy_path() {
        let composition = composition(true);
        let exporter = Exporter::with_defaults();
        let mut session = ExportSession::new(&composition, &exporter);
        let mut delivery = MemoryDelivery::new();

        assert_eq!(session.state(), &ExportState::Idle);
        session.set_action(DeliveryAction::Download).expect("configure");
        session.set_file_name(Some("out".into())).expect("configure");
        assert_eq!(session.state(), &ExportState::Configuring);

        let result = session.export(&ready(), &mut delivery).expect("should export");

        assert_eq!(result.file_name.as_deref(), Some("out.html"));
        assert_eq!(delivery.downloads.len(), 1);
        assert!(matches!(session.state(), ExportState::Done(_)));
    }

    #[test]
    fn test_session_rejects_css_without_stylesheet() {
        let composition = composition(false);
        let exporter = Exporter::with_defaults();
        let mut session = ExportSession::new(&composition, &exporter);

        assert!(!session.include_css_available());
        match session.set_include_css(true) {
            Err(RenderError::ExportPreconditionViolated(_)) => {}
            other => panic!("Expected ExportPreconditionViolated, got {other:?}"),
        }
        assert!(!session.options().include_css());
    }

    #[test]
    fn test_session_only_resets_after_done() {
        let composition = composition(false);
        let exporter = Exporter::with_defaults();
        let mut session = ExportSession::new(&composition, &exporter);
        let mut delivery = MemoryDelivery::new();

        session
            .export(&StyleState::None, &mut delivery)
            .expect("should export");

        match session.set_format(ExportFormat::Email) {
            Err(RenderError::InvalidTransition { state, .. }) => assert_eq!(state, "done"),
            other => panic!("Expected InvalidTransition, got {other:?}"),
        }
        assert!(session.export(&StyleState::None, &mut delivery).is_err());

        session.reset();
        assert_eq!(session.state(), &ExportState::Idle);
        assert!(session.set_format(ExportFormat::Email).is_ok());
    }

    #[test]
    fn test_delivery_failure_moves_to_failed() {
        let composition = composition(false);
        let exporter = Exporter::with_defaults();
        let mut session = ExportSession::new(&composition, &exporter);
        let mut delivery = MemoryDelivery::failing("clipboard locked");

        match session.export(&StyleState::None, &mut delivery) {
            Err(RenderError::DeliveryFailed(reason)) => assert_eq!(reason, "clipboard locked"),
            other => panic!("Expected DeliveryFailed, got {other:?}"),
        }
        assert_eq!(
            session.state(),
            &ExportState::Failed("Delivery failed: clipboard locked".to_string())
        );
        assert!(delivery.copied.is_empty());
    }

    #[test]
    fn test_pending_style_fails_without_delivery() {
        let composition = composition(true);
        let exporter = Exporter::with_defaults();
        let mut session = ExportSession::new(&composition, &exporter);
        let mut delivery = MemoryDelivery::new();
        session.set_include_css(true).expect("configure");

        let pending = StyleState::Pending(StylesheetId::new("brand"));
        assert!(session.export(&pending, &mut delivery).is_err());
        assert!(matches!(session.state(), ExportState::Failed(_)));
        assert!(delivery.copied.is_empty());
    }
}
