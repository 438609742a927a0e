//! # Compose CLI
//!
//! Renders and exports stored compositions from the command line.
//!
//! ```text
//! composition.json ──► StylesheetResolver ──► render / export ──► stdout | clipboard | file
//!                          │
//!                          ├─ --stylesheet-dir  (COMPOSE_STYLESHEET_DIR)
//!                          └─ --stylesheet-url  (COMPOSE_STYLESHEET_URL)
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use compose_core::{
    Composition, DirectorySource, InMemorySource, StyleState, StylesheetResolver,
};
use compose_renderer::{
    render, DeliveryAction, EmailCssPolicy, EmailPlatform, EmailTemplate, ExportFormat,
    ExportSession, Exporter, RenderMode, RenderOptions, SystemDelivery,
};

/// Command-line arguments for compose.
#[derive(Debug, Clone, Parser)]
#[command(name = "compose")]
#[command(about = "Render and export block compositions as web, article or email HTML")]
#[command(version)]
pub struct CliArgs {
    /// Stylesheet lookup and email policy.
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Where stylesheets and the email CSS policy come from.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    /// Directory holding `{id}.css` stylesheets
    #[arg(long, global = true, env = "COMPOSE_STYLESHEET_DIR")]
    pub stylesheet_dir: Option<PathBuf>,

    /// Base URL of the stylesheet service (e.g., <https://styles.example.com/sheets>)
    #[arg(long, global = true, env = "COMPOSE_STYLESHEET_URL", conflicts_with = "stylesheet_dir")]
    pub stylesheet_url: Option<String>,

    /// JSON file overriding the email CSS policy table
    #[arg(long, global = true, env = "COMPOSE_EMAIL_POLICY")]
    pub email_policy: Option<PathBuf>,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Render a composition and print the HTML to stdout
    Render(RenderArgs),
    /// Export a composition to the clipboard or a file
    Export(ExportArgs),
}

/// Arguments of `compose render`.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Composition JSON file
    pub composition: PathBuf,

    /// Output layout: clean, article or email
    #[arg(long, default_value = "clean")]
    pub mode: RenderMode,

    /// Email platform: mailchimp, sendgrid or generic
    #[arg(long, default_value = "generic")]
    pub platform: EmailPlatform,

    /// Email template: styled or templated
    #[arg(long, default_value = "styled")]
    pub template: EmailTemplate,

    /// Skip the stylesheet entirely
    #[arg(long)]
    pub no_css: bool,
}

/// Arguments of `compose export`.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Composition JSON file
    pub composition: PathBuf,

    /// Export target: web or email
    #[arg(long, default_value = "web")]
    pub format: ExportFormat,

    /// Email platform: mailchimp, sendgrid or generic
    #[arg(long, default_value = "generic")]
    pub platform: EmailPlatform,

    /// Email template: styled or templated
    #[arg(long, default_value = "styled")]
    pub template: EmailTemplate,

    /// Delivery: copy or download
    #[arg(long, default_value = "download")]
    pub action: DeliveryAction,

    /// Compile and embed the composition's stylesheet
    #[arg(long)]
    pub include_css: bool,

    /// Emit the bare web fragment
    #[arg(long)]
    pub minimal_html: bool,

    /// Download file name (defaults to the composition name)
    #[arg(long)]
    pub file_name: Option<String>,

    /// Download directory
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

/// Read and decode a composition file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a composition.
pub fn load_composition(path: &Path) -> anyhow::Result<Composition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Composition::from_json(&json).with_context(|| format!("Invalid composition in {}", path.display()))
}

/// Load the email CSS policy, or the default table.
///
/// # Errors
///
/// Returns an error if the policy file cannot be read or parsed.
pub fn load_policy(path: Option<&Path>) -> anyhow::Result<Arc<EmailCssPolicy>> {
    match path {
        Some(path) => {
            let policy = EmailCssPolicy::load(path)
                .with_context(|| format!("Failed to load email policy {}", path.display()))?;
            tracing::info!(path = %path.display(), "loaded email CSS policy");
            Ok(Arc::new(policy))
        }
        None => Ok(Arc::new(EmailCssPolicy::default())),
    }
}

/// Build the stylesheet resolver for the configured source.
///
/// Without a source every referenced stylesheet fails to resolve.
///
/// # Errors
///
/// Returns an error if the stylesheet URL is invalid, or if a URL is given
/// in a build without HTTP support.
pub fn build_resolver(sources: &SourceArgs) -> anyhow::Result<StylesheetResolver> {
    if let Some(url) = &sources.stylesheet_url {
        return http_resolver(url);
    }
    if let Some(dir) = &sources.stylesheet_dir {
        tracing::debug!(dir = %dir.display(), "using stylesheet directory");
        return Ok(StylesheetResolver::new(DirectorySource::new(dir)));
    }
    Ok(StylesheetResolver::new(InMemorySource::new()))
}

#[cfg(feature = "http")]
fn http_resolver(url: &str) -> anyhow::Result<StylesheetResolver> {
    let source = compose_core::HttpSource::new(url)
        .with_context(|| format!("Invalid stylesheet URL {url}"))?;
    tracing::debug!(url, "using stylesheet service");
    Ok(StylesheetResolver::new(source))
}

#[cfg(not(feature = "http"))]
fn http_resolver(url: &str) -> anyhow::Result<StylesheetResolver> {
    anyhow::bail!("Stylesheet URL {url} given but HTTP support is not enabled")
}

/// Resolve the composition's stylesheet, unless styling is off.
pub async fn resolve_style(
    resolver: &StylesheetResolver,
    composition: &Composition,
    include_css: bool,
) -> StyleState {
    if !include_css {
        return StyleState::None;
    }
    resolver.resolve(composition.stylesheet_id.as_ref()).await
}

/// Run `compose render`, writing HTML to `out`.
///
/// # Errors
///
/// Returns an error if loading, stylesheet resolution or rendering fails.
pub async fn run_render(
    sources: &SourceArgs,
    args: &RenderArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let composition = load_composition(&args.composition)?;
    let resolver = build_resolver(sources)?;
    let style = resolve_style(&resolver, &composition, !args.no_css).await;

    let options = RenderOptions {
        style,
        include_css: !args.no_css,
        email_platform: args.platform,
        email_template: args.template,
        email_policy: load_policy(sources.email_policy.as_deref())?,
        frontmatter: composition.frontmatter.clone(),
        show_call_to_action: true,
        title: Some(composition.name.clone()),
    };

    let output = render(composition.blocks(), args.mode, &options)
        .with_context(|| format!("Failed to render {}", composition.name))?;
    for fallback in &output.fallbacks {
        tracing::warn!(
            block_id = %fallback.block_id,
            block_type = fallback.block_type,
            reason = %fallback.reason,
            "block rendered as placeholder"
        );
    }

    writeln!(out, "{}", output.to_html())?;
    Ok(())
}

/// Run `compose export`.
///
/// # Errors
///
/// Returns an error if loading fails, an option cannot be applied, or the
/// export fails.
pub async fn run_export(sources: &SourceArgs, args: &ExportArgs) -> anyhow::Result<()> {
    let composition = load_composition(&args.composition)?;
    let resolver = build_resolver(sources)?;
    let exporter = Exporter::new(load_policy(sources.email_policy.as_deref())?);

    let mut session = ExportSession::new(&composition, &exporter);
    session.set_format(args.format)?;
    session.set_email_platform(args.platform)?;
    session.set_email_template(args.template)?;
    session.set_action(args.action)?;
    session.set_file_name(args.file_name.clone())?;
    if args.include_css {
        session.set_include_css(true)?;
    }
    if args.minimal_html {
        session.set_minimal_html(true)?;
    }

    let include_css = session.options().include_css();
    let style = resolve_style(&resolver, &composition, include_css).await;

    let mut delivery = SystemDelivery::new(&args.out_dir);
    let result = session
        .export(&style, &mut delivery)
        .with_context(|| format!("Failed to export {}", composition.name))?;

    match &result.location {
        Some(path) => tracing::info!(path = %path.display(), "export saved"),
        None => tracing::info!(bytes = result.html.len(), "export copied to clipboard"),
    }
    Ok(())
}

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns the failing subcommand's error.
pub async fn run(args: &CliArgs) -> anyhow::Result<()> {
    match &args.command {
        Command::Render(render_args) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            run_render(&args.sources, render_args, &mut out).await
        }
        Command::Export(export_args) => run_export(&args.sources, export_args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render_defaults() {
        let args = CliArgs::try_parse_from(["compose", "render", "c.json"]).expect("should parse");
        match args.command {
            Command::Render(render) => {
                assert_eq!(render.mode, RenderMode::Clean);
                assert_eq!(render.platform, EmailPlatform::Generic);
                assert_eq!(render.template, EmailTemplate::Styled);
                assert!(!render.no_css);
            }
            other => panic!("Expected Render, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_export_options() {
        let args = CliArgs::try_parse_from([
            "compose",
            "export",
            "c.json",
            "--format",
            "email",
            "--platform",
            "sendgrid",
            "--action",
            "copy",
            "--include-css",
            "--stylesheet-dir",
            "styles",
        ])
        .expect("should parse");

        assert_eq!(args.sources.stylesheet_dir, Some(PathBuf::from("styles")));
        match args.command {
            Command::Export(export) => {
                assert_eq!(export.format, ExportFormat::Email);
                assert_eq!(export.platform, EmailPlatform::Sendgrid);
                assert_eq!(export.action, DeliveryAction::Copy);
                assert!(export.include_css);
            }
            other => panic!("Expected Export, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(CliArgs::try_parse_from(["compose", "render", "c.json", "--mode", "pdf"]).is_err());
    }

    #[test]
    fn test_rejects_both_stylesheet_sources() {
        let parsed = CliArgs::try_parse_from([
            "compose",
            "render",
            "c.json",
            "--stylesheet-dir",
            "a",
            "--stylesheet-url",
            "http://b",
        ]);
        assert!(parsed.is_err());
    }
}
