//! CLI Integration Tests
//!
//! Runs the render and export commands against files on disk.

use std::path::Path;

use compose_cli::{run_export, run_render, ExportArgs, RenderArgs, SourceArgs};
use compose_renderer::{
    DeliveryAction, EmailPlatform, EmailTemplate, ExportFormat, RenderMode,
};

const COMPOSITION: &str = r#"{
    "name": "Lot Alert",
    "stylesheetId": "brand",
    "blocks": [
        { "id": "t", "type": "text", "order": 1, "content": "Bidding opens", "cssClassName": "lead" },
        { "id": "fm", "type": "frontmatter", "order": 0, "data": { "title": "Lot Alert" } }
    ]
}"#;

/// Write the sample composition and the `brand` stylesheet into `dir`.
fn fixtures(dir: &Path) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("styles")).expect("styles dir");
    std::fs::write(dir.join("styles").join("brand.css"), ".lead { color: teal; }")
        .expect("stylesheet");
    let path = dir.join("lot.json");
    std::fs::write(&path, COMPOSITION).expect("composition");
    path
}

/// Source arguments pointing at the fixture stylesheet directory.
fn sources(dir: &Path) -> SourceArgs {
    SourceArgs {
        stylesheet_dir: Some(dir.join("styles")),
        ..SourceArgs::default()
    }
}

/// Render arguments for `mode`.
fn render_args(composition: &Path, mode: RenderMode) -> RenderArgs {
    RenderArgs {
        composition: composition.to_path_buf(),
        mode,
        platform: EmailPlatform::Generic,
        template: EmailTemplate::Styled,
        no_css: false,
    }
}

// ============================================================================
// Render
// ============================================================================

#[tokio::test]
async fn test_render_applies_directory_stylesheet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let composition = fixtures(dir.path());
    let mut out = Vec::new();

    run_render(&sources(dir.path()), &render_args(&composition, RenderMode::Clean), &mut out)
        .await
        .expect("should render");

    let html = String::from_utf8(out).expect("utf8");
    assert!(html.contains("style=\"color: teal\""));
    assert!(html.contains("Bidding opens"));
    assert!(!html.contains("data-block-id=\"fm\""));
}

#[tokio::test]
async fn test_render_fails_when_stylesheet_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let composition = fixtures(dir.path());
    let mut out = Vec::new();

    let result = run_render(
        &SourceArgs::default(),
        &render_args(&composition, RenderMode::Article),
        &mut out,
    )
    .await;

    assert!(result.is_err());
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_render_without_css_ignores_stylesheet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let composition = fixtures(dir.path());
    let mut args = render_args(&composition, RenderMode::Email);
    args.no_css = true;
    let mut out = Vec::new();

    run_render(&SourceArgs::default(), &args, &mut out)
        .await
        .expect("should render");

    let html = String::from_utf8(out).expect("utf8");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(!html.contains("teal"));
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_export_downloads_into_out_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let composition = fixtures(dir.path());
    let args = ExportArgs {
        composition,
        format: ExportFormat::Web,
        platform: EmailPlatform::Generic,
        template: EmailTemplate::Styled,
        action: DeliveryAction::Download,
        include_css: true,
        minimal_html: false,
        file_name: None,
        out_dir: dir.path().join("out"),
    };

    run_export(&sources(dir.path()), &args)
        .await
        .expect("should export");

    let html = std::fs::read_to_string(dir.path().join("out").join("Lot Alert.html"))
        .expect("export written");
    assert!(html.contains("<title>Lot Alert</title>"));
    assert!(html.contains(".lead { color: teal; }"));
}
