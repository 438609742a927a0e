//! Integration tests for rendering (compose-renderer).
//!
//! Covers every mode against stored compositions: frontmatter handling,
//! header partitioning, style precedence, rich text in both email paths,
//! placeholders and output stability.

use compose_core::{
    BlockKind, Composition, ContentBlock, ImageBlock, StyleState, Stylesheet, StylesheetId,
    TextBlock,
};
use compose_renderer::{
    partition_header, render, EmailPlatform, EmailTemplate, FallbackReason, RenderError,
    RenderMode, RenderOptions,
};
use proptest::prelude::*;

const RICH_TEXT: &str = "**hi** [go](http://x)\nend";
const RICH_HTML: &str = "<strong>hi</strong> <a href=\"http://x\">go</a><br>end";

/// A stored newsletter with a frontmatter block and two header images.
fn newsletter() -> Composition {
    let json = r##"{
        "name": "Weekly Lots",
        "stylesheetId": "brand",
        "blocks": [
            { "id": "fm", "type": "frontmatter", "order": 0,
              "data": { "title": "Weekly Lots", "author": "Dana", "date": "2026-05-01" } },
            { "id": "hero", "type": "image", "order": 1, "imageUrl": "https://x/hero.jpg",
              "email": { "isFullWidth": true, "backgroundColor": "#000000" } },
            { "id": "band", "type": "image", "order": 2, "imageUrl": "https://x/band.jpg",
              "email": { "isFullWidth": true } },
            { "id": "intro", "type": "text", "order": 3, "content": "Welcome back", "cssClassName": "lead" },
            { "id": "late", "type": "image", "order": 4, "imageUrl": "https://x/late.jpg",
              "email": { "isFullWidth": true } }
        ]
    }"##;
    Composition::from_json(json).expect("should parse")
}

/// Stylesheet state for the `brand` sheet.
fn brand(css: &str) -> StyleState {
    StyleState::ready(Stylesheet::new(StylesheetId::new("brand"), css))
}

/// Render a composition and return the HTML.
fn html(composition: &Composition, mode: RenderMode, options: &RenderOptions) -> String {
    render(composition.blocks(), mode, options)
        .expect("should render")
        .to_html()
}

// ==========================================================================
// Frontmatter
// ==========================================================================

#[test]
fn test_frontmatter_never_rendered_as_content() {
    let composition = newsletter();
    let options = RenderOptions::default();

    let clean = html(&composition, RenderMode::Clean, &options);
    assert!(!clean.contains("Dana"));
    assert!(!clean.contains("data-block-id=\"fm\""));

    let article = html(&composition, RenderMode::Article, &options);
    assert!(article.contains("<h1 class=\"article-title\">Weekly Lots</h1>"));
    assert!(article.contains("By Dana"));
    assert!(article.contains("2026-05-01"));
}

// ==========================================================================
// Email header partition
// ==========================================================================

#[test]
fn test_header_partition_of_stored_composition() {
    let composition = newsletter();
    let content = composition.content_blocks();

    let (header, body) = partition_header(&content);

    let header_ids: Vec<&str> = header.iter().map(|b| b.id.as_str()).collect();
    let body_ids: Vec<&str> = body.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(header_ids, vec!["hero", "band"]);
    assert_eq!(body_ids, vec!["intro", "late"]);
}

#[test]
fn test_styled_email_places_late_image_in_body() {
    let composition = newsletter();
    let options = RenderOptions::default().with_style(brand(".lead { color: #333333; }"));

    let document = html(&composition, RenderMode::Email, &options);

    let container = document
        .find("class=\"email-container\"")
        .expect("body container");
    assert!(document.find("https://x/band.jpg").expect("band") < container);
    assert!(document.find("https://x/late.jpg").expect("late") > container);
    assert_eq!(document.matches("class=\"email-header-image\"").count(), 2);
}

// ==========================================================================
// Style precedence
// ==========================================================================

#[test]
fn test_class_beats_element_default() {
    let composition = newsletter();
    let options =
        RenderOptions::default().with_style(brand("p { color: blue; } .lead { color: red; }"));

    let output = html(&composition, RenderMode::Clean, &options);

    assert!(output.contains("style=\"color: red\""));
    assert!(!output.contains("color: blue"));
}

#[test]
fn test_sendgrid_policy_filters_class_styles() {
    let composition = newsletter();
    let options = RenderOptions::default()
        .with_style(brand(".lead { color: red; display: flex; font-size: 1.2rem; }"))
        .with_email_platform(EmailPlatform::Sendgrid);

    let document = html(&composition, RenderMode::Email, &options);

    assert!(document.contains("color: red"));
    assert!(!document.contains("display: flex"));
    assert!(!document.contains("1.2rem"));
}

#[test]
fn test_pending_stylesheet_is_precondition() {
    let composition = newsletter();
    let options =
        RenderOptions::default().with_style(StyleState::Pending(StylesheetId::new("brand")));

    for mode in [RenderMode::Clean, RenderMode::Article, RenderMode::Email] {
        match render(composition.blocks(), mode, &options) {
            Err(RenderError::StyleResolutionPending(id)) => assert_eq!(id, "brand"),
            other => panic!("Expected StyleResolutionPending, got {other:?}"),
        }
    }
}

// ==========================================================================
// Rich text
// ==========================================================================

#[test]
fn test_rich_text_in_both_email_paths() {
    let blocks = vec![ContentBlock::new(BlockKind::Text(TextBlock::paragraph(RICH_TEXT)))];

    for template in [EmailTemplate::Styled, EmailTemplate::Templated] {
        let options = RenderOptions::default().with_email_template(template);
        let document = render(&blocks, RenderMode::Email, &options)
            .expect("should render")
            .to_html();
        assert!(document.contains(RICH_HTML), "{template} lost rich text");
    }
}

#[test]
fn test_email_document_contract() {
    let composition = newsletter();

    for template in [EmailTemplate::Styled, EmailTemplate::Templated] {
        let options = RenderOptions::default().with_email_template(template);
        let document = html(&composition, RenderMode::Email, &options);

        assert!(document.starts_with("<!DOCTYPE html>"));
        assert!(document.contains("<meta name=\"viewport\""));
        assert!(document.contains("prefers-color-scheme: dark"));
        assert!(document.contains("max-width: 600px"));
        assert!(!document.contains("<iframe"));
    }
}

// ==========================================================================
// Placeholders
// ==========================================================================

#[test]
fn test_empty_image_url_is_placeholder_in_every_mode() {
    let blocks = vec![ContentBlock::new(BlockKind::Image(ImageBlock::new(""))).with_id("img")];

    for mode in [RenderMode::Clean, RenderMode::Article, RenderMode::Email] {
        let output = render(&blocks, mode, &RenderOptions::default()).expect("never fails");
        let markup = output.to_html();

        assert!(markup.contains("data-placeholder=\"image\""));
        assert!(!markup.contains("<img src=\"\""));
        assert_eq!(output.fallbacks.len(), 1);
        assert_eq!(output.fallbacks[0].reason, FallbackReason::MissingImageUrl);
    }
}

#[test]
fn test_unknown_block_type_is_placeholder() {
    let composition = Composition::from_json(
        r#"{ "name": "c", "blocks": [ { "id": "x", "type": "carousel", "order": 0 } ] }"#,
    )
    .expect("should parse");

    let output = render(composition.blocks(), RenderMode::Clean, &RenderOptions::default())
        .expect("never fails");

    assert!(output.to_html().contains("data-placeholder=\"unknown\""));
    assert_eq!(output.fallbacks[0].reason, FallbackReason::UnknownBlockType);
}

// ==========================================================================
// Columns
// ==========================================================================

/// Render a JSON block list in Clean mode.
fn render_json(blocks: &str) -> compose_renderer::RenderOutput {
    let json = format!(r#"{{ "name": "c", "blocks": {blocks} }}"#);
    let composition = Composition::from_json(&json).expect("should parse");
    render(composition.blocks(), RenderMode::Clean, &RenderOptions::default())
        .expect("never fails")
}

#[test]
fn test_mutually_nested_columns_render_placeholder() {
    let output = render_json(
        r#"[
            { "id": "c1", "type": "columns", "order": 0, "columnCount": 1, "columns": [["c2"]] },
            { "id": "c2", "type": "columns", "order": 1, "columnCount": 1, "columns": [["c1"]] }
        ]"#,
    );
    let html = output.to_html();

    assert!(html.contains("columns-block"));
    assert!(html.contains("data-placeholder=\"columns\""));
    assert_eq!(output.fallbacks.len(), 1);
    assert_eq!(output.fallbacks[0].block_id.as_str(), "c1");
    assert_eq!(output.fallbacks[0].reason, FallbackReason::ColumnNestingTooDeep);
}

#[test]
fn test_self_referencing_columns_render_placeholder() {
    let output = render_json(
        r#"[ { "id": "self", "type": "columns", "order": 0, "columnCount": 1, "columns": [["self"]] } ]"#,
    );

    assert!(output.to_html().contains("columns-block"));
    assert_eq!(output.fallbacks.len(), 1);
    assert_eq!(output.fallbacks[0].reason, FallbackReason::ColumnNestingTooDeep);
}

#[test]
fn test_cell_children_render_once() {
    let output = render_json(
        r#"[
            { "id": "row", "type": "columns", "order": 0, "columnCount": 2, "columns": [["a"], ["b"]] },
            { "id": "a", "type": "text", "order": 1, "content": "Left" },
            { "id": "b", "type": "text", "order": 2, "content": "Right" }
        ]"#,
    );
    let html = output.to_html();

    assert_eq!(html.matches("Left").count(), 1);
    assert_eq!(html.matches("Right").count(), 1);
    assert!(output.fallbacks.is_empty());
}

#[test]
fn test_oversized_column_count_is_placeholder() {
    let output = render_json(
        r#"[ { "id": "wide", "type": "columns", "order": 0, "columnCount": 100000000000, "columns": [] } ]"#,
    );

    assert!(output.to_html().contains("data-placeholder=\"columns\""));
    assert_eq!(
        output.fallbacks[0].reason,
        FallbackReason::TooManyColumns(100_000_000_000)
    );
}

// ==========================================================================
// Stability properties
// ==========================================================================

fn arb_blocks() -> impl Strategy<Value = Vec<ContentBlock>> {
    prop::collection::vec((0u8..4, "[a-z ]{1,12}"), 1..12).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (rank, text))| {
                ContentBlock::new(BlockKind::Text(TextBlock::paragraph(format!("{text}#{i}"))))
                    .with_id(format!("b{i}").as_str())
                    .with_order(f64::from(rank))
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_render_is_idempotent(blocks in arb_blocks()) {
        let options = RenderOptions::default().with_style(brand("p { margin: 0; }"));
        for mode in [RenderMode::Clean, RenderMode::Article, RenderMode::Email] {
            let first = render(&blocks, mode, &options).expect("should render").to_html();
            let second = render(&blocks, mode, &options).expect("should render").to_html();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn prop_equal_ranks_keep_list_order(blocks in arb_blocks()) {
        let output = render(&blocks, RenderMode::Clean, &RenderOptions::default())
            .expect("should render")
            .to_html();

        let mut expected: Vec<&ContentBlock> = blocks.iter().collect();
        expected.sort_by(|a, b| a.order.total_cmp(&b.order));

        let mut last = 0;
        for block in expected {
            let marker = format!("#{}<", block.id.as_str().trim_start_matches('b'));
            let position = output.find(&marker).expect("block rendered");
            prop_assert!(position >= last);
            last = position;
        }
    }
}
