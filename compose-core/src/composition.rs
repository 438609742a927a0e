//! Compositions: ordered block collections.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{BlockId, BlockKind, ComposeError, ComposeResult, ContentBlock, FrontmatterData, StylesheetId};

/// Stable sort of blocks by rank. Equal ranks keep their slice order.
#[must_use]
pub fn sort_blocks(blocks: &[ContentBlock]) -> Vec<&ContentBlock> {
    let mut sorted: Vec<&ContentBlock> = blocks.iter().collect();
    // `sort_by` is stable; total_cmp keeps NaN ranks deterministic.
    sorted.sort_by(|a, b| a.order.total_cmp(&b.order));
    sorted
}

/// Sorted blocks with every frontmatter block removed.
#[must_use]
pub fn content_blocks(blocks: &[ContentBlock]) -> Vec<&ContentBlock> {
    sort_blocks(blocks)
        .into_iter()
        .filter(|b| !b.is_frontmatter())
        .collect()
}

/// Data of the first frontmatter block in sorted order.
#[must_use]
pub fn find_frontmatter(blocks: &[ContentBlock]) -> Option<&FrontmatterData> {
    sort_blocks(blocks).into_iter().find_map(|b| match &b.kind {
        BlockKind::Frontmatter(fm) => Some(&fm.data),
        _ => None,
    })
}

/// An editable composition of content blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    /// Display name; also the default export file name.
    #[serde(default)]
    pub name: String,
    /// Blocks in insertion order (not rank order).
    #[serde(default)]
    blocks: Vec<ContentBlock>,
    /// Stylesheet applied to the composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet_id: Option<StylesheetId>,
    /// Frontmatter supplied by the composition store, outside the blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmatter: Option<FrontmatterData>,
}

impl Composition {
    /// Create an empty composition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a composition from an existing block list, keeping ranks as given.
    #[must_use]
    pub fn from_blocks(name: impl Into<String>, blocks: Vec<ContentBlock>) -> Self {
        Self {
            name: name.into(),
            blocks,
            ..Self::default()
        }
    }

    /// Set the stylesheet reference.
    #[must_use]
    pub fn with_stylesheet(mut self, id: impl Into<StylesheetId>) -> Self {
        self.stylesheet_id = Some(id.into());
        self
    }

    /// Set the externally supplied frontmatter.
    #[must_use]
    pub fn with_frontmatter(mut self, data: FrontmatterData) -> Self {
        self.frontmatter = Some(data);
        self
    }

    /// Blocks in insertion order.
    #[must_use]
    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Append a block after the current highest rank.
    ///
    /// # Errors
    ///
    /// Returns an error if a block with the same ID already exists.
    pub fn push_block(&mut self, mut block: ContentBlock) -> ComposeResult<BlockId> {
        self.ensure_unique(&block.id)?;
        block.order = self.next_order();
        let id = block.id.clone();
        self.blocks.push(block);
        Ok(id)
    }

    /// Insert a block directly after `anchor` in rank order.
    ///
    /// The new rank is the midpoint between the anchor and its successor, so
    /// no other block is renumbered.
    ///
    /// # Errors
    ///
    /// Returns an error if the anchor is missing or the new ID is taken.
    pub fn insert_after(&mut self, anchor: &BlockId, mut block: ContentBlock) -> ComposeResult<BlockId> {
        self.ensure_unique(&block.id)?;

        let sorted = sort_blocks(&self.blocks);
        let position = sorted
            .iter()
            .position(|b| &b.id == anchor)
            .ok_or_else(|| ComposeError::BlockNotFound(anchor.to_string()))?;
        let anchor_order = sorted[position].order;
        block.order = match sorted.get(position + 1) {
            Some(next) if next.order.total_cmp(&anchor_order) == Ordering::Greater => {
                anchor_order + (next.order - anchor_order) / 2.0
            }
            Some(_) => anchor_order,
            None => anchor_order + 1.0,
        };

        let id = block.id.clone();
        // Keep insertion order consistent with rank for equal-rank ties.
        let slot = self
            .blocks
            .iter()
            .position(|b| &b.id == anchor)
            .map_or(self.blocks.len(), |i| i + 1);
        self.blocks.insert(slot, block);
        Ok(id)
    }

    /// Remove a block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is not found.
    pub fn remove_block(&mut self, id: &BlockId) -> ComposeResult<ContentBlock> {
        let index = self
            .blocks
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| ComposeError::BlockNotFound(id.to_string()))?;
        Ok(self.blocks.remove(index))
    }

    /// Get a block by ID.
    #[must_use]
    pub fn get_block(&self, id: &BlockId) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    /// Blocks in rank order.
    #[must_use]
    pub fn sorted_blocks(&self) -> Vec<&ContentBlock> {
        sort_blocks(&self.blocks)
    }

    /// Renderable blocks in rank order.
    #[must_use]
    pub fn content_blocks(&self) -> Vec<&ContentBlock> {
        content_blocks(&self.blocks)
    }

    /// Effective metadata: the first frontmatter block, else the external one.
    #[must_use]
    pub fn frontmatter_data(&self) -> Option<&FrontmatterData> {
        find_frontmatter(&self.blocks).or(self.frontmatter.as_ref())
    }

    /// Get the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the composition has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize the composition to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> ComposeResult<String> {
        serde_json::to_string_pretty(self).map_err(ComposeError::Serialization)
    }

    /// Deserialize a composition from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> ComposeResult<Self> {
        serde_json::from_str(json).map_err(ComposeError::Serialization)
    }

    fn next_order(&self) -> f64 {
        self.blocks
            .iter()
            .map(|b| b.order)
            .filter(|o| o.is_finite())
            .fold(None, |max: Option<f64>, o| Some(max.map_or(o, |m| m.max(o))))
            .map_or(0.0, |max| max + 1.0)
    }

    fn ensure_unique(&self, id: &BlockId) -> ComposeResult<()> {
        if self.get_block(id).is_some() {
            return Err(ComposeError::DuplicateBlock(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrontmatterBlock, ImageBlock, TextBlock};

    fn text(id: &str, order: f64) -> ContentBlock {
        ContentBlock::new(BlockKind::Text(TextBlock::paragraph(id)))
            .with_id(id)
            .with_order(order)
    }

    fn ids(blocks: &[&ContentBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.id.to_string()).collect()
    }

    #[test]
    fn test_sort_is_stable_for_equal_ranks() {
        let blocks = vec![text("a", 1.0), text("b", 0.0), text("c", 1.0), text("d", 0.0)];
        assert_eq!(ids(&sort_blocks(&blocks)), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_content_blocks_drop_frontmatter() {
        let fm = ContentBlock::new(BlockKind::Frontmatter(FrontmatterBlock::default()))
            .with_id("fm")
            .with_order(0.0);
        let tagged = text("meta", 0.5).with_source("frontmatter");
        let blocks = vec![text("a", 1.0), fm, tagged];

        assert_eq!(ids(&content_blocks(&blocks)), vec!["a"]);
    }

    #[test]
    fn test_first_frontmatter_wins_by_rank() {
        let mut late = FrontmatterBlock::default();
        late.data.title = Some("Late".to_string());
        let mut early = FrontmatterBlock::default();
        early.data.title = Some("Early".to_string());

        let blocks = vec![
            ContentBlock::new(BlockKind::Frontmatter(late)).with_order(5.0),
            ContentBlock::new(BlockKind::Frontmatter(early)).with_order(1.0),
        ];

        let data = find_frontmatter(&blocks).expect("frontmatter");
        assert_eq!(data.title.as_deref(), Some("Early"));
    }

    #[test]
    fn test_block_frontmatter_preferred_over_external() {
        let mut external = FrontmatterData::default();
        external.title = Some("External".to_string());
        let mut composition = Composition::new("Story").with_frontmatter(external);

        assert_eq!(
            composition.frontmatter_data().and_then(|d| d.title.as_deref()),
            Some("External")
        );

        let mut block = FrontmatterBlock::default();
        block.data.title = Some("Block".to_string());
        composition
            .push_block(ContentBlock::new(BlockKind::Frontmatter(block)))
            .expect("push");

        assert_eq!(
            composition.frontmatter_data().and_then(|d| d.title.as_deref()),
            Some("Block")
        );
    }

    #[test]
    fn test_push_assigns_increasing_ranks() {
        let mut composition = Composition::new("c");
        composition.push_block(text("a", 42.0)).expect("push");
        composition.push_block(text("b", -3.0)).expect("push");

        assert_eq!(ids(&composition.sorted_blocks()), vec!["a", "b"]);
        assert!(composition.get_block(&"b".into()).expect("b").order > 0.0);
    }

    #[test]
    fn test_insert_after_uses_midpoint() {
        let mut composition = Composition::new("c");
        composition.push_block(text("a", 0.0)).expect("push");
        composition.push_block(text("c", 0.0)).expect("push");
        composition
            .insert_after(&"a".into(), text("b", 0.0))
            .expect("insert");

        assert_eq!(ids(&composition.sorted_blocks()), vec!["a", "b", "c"]);
        let b = composition.get_block(&"b".into()).expect("b");
        assert!((b.order - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_insert_after_last_block() {
        let mut composition = Composition::new("c");
        composition.push_block(text("a", 0.0)).expect("push");
        composition
            .insert_after(&"a".into(), text("z", 0.0))
            .expect("insert");
        assert_eq!(ids(&composition.sorted_blocks()), vec!["a", "z"]);
    }

    #[test]
    fn test_insert_after_missing_anchor() {
        let mut composition = Composition::new("c");
        let result = composition.insert_after(&"nope".into(), text("a", 0.0));
        assert!(matches!(result, Err(ComposeError::BlockNotFound(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut composition = Composition::new("c");
        composition.push_block(text("a", 0.0)).expect("push");
        let result = composition.push_block(text("a", 0.0));
        assert!(matches!(result, Err(ComposeError::DuplicateBlock(_))));
    }

    #[test]
    fn test_remove_block() {
        let mut composition = Composition::new("c");
        composition.push_block(text("a", 0.0)).expect("push");
        composition.remove_block(&"a".into()).expect("remove");
        assert!(composition.is_empty());
        assert!(composition.remove_block(&"a".into()).is_err());
    }

    #[test]
    fn test_json_roundtrip_keeps_stylesheet_and_blocks() {
        let mut composition = Composition::new("Launch").with_stylesheet("brand");
        composition
            .push_block(ContentBlock::new(BlockKind::Image(ImageBlock::new("https://x/a.png"))))
            .expect("push");

        let json = composition.to_json().expect("serialize");
        let parsed = Composition::from_json(&json).expect("deserialize");
        assert_eq!(parsed, composition);
        assert_eq!(parsed.stylesheet_id.as_ref().map(StylesheetId::as_str), Some("brand"));
    }

    #[test]
    fn test_from_json_editor_shape() {
        let json = r#"{
            "name": "Spring Newsletter",
            "stylesheetId": "brand-2024",
            "blocks": [
                { "id": "2", "order": 2, "type": "text", "content": "Second" },
                { "id": "1", "order": 1, "type": "text", "content": "First", "element": "h1" }
            ]
        }"#;
        let composition = Composition::from_json(json).expect("parse");
        assert_eq!(composition.block_count(), 2);
        assert_eq!(ids(&composition.content_blocks()), vec!["1", "2"]);
    }
}
