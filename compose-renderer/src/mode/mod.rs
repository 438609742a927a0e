//! Mode renderer implementations.

pub mod article;
pub(crate) mod blocks;
pub mod clean;

use compose_core::ContentBlock;

use crate::{RenderMode, RenderOptions, RenderOutput, RenderResult};

/// Trait for mode renderers.
pub trait ModeRenderer {
    /// Get the mode this renderer produces.
    fn mode(&self) -> RenderMode;

    /// Render a block snapshot.
    ///
    /// Blocks are sorted by rank and frontmatter is dropped from the content
    /// stream. Malformed blocks render as placeholders.
    ///
    /// # Errors
    ///
    /// Returns an error if the stylesheet is required but not resolved.
    fn render(&self, blocks: &[ContentBlock], options: &RenderOptions) -> RenderResult<RenderOutput>;
}
