//! # Compose Core
//!
//! Content model for block-based compositions: typed content blocks, ordered
//! compositions with optional frontmatter, and the stylesheet layer that
//! parses CSS into class and element rules.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                compose-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Block Model     │  Stylesheets             │
//! │  - ContentBlock  │  - CSS parsing           │
//! │  - Composition   │  - Class/element rules   │
//! │  - Frontmatter   │  - Sources + resolver    │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod composition;
pub mod error;
pub mod resolver;
pub mod source;
pub mod stylesheet;

pub use block::{
    Alignment, AspectRatio, BlockId, BlockKind, BlockMetadata, ButtonBlock, ColumnsBlock,
    ContentBlock, Dimension, DividerBlock, FrontmatterBlock, FrontmatterData, HtmlBlock,
    ImageBlock, ImageEmailSettings, ListBlock, RichFormatting, SpacerBlock, TextBlock,
    TextElement, VideoBlock, VideoPlatform, FRONTMATTER_SOURCE,
};
pub use composition::{content_blocks, find_frontmatter, sort_blocks, Composition};
pub use error::{ComposeError, ComposeResult, SourceError};
pub use resolver::{StyleState, StylesheetResolver};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use source::{DirectorySource, InMemorySource, StylesheetSource};
pub use stylesheet::{
    parse_css, ElementTag, ParsedStylesheet, StyleMap, Stylesheet, StylesheetId,
};

/// Compose core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
