//! Renderer error types.

use compose_core::BlockId;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur during rendering or export.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The composition's stylesheet has been requested but not resolved yet.
    #[error("Stylesheet {0} is still resolving")]
    StyleResolutionPending(String),

    /// The composition's stylesheet could not be resolved.
    #[error("Stylesheet {id} failed to resolve: {reason}")]
    StyleResolutionFailed {
        /// Stylesheet identifier.
        id: String,
        /// Human-readable cause.
        reason: String,
    },

    /// An export option was requested that the composition cannot satisfy.
    #[error("Export precondition violated: {0}")]
    ExportPreconditionViolated(String),

    /// The clipboard or download primitive failed.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// An export session received an action its current state does not accept.
    #[error("Cannot {action} while export is {state}")]
    InvalidTransition {
        /// Current state name.
        state: &'static str,
        /// Rejected action.
        action: &'static str,
    },

    /// The email CSS policy table could not be loaded.
    #[error("Invalid email CSS policy: {0}")]
    Policy(String),
}

impl RenderError {
    /// Whether the error must be surfaced to the user.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::ExportPreconditionViolated(_) | Self::DeliveryFailed(_)
        )
    }
}

/// Why a block was rendered as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackReason {
    /// The block has no renderable content.
    #[error("empty content")]
    EmptyContent,

    /// Image block without a URL.
    #[error("missing image URL")]
    MissingImageUrl,

    /// Video block without url, embed id or platform.
    #[error("incomplete video reference")]
    IncompleteVideo,

    /// Video hosted on a platform with no embed rule.
    #[error("unsupported video platform: {0}")]
    UnsupportedVideoPlatform(String),

    /// Block `type` not known to this renderer.
    #[error("unknown block type")]
    UnknownBlockType,

    /// A column references a block that does not exist.
    #[error("missing column block: {0}")]
    MissingColumnBlock(String),

    /// A column references one of its own ancestors, or nests too deeply.
    #[error("column nesting too deep")]
    ColumnNestingTooDeep,

    /// Columns block asking for more columns than a row can hold.
    #[error("too many columns: {0}")]
    TooManyColumns(usize),
}

/// Diagnostic recorded for every placeholder in a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRenderFallback {
    /// Block that was replaced.
    pub block_id: BlockId,
    /// Block type name.
    pub block_type: &'static str,
    /// Why it was replaced.
    pub reason: FallbackReason,
}
