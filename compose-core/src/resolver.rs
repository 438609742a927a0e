//! Memoized stylesheet resolution.
//!
//! Each stylesheet identifier is fetched at most once; concurrent requests for
//! the same identifier share the fetch. Results, including failures, stay
//! cached until explicitly invalidated. Renderers consume the outcome as a
//! [`StyleState`], which keeps "not yet resolved", "resolved" and "failed"
//! apart so nothing renders against partial style data.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;

use crate::source::StylesheetSource;
use crate::{Stylesheet, StylesheetId};

type Resolution = Result<Arc<Stylesheet>, String>;
type Slot = Arc<OnceCell<Resolution>>;

/// Resolution state of a composition's stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleState {
    /// The composition references no stylesheet.
    None,
    /// Resolution has not completed yet.
    Pending(StylesheetId),
    /// Resolved; possibly to an empty stylesheet.
    Ready(Arc<Stylesheet>),
    /// Resolution failed.
    Failed {
        /// Stylesheet identifier.
        id: StylesheetId,
        /// Human-readable cause.
        reason: String,
    },
}

impl StyleState {
    /// State for an already available stylesheet.
    #[must_use]
    pub fn ready(stylesheet: Stylesheet) -> Self {
        Self::Ready(Arc::new(stylesheet))
    }

    /// The resolved stylesheet, if any.
    #[must_use]
    pub fn stylesheet(&self) -> Option<&Stylesheet> {
        match self {
            Self::Ready(sheet) => Some(sheet),
            _ => None,
        }
    }

    /// Whether rendering may proceed (no stylesheet, or fully resolved).
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::None | Self::Ready(_))
    }
}

/// Stylesheet resolver with a per-identifier fetch cache.
#[derive(Clone)]
pub struct StylesheetResolver {
    source: Arc<dyn StylesheetSource>,
    slots: Arc<RwLock<HashMap<StylesheetId, Slot>>>,
}

impl std::fmt::Debug for StylesheetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StylesheetResolver")
            .field("cached", &self.cached_count())
            .finish_non_exhaustive()
    }
}

impl StylesheetResolver {
    /// Create a resolver over `source`.
    #[must_use]
    pub fn new(source: impl StylesheetSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current state without waiting.
    ///
    /// An identifier that was never requested, or whose fetch is still in
    /// flight, reports [`StyleState::Pending`].
    #[must_use]
    pub fn peek(&self, id: Option<&StylesheetId>) -> StyleState {
        let Some(id) = id else {
            return StyleState::None;
        };
        let slots = self
            .slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match slots.get(id).and_then(|slot| slot.get()) {
            Some(resolution) => Self::state_for(id, resolution),
            None => StyleState::Pending(id.clone()),
        }
    }

    /// Resolve a stylesheet, fetching it on first request.
    pub async fn resolve(&self, id: Option<&StylesheetId>) -> StyleState {
        let Some(id) = id else {
            return StyleState::None;
        };
        let slot = self.slot(id);
        let resolution = slot
            .get_or_init(|| async {
                match self.source.fetch(id).await {
                    Ok(css) => {
                        let sheet = Stylesheet::new(id.clone(), css);
                        tracing::debug!(
                            stylesheet = %id,
                            classes = sheet.parsed().class_count(),
                            "stylesheet resolved"
                        );
                        Ok(Arc::new(sheet))
                    }
                    Err(e) => {
                        tracing::warn!(stylesheet = %id, error = %e, "stylesheet resolution failed");
                        Err(e.to_string())
                    }
                }
            })
            .await;
        Self::state_for(id, resolution)
    }

    /// Replace the raw source of a stylesheet, recomputing its parse.
    ///
    /// Subsequent [`peek`](Self::peek) and [`resolve`](Self::resolve) calls
    /// return the new parse without fetching.
    pub fn set_source(&self, id: impl Into<StylesheetId>, css: impl Into<String>) {
        let id = id.into();
        let sheet = Arc::new(Stylesheet::new(id.clone(), css));
        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots.insert(id, Arc::new(OnceCell::new_with(Some(Ok(sheet)))));
    }

    /// Drop the cached result so the next resolve fetches again.
    ///
    /// Returns whether anything was cached.
    pub fn invalidate(&self, id: &StylesheetId) -> bool {
        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots.remove(id).is_some()
    }

    /// Number of identifiers with a cache slot.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        let slots = self
            .slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots.len()
    }

    fn slot(&self, id: &StylesheetId) -> Slot {
        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn state_for(id: &StylesheetId, resolution: &Resolution) -> StyleState {
        match resolution {
            Ok(sheet) => StyleState::Ready(Arc::clone(sheet)),
            Err(reason) => StyleState::Failed {
                id: id.clone(),
                reason: reason.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use crate::SourceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts fetches and fails for ids starting with "bad".
    #[derive(Default)]
    struct CountingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl StylesheetSource for CountingSource {
        async fn fetch(&self, id: &StylesheetId) -> Result<String, SourceError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if id.as_str().starts_with("bad") {
                Err(SourceError::NotFound(id.to_string()))
            } else {
                Ok(".a { color: red }".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_no_id_is_none() {
        let resolver = StylesheetResolver::new(InMemorySource::new());
        assert_eq!(resolver.peek(None), StyleState::None);
        assert_eq!(resolver.resolve(None).await, StyleState::None);
        assert!(StyleState::None.is_settled());
    }

    #[tokio::test]
    async fn test_pending_before_resolve() {
        let resolver = StylesheetResolver::new(InMemorySource::new().with("brand", ""));
        let id = StylesheetId::from("brand");
        assert_eq!(resolver.peek(Some(&id)), StyleState::Pending(id.clone()));
        assert!(!resolver.peek(Some(&id)).is_settled());
    }

    #[tokio::test]
    async fn test_resolved_to_empty_is_ready() {
        let resolver = StylesheetResolver::new(InMemorySource::new().with("empty", ""));
        let id = StylesheetId::from("empty");
        let state = resolver.resolve(Some(&id)).await;

        let sheet = state.stylesheet().expect("ready");
        assert!(sheet.parsed().is_empty());
        assert_eq!(resolver.peek(Some(&id)), state);
    }

    #[tokio::test]
    async fn test_failure_is_cached_and_not_retried() {
        let source = Arc::new(CountingSource::default());
        let resolver = StylesheetResolver::new(Arc::clone(&source));
        let id = StylesheetId::from("bad-sheet");

        let first = resolver.resolve(Some(&id)).await;
        let second = resolver.resolve(Some(&id)).await;

        assert!(matches!(first, StyleState::Failed { .. }));
        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        assert!(resolver.invalidate(&id));
        let _ = resolver.resolve(Some(&id)).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let source = Arc::new(CountingSource::default());
        let resolver = StylesheetResolver::new(Arc::clone(&source));
        let id = StylesheetId::from("brand");

        let (a, b, c) = tokio::join!(
            resolver.resolve(Some(&id)),
            resolver.resolve(Some(&id)),
            resolver.resolve(Some(&id))
        );

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.stylesheet().is_some());
    }

    #[tokio::test]
    async fn test_set_source_recomputes_parse() {
        let resolver = StylesheetResolver::new(InMemorySource::new().with("brand", ".a { color: red }"));
        let id = StylesheetId::from("brand");
        let _ = resolver.resolve(Some(&id)).await;

        resolver.set_source("brand", ".b { color: blue }");

        let state = resolver.peek(Some(&id));
        let parsed = state.stylesheet().expect("ready").parsed();
        assert!(parsed.class_rule("a").is_none());
        assert_eq!(parsed.class_rule("b").and_then(|r| r.get("color")), Some("blue"));
    }
}
