//! Stylesheet sources: where raw CSS text comes from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::{SourceError, StylesheetId};

/// A service returning raw CSS text keyed by stylesheet identifier.
#[async_trait]
pub trait StylesheetSource: Send + Sync {
    /// Fetch the raw CSS for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stylesheet is unknown or cannot be read.
    async fn fetch(&self, id: &StylesheetId) -> Result<String, SourceError>;
}

#[async_trait]
impl<S: StylesheetSource + ?Sized> StylesheetSource for Arc<S> {
    async fn fetch(&self, id: &StylesheetId) -> Result<String, SourceError> {
        (**self).fetch(id).await
    }
}

/// In-memory stylesheet map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sheets: Arc<RwLock<HashMap<StylesheetId, String>>>,
}

impl InMemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a stylesheet.
    pub fn insert(&self, id: impl Into<StylesheetId>, css: impl Into<String>) {
        let mut sheets = self
            .sheets
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sheets.insert(id.into(), css.into());
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(self, id: impl Into<StylesheetId>, css: impl Into<String>) -> Self {
        self.insert(id, css);
        self
    }
}

#[async_trait]
impl StylesheetSource for InMemorySource {
    async fn fetch(&self, id: &StylesheetId) -> Result<String, SourceError> {
        let sheets = self
            .sheets
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sheets
            .get(id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}

/// Directory of `{id}.css` files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve stylesheets from `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being served.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &StylesheetId) -> Result<PathBuf, SourceError> {
        let name = id.as_str();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(SourceError::InvalidId(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.css")))
    }
}

#[async_trait]
impl StylesheetSource for DirectorySource {
    async fn fetch(&self, id: &StylesheetId) -> Result<String, SourceError> {
        let path = self.path_for(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(css) => Ok(css),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SourceError::NotFound(id.to_string()))
            }
            Err(e) => Err(SourceError::Fetch {
                id: id.to_string(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }
}

/// HTTP stylesheet service: `GET {base}/{id}.css`.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base: url::Url,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// Create a source rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not a valid absolute URL.
    pub fn new(base: &str) -> Result<Self, SourceError> {
        let mut base = url::Url::parse(base).map_err(|e| SourceError::Fetch {
            id: String::new(),
            reason: format!("invalid base url {base}: {e}"),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    fn url_for(&self, id: &StylesheetId) -> Result<url::Url, SourceError> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '?', '#']) {
            return Err(SourceError::InvalidId(name.to_string()));
        }
        self.base
            .join(&format!("{name}.css"))
            .map_err(|_| SourceError::InvalidId(name.to_string()))
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl StylesheetSource for HttpSource {
    async fn fetch(&self, id: &StylesheetId) -> Result<String, SourceError> {
        let url = self.url_for(id)?;
        tracing::debug!(%url, "fetching stylesheet");

        let fetch_error = |reason: String| SourceError::Fetch {
            id: id.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemorySource::new().with("brand", ".a { color: red }");
        assert_eq!(
            source.fetch(&"brand".into()).await,
            Ok(".a { color: red }".to_string())
        );
        assert_eq!(
            source.fetch(&"missing".into()).await,
            Err(SourceError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_directory_source_reads_css_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("brand.css"), ".lead { color: red }").expect("write");

        let source = DirectorySource::new(dir.path());
        let css = source.fetch(&"brand".into()).await.expect("fetch");
        assert!(css.contains(".lead"));

        assert!(matches!(
            source.fetch(&"other".into()).await,
            Err(SourceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_source_rejects_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = DirectorySource::new(dir.path());
        for id in ["../secret", "a/b", "", ".hidden"] {
            assert!(matches!(
                source.fetch(&id.into()).await,
                Err(SourceError::InvalidId(_))
            ));
        }
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_http_source() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/styles/brand.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string(".x { color: red }"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/styles/broken.css"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpSource::new(&format!("{}/styles", server.uri())).expect("source");

        assert_eq!(
            source.fetch(&"brand".into()).await,
            Ok(".x { color: red }".to_string())
        );
        assert!(matches!(
            source.fetch(&"missing".into()).await,
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(
            source.fetch(&"broken".into()).await,
            Err(SourceError::Fetch { .. })
        ));
    }
}
