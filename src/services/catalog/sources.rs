use std::path::PathBuf;

use reqwest::Client as HttpClient;

use crate::error::{AppError, AppResult};

/// Where a static catalog resource is read from
///
/// The catalog is read once at startup, so sources hand back the whole
/// resource as bytes and leave parsing to the caller.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Reads the full resource
    async fn fetch(&self) -> AppResult<Vec<u8>>;

    /// Human-readable location for logs and errors
    fn location(&self) -> &str;

    /// Local filesystem path, when the resource lives on disk
    fn local_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Picks a source from a location string: `http(s)://` URLs are fetched,
/// anything else is treated as a filesystem path
pub fn source_for(location: &str) -> Box<dyn CatalogSource> {
    if is_remote(location) {
        Box::new(RemoteUrl::new(location))
    } else {
        Box::new(LocalFile::new(location))
    }
}

pub fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Resource on the local filesystem
pub struct LocalFile {
    path: String,
}

impl LocalFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl CatalogSource for LocalFile {
    async fn fetch(&self) -> AppResult<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            tracing::error!(path = %self.path, error = %e, "Failed to read catalog file");
            AppError::Io(e)
        })
    }

    fn location(&self) -> &str {
        &self.path
    }

    fn local_path(&self) -> Option<PathBuf> {
        Some(PathBuf::from(&self.path))
    }
}

/// Resource served over HTTP
pub struct RemoteUrl {
    http_client: HttpClient,
    url: String,
}

impl RemoteUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl CatalogSource for RemoteUrl {
    async fn fetch(&self) -> AppResult<Vec<u8>> {
        let response = self.http_client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url = %self.url, status = %status, "Catalog fetch returned error status");
            return Err(AppError::ExternalSource(format!(
                "GET {} returned {}",
                self.url, status
            )));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(url = %self.url, bytes = bytes.len(), "Fetched remote catalog resource");
        Ok(bytes.to_vec())
    }

    fn location(&self) -> &str {
        &self.url
    }
}

/// Serves `router` on an ephemeral local port, returning its base URL
#[cfg(test)]
pub(crate) async fn serve_locally(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
