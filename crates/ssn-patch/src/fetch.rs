//! Fetching patch files from the CDN
//!
//! Small files (`.solidpkg`, the directory `.zip`) are held in memory.
//! Disk images are streamed to a cache directory that mirrors the CDN
//! layout, `{cache}/{host}/{path}`, and a cached copy whose size matches
//! is reused instead of downloading it again.

use crate::config::PatchConfig;
use crate::error::{PatchError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Source of patch files
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a whole file into memory
    async fn fetch(&self, host: &str, path: &str) -> Result<Bytes>;

    /// Fetch a file of known size into `destination` and return where it was stored
    async fn fetch_to_file(
        &self,
        host: &str,
        path: &str,
        expected_size: u64,
        destination: &Path,
    ) -> Result<PathBuf>;
}

/// Install the process-wide rustls crypto provider once
pub fn ensure_crypto_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        // Another component may have installed one already
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Where a CDN file is cached below `cache_dir`
pub fn cache_path(cache_dir: &Path, host: &str, path: &str) -> PathBuf {
    let mut out = cache_dir.join(host);
    for part in path.split('/').filter(|p| !p.is_empty() && *p != "..") {
        out.push(part);
    }
    out
}

/// Plain HTTP GET fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    scheme: String,
    max_memory_size: u64,
}

impl HttpFetcher {
    /// Build a fetcher from the patch configuration
    pub fn new(config: &PatchConfig) -> Result<Self> {
        ensure_crypto_provider();
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::limited(3))
            .user_agent(concat!("ssn-patch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            max_memory_size: config.max_memory_size,
        })
    }

    fn url(&self, host: &str, path: &str) -> String {
        let separator = if path.starts_with('/') { "" } else { "/" };
        format!("{}://{host}{separator}{path}", self.scheme)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        tracing::debug!(url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PatchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, host: &str, path: &str) -> Result<Bytes> {
        let url = self.url(host, path);
        let response = self.get(&url).await?;

        let announced = response.content_length();
        if let Some(size) = announced.filter(|&size| size > self.max_memory_size) {
            return Err(PatchError::TooLarge {
                url,
                size,
                limit: self.max_memory_size,
            });
        }

        let body = response.bytes().await?;
        if let Some(expected) = announced
            && expected != body.len() as u64
        {
            return Err(PatchError::SizeMismatch {
                url,
                expected,
                actual: body.len() as u64,
            });
        }
        tracing::debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }

    async fn fetch_to_file(
        &self,
        host: &str,
        path: &str,
        expected_size: u64,
        destination: &Path,
    ) -> Result<PathBuf> {
        if let Ok(meta) = tokio::fs::metadata(destination).await
            && meta.is_file()
            && meta.len() == expected_size
        {
            tracing::debug!(path = %destination.display(), "using cached download");
            return Ok(destination.to_path_buf());
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(PatchError::at(parent))?;
        }

        let url = self.url(host, path);
        let response = self.get(&url).await?;
        let partial = partial_path(destination);
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(PatchError::at(&partial))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > expected_size {
                break;
            }
            file.write_all(&chunk).await.map_err(PatchError::at(&partial))?;
        }
        file.flush().await.map_err(PatchError::at(&partial))?;
        drop(file);

        if written != expected_size {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(PatchError::SizeMismatch {
                url,
                expected: expected_size,
                actual: written,
            });
        }

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(PatchError::at(destination))?;
        tracing::debug!(url, bytes = written, path = %destination.display(), "downloaded");
        Ok(destination.to_path_buf())
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
