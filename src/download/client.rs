//! HTTP client wrapper shared by every network step.
//!
//! The recorder issues one logical call per step (handshake, catalog,
//! playlist, segment). `HttpClient` gives those steps a uniform way to send
//! requests with custom headers, map failures into [`DownloadError`] and
//! stream bodies to disk.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Method, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, trace};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client with connection pooling and fixed timeouts.
///
/// Create once and clone freely; clones share the underlying pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// - Connect timeout: 30 seconds
    /// - Total request timeout: 5 minutes
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = base_client_builder(connect_timeout_secs, read_timeout_secs)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a GET request with the given headers.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failure, timeout or a non-2xx status.
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<Response, DownloadError> {
        self.send(Method::GET, url, headers).await
    }

    /// Sends a POST request (empty body) with the given headers.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on network failure, timeout or a non-2xx status.
    pub async fn post(&self, url: &str, headers: HeaderMap) -> Result<Response, DownloadError> {
        self.send(Method::POST, url, headers).await
    }

    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if the request fails or the body can't be read.
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.get(url, HeaderMap::new()).await?;
        read_text(url, response).await
    }

    /// Streams the body of `url` into a new file at `file_path`.
    ///
    /// A partially written file is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] on request failure or a write error.
    #[instrument(level = "debug", skip(self), fields(path = %file_path.display()))]
    pub async fn download_to_path(&self, url: &str, file_path: &Path) -> Result<u64, DownloadError> {
        let response = self.get(url, HeaderMap::new()).await?;

        let mut file = File::create(file_path)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        let result = stream_to_file(&mut file, response, url, file_path).await;
        if result.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial segment after error");
            let _ = tokio::fs::remove_file(file_path).await;
        }
        result
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, DownloadError> {
        let parsed = url::Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        trace!(%method, url = %parsed, "sending request");

        let response = self
            .client
            .request(method, parsed)
            .headers(headers)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Reads a response body as text, mapping failures to `url`.
pub(crate) async fn read_text(url: &str, response: Response) -> Result<String, DownloadError> {
    response
        .text()
        .await
        .map_err(|e| DownloadError::from_reqwest(url, e))
}

async fn stream_to_file(
    file: &mut File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

fn base_client_builder(connect_timeout_secs: u64, read_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .timeout(Duration::from_secs(read_timeout_secs))
        .gzip(true)
        .user_agent(user_agent::default_user_agent())
}
