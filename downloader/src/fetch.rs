/// Plain HTTP fetching: page HTML, JSON APIs and streamed media files.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::cookie::Jar;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use ninjax_shared::errors::{MediaError, NinjaError, NinjaResult};
use ninjax_shared::models::USER_AGENT;

/// Whole-request limit for pages and JSON; also the connect limit for media.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest gap allowed between two body chunks of a streamed file.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with the desktop user agent and an optional cookie jar.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(jar: Option<Arc<Jar>>) -> NinjaResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(REQUEST_TIMEOUT);
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }
        Ok(Self {
            client: builder.build()?,
            read_timeout: READ_TIMEOUT,
        })
    }

    /// Wrap a client built elsewhere, e.g. with custom DNS overrides.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Override the allowed gap between streamed chunks.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// GET a page body as text.
    pub async fn get_text(&self, url: &str) -> NinjaResult<String> {
        let response = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> NinjaResult<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    /// Stream `url` into `dest`, refusing bodies over `max_bytes`.
    ///
    /// There is no limit on the total transfer time, only on connecting and
    /// on the gap between chunks. A partially written file is removed on any failure.
    pub async fn stream_to_file(&self, url: &str, dest: &Path, max_bytes: u64) -> NinjaResult<u64> {
        let result = self.write_body(url, dest, max_bytes).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial file {:?}: {}", dest, e);
                }
            }
        }
        result
    }

    async fn write_body(&self, url: &str, dest: &Path, max_bytes: u64) -> NinjaResult<u64> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(MediaError::TooLarge(max_bytes).into());
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::time::timeout(self.read_timeout, stream.next())
                .await
                .map_err(|_| MediaError::Stalled(self.read_timeout.as_secs().max(1)))?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(NinjaError::Http)?;
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(MediaError::TooLarge(max_bytes).into());
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!("Fetched {} bytes into {:?}", written, dest);
        Ok(written)
    }
}
