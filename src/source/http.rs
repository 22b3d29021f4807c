//! HTTP byte source
//!
//! Issues an unbuffered GET against the tuner URL and exposes the response
//! body as an `AsyncRead`.

use std::io;

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};

use super::{ByteSource, SourceReader};

/// Byte source backed by a streaming HTTP GET
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpSource {
    /// Create a source with a default client
    pub fn new(url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a source sharing an existing client (connection pool, proxy settings)
    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Parse `url` and create a source with a default client
    pub fn parse(url: &str) -> std::result::Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// The remote URL
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn open(&self, cancel: &CancellationToken) -> Result<SourceReader> {
        let request = self.client.get(self.url.clone()).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = request => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        tracing::debug!(url = %self.url, status = status.as_u16(), "HTTP source responded");

        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
