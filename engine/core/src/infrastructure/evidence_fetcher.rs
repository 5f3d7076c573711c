// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP evidence fetcher.
//!
//! Downloads photos referenced by URL. Only `http`/`https` URLs are accepted
//! and the body is read chunk by chunk so an oversized download is cut off
//! at the cap instead of being buffered whole.

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::domain::evidence_fetch::{EvidenceFetcher, FetchError, FetchedEvidence};

pub struct HttpEvidenceFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpEvidenceFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;
        Ok(Self { client, max_bytes })
    }
}

fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!("unsupported scheme '{}'", other))),
    }
}

#[async_trait]
impl EvidenceFetcher for HttpEvidenceFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedEvidence, FetchError> {
        let url = validate_url(url)?;
        debug!(%url, "Fetching evidence");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(FetchError::TooLarge { max: self.max_bytes });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?
        {
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(FetchError::TooLarge { max: self.max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedEvidence {
            bytes: body.freeze(),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(max_bytes: u64) -> HttpEvidenceFetcher {
        HttpEvidenceFetcher::new(Duration::from_secs(5), max_bytes).unwrap()
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://cdn.example.com/a.jpg").is_ok());
        assert!(matches!(validate_url("ftp://host/a.jpg"), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(validate_url("not a url"), Err(FetchError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_returns_bytes_and_content_type() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/photo.png")
            .with_status(200)
            .with_header("content-type", "image/png; charset=binary")
            .with_body([0x89, b'P', b'N', b'G'])
            .create_async()
            .await;

        let fetched = fetcher(1024)
            .fetch(&format!("{}/photo.png", server.url()))
            .await
            .unwrap();
        assert_eq!(&fetched.bytes[..], &[0x89, b'P', b'N', b'G']);
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/gone.jpg").with_status(404).create_async().await;

        let err = fetcher(1024)
            .fetch(&format!("{}/gone.jpg", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Status(404));
        assert_eq!(err.to_string(), "Failed to fetch evidence: HTTP 404");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/big.jpg")
            .with_status(200)
            .with_body(vec![0u8; 64])
            .create_async()
            .await;

        let err = fetcher(16)
            .fetch(&format!("{}/big.jpg", server.url()))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::TooLarge { max: 16 });
    }
}
