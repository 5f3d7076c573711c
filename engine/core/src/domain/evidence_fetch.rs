// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Remote evidence download contract.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEvidence {
    pub bytes: Bytes,
    /// Content-Type reported by the remote server, if any
    pub content_type: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("Invalid evidence URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch evidence: {0}")]
    Request(String),

    #[error("Failed to fetch evidence: HTTP {0}")]
    Status(u16),

    #[error("Evidence exceeds {max} bytes")]
    TooLarge { max: u64 },
}

#[async_trait]
pub trait EvidenceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedEvidence, FetchError>;
}
