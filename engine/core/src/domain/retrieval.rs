// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reference-document retrieval contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A passage from a customer-uploaded reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceChunk {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Retrieval request failed: {0}")]
    Request(String),

    #[error("Malformed retrieval response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ReferenceRetriever: Send + Sync {
    /// Up to `top_k` chunks relevant to `query`, best first.
    async fn search(&self, query: &str, top_k: usize)
        -> Result<Vec<ReferenceChunk>, RetrievalError>;
}
