// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reference retrievers.
//!
//! [`HttpReferenceRetriever`] posts `{query, top_k}` to a search endpoint
//! that answers with `[{text, metadata: {source}}]` (optionally wrapped in
//! `{"results": [...]}`). [`InMemoryKeywordRetriever`] ranks a fixed set of
//! passages by keyword overlap for development and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::domain::retrieval::{ReferenceChunk, ReferenceRetriever, RetrievalError};

pub struct HttpReferenceRetriever {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Wrapped { results: Vec<SearchHit> },
    Bare(Vec<SearchHit>),
}

#[derive(Deserialize)]
struct SearchHit {
    text: String,
    #[serde(default)]
    metadata: HitMetadata,
}

#[derive(Deserialize, Default)]
struct HitMetadata {
    #[serde(default)]
    source: Option<String>,
}

impl HttpReferenceRetriever {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl ReferenceRetriever for HttpReferenceRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ReferenceChunk>, RetrievalError> {
        let mut request = self.client.post(&self.endpoint).json(&SearchRequest { query, top_k });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RetrievalError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RetrievalError::Request(format!("HTTP {}", response.status())));
        }

        let hits = match response
            .json::<SearchResponse>()
            .await
            .map_err(|e| RetrievalError::Malformed(e.to_string()))?
        {
            SearchResponse::Wrapped { results } => results,
            SearchResponse::Bare(hits) => hits,
        };
        debug!(hits = hits.len(), "Reference search complete");

        Ok(hits
            .into_iter()
            .take(top_k)
            .map(|hit| ReferenceChunk {
                text: hit.text,
                source: hit.metadata.source,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryKeywordRetriever {
    chunks: Vec<ReferenceChunk>,
}

impl InMemoryKeywordRetriever {
    pub fn new(chunks: Vec<ReferenceChunk>) -> Self {
        Self { chunks }
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ReferenceRetriever for InMemoryKeywordRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ReferenceChunk>, RetrievalError> {
        let wanted = terms(query);
        let mut scored: Vec<(usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (terms(&chunk.text).intersection(&wanted).count(), i))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Highest overlap first, insertion order breaks ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, i)| self.chunks[i].clone())
            .collect())
    }
}
