// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reasoning
//!
//! Domain interface to the vision/language reasoning service.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer between evaluation logic and vendor APIs
//!
//! Two traits live here. [`ReasoningProvider`] is what one vendor adapter
//! implements (`infrastructure/llm/`). [`ReasoningService`] is the narrow
//! contract the evidence dispatcher depends on; the provider registry
//! implements it with alias resolution, retries and fallback.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Image bytes handed to a multimodal model.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Standard base64, no data-URL prefix
    pub base64_data: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

/// Narrow contract consumed by the evidence dispatcher.
///
/// Treated as unreliable: it may return malformed JSON, time out or be
/// rate-limited.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<String, ReasoningError>;
}

/// Domain interface for one reasoning vendor
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ReasoningError>;

    async fn health_check(&self) -> Result<(), ReasoningError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,

    /// Low by default; compliance checks should be repeatable
    pub temperature: Option<f32>,

    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(2000),
            temperature: Some(0.3),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub usage: TokenUsage,
    /// e.g. "openai", "ollama"
    pub provider: String,
    pub model: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ReasoningError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_payload_data_url() {
        let image = ImagePayload::from_bytes(b"hello", "image/png");
        assert_eq!(image.data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_transient_errors() {
        assert!(ReasoningError::RateLimit.is_transient());
        assert!(!ReasoningError::Authentication("bad key".into()).is_transient());
    }
}
