// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Anthropic Reasoning Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API

use super::{network_error, status_error};
use crate::domain::reasoning::{
    FinishReason, GenerationOptions, GenerationResponse, ImagePayload, ReasoningError,
    ReasoningProvider, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    fn url(&self) -> String {
        format!("{}/messages", self.endpoint.trim_end_matches('/'))
    }

    fn request(&self, prompt: &str, image: Option<&ImagePayload>, options: &GenerationOptions) -> AnthropicRequest {
        // Image blocks go before the instruction text.
        let mut content = Vec::with_capacity(2);
        if let Some(image) = image {
            content.push(ContentBlock::Image {
                source: ImageSource {
                    kind: "base64",
                    media_type: image.mime_type.clone(),
                    data: image.base64_data.clone(),
                },
            });
        }
        content.push(ContentBlock::Text {
            text: prompt.to_string(),
        });

        AnthropicRequest {
            model: self.model.clone(),
            messages: vec![AnthropicMessage { role: "user", content }],
            max_tokens: options.max_tokens.unwrap_or(4096),
            temperature: options.temperature,
            stop_sequences: options.stop_sequences.clone(),
        }
    }
}

#[async_trait]
impl ReasoningProvider for AnthropicAdapter {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ReasoningError> {
        let response = self
            .client
            .post(self.url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request(prompt, image, options))
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text, &self.model));
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::Provider(format!("Failed to parse response: {}", e)))?;

        let text = anthropic_response
            .content
            .into_iter()
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");
        let usage = &anthropic_response.usage;

        Ok(GenerationResponse {
            text,
            usage: TokenUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
            provider: "anthropic".to_string(),
            model: self.model.clone(),
            finish_reason: match anthropic_response.stop_reason.as_deref() {
                Some("max_tokens") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn health_check(&self) -> Result<(), ReasoningError> {
        // No models endpoint; a GET on messages proves the key is accepted.
        let response = self
            .client
            .get(self.url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status.is_success() || status == 404 || status == 405 {
            Ok(())
        } else if status == 401 || status == 403 {
            Err(ReasoningError::Authentication("Invalid API key".into()))
        } else {
            Err(ReasoningError::Network(format!("HTTP {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_block_precedes_text() {
        let adapter = AnthropicAdapter::new(
            "https://api.anthropic.com/v1".into(),
            "key".into(),
            "claude-sonnet".into(),
        );
        let image = ImagePayload::from_bytes(b"jpg", "image/jpeg");
        let body = serde_json::to_value(adapter.request("inspect", Some(&image), &GenerationOptions::default())).unwrap();

        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[1]["text"], "inspect");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(adapter.url(), "https://api.anthropic.com/v1/messages");
    }
}
