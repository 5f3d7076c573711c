// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// OpenAI Reasoning Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat completions API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)
// Images travel as data-URL `image_url` content parts.

use super::{network_error, status_error};
use crate::domain::reasoning::{
    FinishReason, GenerationOptions, GenerationResponse, ImagePayload, ReasoningError,
    ReasoningProvider, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }

    fn request(&self, prompt: &str, image: Option<&ImagePayload>, options: &GenerationOptions) -> OpenAIRequest {
        let mut content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        if let Some(image) = image {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl { url: image.data_url() },
            });
        }

        OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage { role: "user", content }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: options.stop_sequences.clone(),
        }
    }
}

#[async_trait]
impl ReasoningProvider for OpenAIAdapter {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ReasoningError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let mut request = self.client.post(&url).json(&self.request(prompt, image, options));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await.map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text, &self.model));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::Provider(format!("Failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ReasoningError::Provider("No response from model".into()))?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            text: choice.message.content.unwrap_or_default(),
            usage,
            provider: "openai".to_string(),
            model: self.model.clone(),
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                Some("content_filter") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn health_check(&self) -> Result<(), ReasoningError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let mut request = self.client.get(&url);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await.map_err(network_error)?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(ReasoningError::Authentication("Invalid API key".into()))
        } else {
            Err(ReasoningError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_request_shape() {
        let adapter = OpenAIAdapter::new("http://localhost".into(), String::new(), "gpt-4o".into());
        let image = ImagePayload::from_bytes(b"png", "image/png");
        let body = serde_json::to_value(adapter.request("look", Some(&image), &GenerationOptions::default())).unwrap();

        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "look");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,cG5n");
        assert!(body.get("stop").is_none());
    }

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"content":"{\"status\":\"pass\"}"},"finish_reason":"stop"}],
                   "usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
            )
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(format!("{}/v1", server.url()), "sk-test".into(), "gpt-4o".into());
        let response = adapter
            .generate("prompt", None, &GenerationOptions::default())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, r#"{"status":"pass"}"#);
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_transient_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let adapter = OpenAIAdapter::new(server.url(), "sk-test".into(), "gpt-4o".into());
        let err = adapter
            .generate("prompt", None, &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReasoningError::RateLimit));
        assert!(err.is_transient());
    }
}
