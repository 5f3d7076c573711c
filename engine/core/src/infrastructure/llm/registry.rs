// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Reasoning Provider Registry - Model Alias Resolution and Provider Management
//
// Resolves model aliases to provider adapters and wraps every call with
// exponential-backoff retries and a single fallback attempt. This is the
// `ReasoningService` the evidence dispatcher talks to.

use crate::domain::engine_config::{EngineConfig, ReasoningProviderConfig};
use crate::domain::reasoning::{
    GenerationOptions, GenerationResponse, ImagePayload, ReasoningError, ReasoningProvider,
    ReasoningService,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

/// One resolved alias.
#[derive(Clone)]
struct AliasTarget {
    provider_name: String,
    model: String,
    adapter: Arc<dyn ReasoningProvider>,
}

/// Registry for managing reasoning providers and resolving model aliases
pub struct ProviderRegistry {
    /// Provider name -> adapter bound to the provider's first model
    providers: HashMap<String, Arc<dyn ReasoningProvider>>,
    aliases: HashMap<String, AliasTarget>,
    default_alias: String,
    fallback_provider: Option<String>,
    max_retries: u32,
    retry_delay_ms: u64,
    options: GenerationOptions,
}

impl ProviderRegistry {
    /// Create provider registry from engine configuration
    pub fn from_config(config: &EngineConfig) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();
        let mut aliases = HashMap::new();

        info!("Initializing reasoning provider registry");

        for provider_config in &config.reasoning_providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            let api_key = match resolve_api_key(&provider_config.api_key) {
                Ok(key) => key,
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                    continue;
                }
            };

            for (index, model_config) in provider_config.models.iter().enumerate() {
                let adapter = create_adapter(provider_config, &api_key, &model_config.model)?;
                info!(
                    "Mapping alias '{}' -> {} ({})",
                    model_config.alias, model_config.model, provider_config.name
                );
                if index == 0 {
                    providers.insert(provider_config.name.clone(), adapter.clone());
                }
                aliases.insert(
                    model_config.alias.clone(),
                    AliasTarget {
                        provider_name: provider_config.name.clone(),
                        model: model_config.model.clone(),
                        adapter,
                    },
                );
            }
        }

        if providers.is_empty() {
            warn!("No reasoning providers configured - evidence analysis will fail");
        }

        let selection = &config.reasoning_selection;
        Ok(Self {
            providers,
            aliases,
            default_alias: selection.default_model.clone(),
            fallback_provider: selection.fallback_provider.clone(),
            max_retries: selection.max_retries.max(1),
            retry_delay_ms: selection.retry_delay_ms,
            options: GenerationOptions::default(),
        })
    }

    /// Generate using a model alias.
    ///
    /// Transient failures are retried with `retry_delay_ms * 2^attempt`
    /// backoff; once the primary is exhausted the fallback provider gets one
    /// attempt.
    pub async fn generate(
        &self,
        alias: &str,
        prompt: &str,
        image: Option<&ImagePayload>,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, ReasoningError> {
        let target = self
            .aliases
            .get(alias)
            .ok_or_else(|| ReasoningError::ModelNotFound(format!("Model alias '{}' not found", alias)))?;

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            match target.adapter.generate(prompt, image, options).await {
                Ok(response) => {
                    debug!(
                        provider = %target.provider_name,
                        model = %target.model,
                        tokens = response.usage.total_tokens,
                        "Generation successful on attempt {}",
                        attempt + 1
                    );
                    metrics::counter!("protocollm_reasoning_requests_total", "provider" => target.provider_name.clone(), "outcome" => "success").increment(1);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        provider = %target.provider_name,
                        "Generation failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    metrics::counter!("protocollm_reasoning_requests_total", "provider" => target.provider_name.clone(), "outcome" => "error").increment(1);
                    let transient = e.is_transient();
                    last_error = Some(e);
                    if !transient || attempt + 1 == self.max_retries {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(
                        self.retry_delay_ms.saturating_mul(2_u64.saturating_pow(attempt)),
                    ))
                    .await;
                }
            }
        }

        if let Some(fallback) = self.fallback_for(&target.provider_name) {
            info!("Trying fallback provider: {}", fallback.0);
            return fallback.1.generate(prompt, image, options).await;
        }

        Err(last_error.unwrap_or_else(|| ReasoningError::Provider("Unknown error".into())))
    }

    fn fallback_for(&self, primary: &str) -> Option<(&String, &Arc<dyn ReasoningProvider>)> {
        let name = self.fallback_provider.as_ref().filter(|name| name.as_str() != primary)?;
        self.providers.get_key_value(name)
    }

    /// Check health of all providers
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), ReasoningError>> {
        let mut results = HashMap::new();

        for (name, provider) in &self.providers {
            debug!("Health checking provider: {}", name);
            results.insert(name.clone(), provider.health_check().await);
        }

        results
    }

    pub fn available_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.aliases.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }
}

#[async_trait]
impl ReasoningService for ProviderRegistry {
    async fn invoke(&self, prompt: &str, image: Option<&ImagePayload>) -> Result<String, ReasoningError> {
        let response = self
            .generate(&self.default_alias, prompt, image, &self.options)
            .await?;
        Ok(response.text)
    }
}

fn create_adapter(
    config: &ReasoningProviderConfig,
    api_key: &str,
    model: &str,
) -> anyhow::Result<Arc<dyn ReasoningProvider>> {
    let endpoint = config.endpoint.clone();
    let api_key = api_key.to_string();
    let model = model.to_string();

    let adapter: Arc<dyn ReasoningProvider> = match config.provider_type.as_str() {
        // OpenAI-compatible APIs (LM Studio, vLLM, etc.) share the adapter
        "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(endpoint, api_key, model)),
        "anthropic" => Arc::new(AnthropicAdapter::new(endpoint, api_key, model)),
        "ollama" => Arc::new(OllamaAdapter::new(endpoint, model)),
        other => anyhow::bail!("Unsupported provider type: {}", other),
    };
    Ok(adapter)
}

/// Resolve API key from config (supports "env:VAR_NAME" syntax)
fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
    match key.as_deref() {
        Some(k) => match k.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(k.to_string()),
        },
        // Local providers without auth
        None => Ok(String::new()),
    }
}
