// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration Types
//
// Defines the configuration schema for a ProtocolLM engine node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Reasoning provider configuration (BYOLLM) and model alias mapping
// - Evidence dispatch limits and timeouts
// - Reference retrieval, evidence store and credit ledger backends
// - Network and observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "protocollm.com/v1";
pub const KIND: &str = "EngineConfig";

/// Top-level Kubernetes-style engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "protocollm.com/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Engine configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub reasoning_providers: Vec<ReasoningProviderConfig>,

    #[serde(default)]
    pub reasoning_selection: ReasoningSelection,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_store: Option<EvidenceStoreConfig>,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningProviderConfig {
    /// Unique provider name (e.g., "openai", "ollama-local")
    pub name: String,

    /// "openai", "openai-compatible", "anthropic" or "ollama"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Alias the engine refers to (e.g., "default", "vision")
    pub alias: String,

    /// Actual model identifier for the provider API
    pub model: String,

    /// e.g. ["chat", "vision"]
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

impl ModelConfig {
    pub fn supports_vision(&self) -> bool {
        self.capabilities.iter().any(|c| c == "vision")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSelection {
    /// Model alias used for every evaluation
    #[serde(default = "default_model_alias")]
    pub default_model: String,

    /// Provider tried once after retries on the primary are exhausted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for ReasoningSelection {
    fn default() -> Self {
        Self {
            default_model: default_model_alias(),
            fallback_provider: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on one item's fetch + reasoning time
    #[serde(with = "humantime_serde", default = "default_item_timeout")]
    pub item_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,

    /// Items analyzed concurrently within one request
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Characters per text chunk
    #[serde(default = "default_text_chunk_size")]
    pub text_chunk_size: usize,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            item_timeout: default_item_timeout(),
            fetch_timeout: default_fetch_timeout(),
            max_concurrency: default_max_concurrency(),
            text_chunk_size: default_text_chunk_size(),
            max_items: default_max_items(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Search endpoint; retrieval is disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(with = "humantime_serde", default = "default_retrieval_timeout")]
    pub timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            top_k: default_top_k(),
            timeout: default_retrieval_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceStoreConfig {
    /// Local directory for content-addressed evidence
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// PostgreSQL connection string; in-memory ledger when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Opening balances for the in-memory ledger
    #[serde(default)]
    pub seed_balances: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Port for the Prometheus scrape endpoint; no exporter when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_model_alias() -> String {
    "default".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_item_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_concurrency() -> usize {
    4
}

fn default_text_chunk_size() -> usize {
    4000
}

fn default_max_items() -> usize {
    crate::domain::evidence::MAX_EVIDENCE_ITEMS
}

fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_top_k() -> usize {
    5
}

fn default_retrieval_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

const PROVIDER_TYPES: [&str; 4] = ["openai", "openai-compatible", "anthropic", "ollama"];

impl Default for EngineConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "protocollm-engine".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: EngineConfig::default(),
        }
    }
}

impl EngineConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. PROTOCOLLM_CONFIG_PATH environment variable
    /// 2. ./protocollm-config.yaml (working directory)
    /// 3. ~/.protocollm/config.yaml (user home)
    /// 4. /etc/protocollm/config.yaml (system, Unix) or C:\ProgramData\ProtocolLM\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PROTOCOLLM_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./protocollm-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".protocollm").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/protocollm/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\ProtocolLM\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PROTOCOLLM_ITEM_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(timeout) => {
                    tracing::info!("Environment override: PROTOCOLLM_ITEM_TIMEOUT={}", val);
                    self.spec.dispatch.item_timeout = timeout;
                }
                Err(e) => tracing::warn!(
                    "Invalid value for PROTOCOLLM_ITEM_TIMEOUT: '{}' ({}). Ignoring.",
                    val,
                    e
                ),
            }
        }

        if let Ok(val) = std::env::var("PROTOCOLLM_MAX_CONCURRENCY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => {
                    tracing::info!("Environment override: PROTOCOLLM_MAX_CONCURRENCY={}", n);
                    self.spec.dispatch.max_concurrency = n;
                }
                _ => tracing::warn!(
                    "Invalid value for PROTOCOLLM_MAX_CONCURRENCY: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("PROTOCOLLM_DATABASE_URL") {
            if !val.is_empty() {
                tracing::info!("Environment override: PROTOCOLLM_DATABASE_URL set");
                self.spec.ledger.database_url = Some(val);
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        for provider in &spec.reasoning_providers {
            if provider.name.is_empty() {
                anyhow::bail!("Reasoning provider name cannot be empty");
            }

            if !PROVIDER_TYPES.contains(&provider.provider_type.as_str()) {
                anyhow::bail!(
                    "Unsupported provider type '{}' for: {}",
                    provider.provider_type,
                    provider.name
                );
            }

            if provider.endpoint.is_empty() {
                anyhow::bail!("Reasoning provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.models.is_empty() {
                anyhow::bail!("Reasoning provider must have at least one model: {}", provider.name);
            }

            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }
                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
            }
        }

        let enabled: Vec<&ReasoningProviderConfig> =
            spec.reasoning_providers.iter().filter(|p| p.enabled).collect();

        if !enabled.is_empty() {
            let alias = &spec.reasoning_selection.default_model;
            if !enabled.iter().any(|p| p.models.iter().any(|m| &m.alias == alias)) {
                anyhow::bail!("Default model alias '{}' not found in reasoning_providers", alias);
            }
        }

        if let Some(fallback) = &spec.reasoning_selection.fallback_provider {
            if !spec.reasoning_providers.iter().any(|p| &p.name == fallback) {
                anyhow::bail!("Fallback provider '{}' not found in reasoning_providers", fallback);
            }
        }

        if spec.dispatch.max_concurrency == 0 {
            anyhow::bail!("dispatch.max_concurrency must be at least 1");
        }
        if spec.dispatch.item_timeout.is_zero() {
            anyhow::bail!("dispatch.item_timeout must be positive");
        }
        if spec.dispatch.text_chunk_size < 100 {
            anyhow::bail!("dispatch.text_chunk_size must be at least 100 characters");
        }
        if spec.dispatch.max_items == 0
            || spec.dispatch.max_items > crate::domain::evidence::MAX_EVIDENCE_ITEMS
        {
            anyhow::bail!(
                "dispatch.max_items must be between 1 and {}",
                crate::domain::evidence::MAX_EVIDENCE_ITEMS
            );
        }
        if spec.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be at least 1");
        }

        Ok(())
    }
}
