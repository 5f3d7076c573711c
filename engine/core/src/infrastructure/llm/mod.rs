// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Reasoning Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain reasoning interface and one
// vendor's multimodal API.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use registry::ProviderRegistry;

use crate::domain::reasoning::ReasoningError;
use reqwest::StatusCode;

/// Shared HTTP status translation for every adapter.
pub(crate) fn status_error(status: StatusCode, body: String, model: &str) -> ReasoningError {
    match status.as_u16() {
        401 | 403 => ReasoningError::Authentication(body),
        429 => ReasoningError::RateLimit,
        404 => ReasoningError::ModelNotFound(model.to_string()),
        _ => ReasoningError::Provider(format!("HTTP {}: {}", status, body)),
    }
}

pub(crate) fn network_error(err: reqwest::Error) -> ReasoningError {
    ReasoningError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key".into(), "m"),
            ReasoningError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, String::new(), "m"),
            ReasoningError::RateLimit
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new(), "gpt-4o"),
            ReasoningError::ModelNotFound(m) if m == "gpt-4o"
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream".into(), "m"),
            ReasoningError::Provider(_)
        ));
    }
}
