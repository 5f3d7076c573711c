// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Engine boundary errors.
//!
//! Per-item evidence failures are not errors at this level: they are recorded
//! as unanalyzed items inside the report. Only request-level faults surface
//! as an [`EngineError`].

use crate::domain::credits::LedgerError;
use thiserror::Error;

/// What was wrong with a request. Raised before any side effect.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Protocol pack \"{0}\" not found or inactive")]
    UnknownProtocolPack(String),

    #[error("Standards profile \"{0}\" not found or inactive")]
    UnknownProfile(String),

    #[error("input_type must be one of: image, video, text, sensor, form (got \"{0}\")")]
    InvalidInputType(String),

    #[error("Invalid payload: {0}")]
    MalformedPayload(String),

    #[error("Too many evidence items: {count} (max {max})")]
    TooManyItems { count: usize, max: usize },

    #[error("Account id required")]
    MissingAccount,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Input type not yet supported: {0}")]
    Unsupported(String),

    #[error("Insufficient credits: {remaining} remaining, {required} required")]
    InsufficientCredits { remaining: u64, required: u64 },

    #[error("Credit ledger error: {0}")]
    Ledger(String),

    #[error("Evaluation cancelled")]
    Cancelled,

    #[error("Backend unavailable: {0}")]
    Backend(String),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { remaining, required } => {
                Self::InsufficientCredits { remaining, required }
            }
            LedgerError::Database(msg) => Self::Backend(msg),
            other => Self::Ledger(other.to_string()),
        }
    }
}

impl EngineError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unsupported(_) => "unsupported_input_type",
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::Ledger(_) => "ledger_error",
            Self::Cancelled => "cancelled",
            Self::Backend(_) => "backend_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_shortfall_maps_to_insufficient_credits() {
        let err: EngineError = LedgerError::InsufficientCredits {
            remaining: 3,
            required: 5,
        }
        .into();
        assert!(matches!(
            err,
            EngineError::InsufficientCredits {
                remaining: 3,
                required: 5
            }
        ));
        assert_eq!(err.code(), "insufficient_credits");
    }

    #[test]
    fn test_validation_messages() {
        let err: EngineError = ValidationError::TooManyItems { count: 201, max: 200 }.into();
        assert_eq!(err.to_string(), "Too many evidence items: 201 (max 200)");
        assert_eq!(err.code(), "validation_error");
    }
}
