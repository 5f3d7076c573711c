// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the aggregates the engine owns. Interfaces are
//! defined here and implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ProfileRepository` | `StandardsProfile` | `InMemoryProfileRepository` |
//! | `CreditLedger` (see `domain::credits`) | `CreditBalance` | `InMemoryCreditLedger`, `PostgresCreditLedger` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at start-up from the `ledger`
//! section of `protocollm-config.yaml`.

use crate::domain::profile::{Industry, ProfileDraft, ProfileId, StandardsProfile, TaskType};
use async_trait::async_trait;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

/// Repository interface for standards profiles.
///
/// Profiles are never hard-deleted; `deactivate` flips `active` to false.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Save profile (create or replace)
    async fn save(&self, profile: &StandardsProfile) -> Result<(), RepositoryError>;

    /// Find profile by id regardless of `active`
    async fn find_by_id(&self, id: &ProfileId) -> Result<Option<StandardsProfile>, RepositoryError>;

    /// Active system profile for an exact `(industry, task_type)` pair
    async fn find_system(
        &self,
        industry: Industry,
        task_type: TaskType,
    ) -> Result<Option<StandardsProfile>, RepositoryError>;

    /// Active profiles visible to a user: system profiles first, then the
    /// user's own, newest first within each group.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StandardsProfile>, RepositoryError>;

    /// Edit a user profile. System profiles and other users' profiles are
    /// rejected with `Forbidden`.
    async fn update(
        &self,
        id: &ProfileId,
        owner_id: &str,
        draft: ProfileDraft,
    ) -> Result<StandardsProfile, RepositoryError>;

    /// Soft delete, owner only.
    async fn deactivate(&self, id: &ProfileId, owner_id: &str) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid entity: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
