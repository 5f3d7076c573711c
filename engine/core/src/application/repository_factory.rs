// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations from the engine configuration,
//! keeping the domain layer free of infrastructure choices.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pick the persistence backend for profiles and credits

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::credits::CreditLedger;
use crate::domain::engine_config::LedgerConfig;
use crate::domain::repository::{PostgresConfig, ProfileRepository, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryCreditLedger, InMemoryProfileRepository, PostgresCreditLedger,
};

pub fn storage_backend(config: &LedgerConfig) -> StorageBackend {
    match &config.database_url {
        Some(url) if !url.is_empty() => StorageBackend::PostgreSQL(PostgresConfig {
            connection_string: url.clone(),
        }),
        _ => StorageBackend::InMemory,
    }
}

/// Profiles live in memory for every backend, seeded with the system set.
pub fn create_profile_repository(_backend: &StorageBackend) -> Arc<dyn ProfileRepository> {
    Arc::new(InMemoryProfileRepository::with_system_profiles())
}

/// Creates a CreditLedger implementation based on the configured backend.
///
/// Seed balances apply to the in-memory ledger only; a PostgreSQL ledger
/// keeps whatever balances its tables already hold.
pub async fn create_credit_ledger(config: &LedgerConfig) -> anyhow::Result<Arc<dyn CreditLedger>> {
    match storage_backend(config) {
        StorageBackend::InMemory => {
            info!(accounts = config.seed_balances.len(), "Using in-memory credit ledger");
            Ok(Arc::new(InMemoryCreditLedger::with_balances(
                config.seed_balances.clone(),
            )))
        }
        StorageBackend::PostgreSQL(pg) => {
            if !config.seed_balances.is_empty() {
                warn!("ledger.seed_balances is ignored when a database_url is configured");
            }
            let db = Database::new(&pg.connection_string).await?;
            let ledger = PostgresCreditLedger::new(db.get_pool().clone());
            ledger.migrate().await?;
            info!("Using PostgreSQL credit ledger");
            Ok(Arc::new(ledger))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_backend_selection() {
        assert!(matches!(
            storage_backend(&LedgerConfig::default()),
            StorageBackend::InMemory
        ));
        let config = LedgerConfig {
            database_url: Some("postgres://localhost/protocollm".to_string()),
            seed_balances: HashMap::new(),
        };
        assert!(matches!(storage_backend(&config), StorageBackend::PostgreSQL(_)));
    }

    #[tokio::test]
    async fn test_in_memory_ledger_is_seeded() {
        let config = LedgerConfig {
            database_url: None,
            seed_balances: HashMap::from([("acct-demo".to_string(), 25)]),
        };
        let ledger = create_credit_ledger(&config).await.unwrap();
        assert_eq!(ledger.balance("acct-demo").await.unwrap().remaining, 25);
    }
}
