// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Infrastructure Module
//!
//! Concrete implementations of the `EvidenceStore` trait.

pub mod local;

pub use local::LocalEvidenceStore;

use std::sync::Arc;

use crate::domain::engine_config::EvidenceStoreConfig;
use crate::domain::evidence_store::{EvidenceStore, StorageError};

/// Build the configured evidence store; `None` disables persistence.
pub fn create_evidence_store(
    config: Option<&EvidenceStoreConfig>,
) -> Result<Option<Arc<dyn EvidenceStore>>, StorageError> {
    match config {
        Some(config) => Ok(Some(Arc::new(LocalEvidenceStore::new(&config.path)?))),
        None => Ok(None),
    }
}

pub use mock::InMemoryEvidenceStore;

mod mock {
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::domain::evidence_store::{content_digest, EvidenceStore, StorageError, StoredEvidence};

    /// Map-backed store for tests.
    #[derive(Clone, Default)]
    pub struct InMemoryEvidenceStore {
        objects: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    }

    impl InMemoryEvidenceStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.objects.read().len()
        }

        pub fn is_empty(&self) -> bool {
            self.objects.read().is_empty()
        }
    }

    #[async_trait]
    impl EvidenceStore for InMemoryEvidenceStore {
        async fn put(&self, bytes: &[u8], content_type: &str) -> Result<StoredEvidence, StorageError> {
            let digest = content_digest(bytes);
            self.objects
                .write()
                .entry(digest.clone())
                .or_insert_with(|| bytes.to_vec());
            Ok(StoredEvidence {
                location: format!("memory://{}", digest),
                digest,
                content_type: content_type.to_string(),
                size: bytes.len() as u64,
            })
        }

        async fn get(&self, digest: &str) -> Result<Vec<u8>, StorageError> {
            self.objects
                .read()
                .get(digest)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(digest.to_string()))
        }

        async fn health_check(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_factory_disabled_without_config() {
        assert!(create_evidence_store(None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_factory_local() {
        let temp_dir = TempDir::new().unwrap();
        let config = EvidenceStoreConfig {
            path: temp_dir.path().to_string_lossy().to_string(),
        };
        let store = create_evidence_store(Some(&config)).unwrap().unwrap();
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_store_dedupes() {
        let store = InMemoryEvidenceStore::new();
        store.put(b"a", "text/plain").await.unwrap();
        store.put(b"a", "text/plain").await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
