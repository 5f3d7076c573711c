// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Evidence Store Trait - Anti-Corruption Layer for audit storage
//!
//! Raw evidence bytes are kept for audit purposes only. Writes are
//! best-effort: the dispatcher logs a failed write and carries on.
//!
//! Objects are content-addressed by SHA-256 so that resubmitting the same
//! photo does not store it twice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Receipt for a persisted evidence object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvidence {
    /// Hex SHA-256 of the bytes
    pub digest: String,
    pub content_type: String,
    pub size: u64,
    /// Backend-specific location, e.g. a filesystem path
    pub location: String,
}

pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Persist `bytes`. Storing identical content twice is not an error.
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<StoredEvidence, StorageError>;

    async fn get(&self, digest: &str) -> Result<Vec<u8>, StorageError>;

    async fn health_check(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_digest_is_sha256_hex() {
        assert_eq!(
            content_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
