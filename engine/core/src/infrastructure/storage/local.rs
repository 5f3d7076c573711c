// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Evidence Store
//!
//! Content-addressed object store for single-node deployments. An object
//! with digest `abcdef…` lives at `<base>/ab/abcdef…`. Writes go to a
//! temporary file in the shard directory and are renamed into place, so a
//! reader never observes a partial object.
//!
//! **Limitations:**
//! - Objects are only reachable from the local machine
//! - No retention policy; cleanup is an operator task

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::evidence_store::{content_digest, EvidenceStore, StorageError, StoredEvidence};

pub struct LocalEvidenceStore {
    /// Base directory for all objects (e.g., "/var/lib/protocollm/evidence")
    base_path: PathBuf,
}

impl LocalEvidenceStore {
    /// Create the store, making sure the base directory exists and is writable.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::IoError(format!(
                "Failed to create base directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let test_file = base_path.join(".protocollm-storage-test");
        std::fs::write(&test_file, b"test").map_err(|e| {
            StorageError::PermissionDenied(format!(
                "Base directory {} is not writable: {}",
                base_path.display(),
                e
            ))
        })?;
        std::fs::remove_file(&test_file)
            .map_err(|e| StorageError::IoError(format!("Failed to cleanup test file: {}", e)))?;

        Ok(Self { base_path })
    }

    fn object_path(&self, digest: &str) -> Result<PathBuf, StorageError> {
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest(digest.to_string()));
        }
        let digest = digest.to_ascii_lowercase();
        Ok(self.base_path.join(&digest[..2]).join(digest))
    }
}

fn io_error(e: std::io::Error) -> StorageError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(e.to_string()),
        _ => StorageError::IoError(e.to_string()),
    }
}

#[async_trait]
impl EvidenceStore for LocalEvidenceStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> Result<StoredEvidence, StorageError> {
        let digest = content_digest(bytes);
        let path = self.object_path(&digest)?;

        if !tokio::fs::try_exists(&path).await.map_err(io_error)? {
            let shard = path
                .parent()
                .ok_or_else(|| StorageError::IoError("object path has no parent".to_string()))?
                .to_path_buf();
            tokio::fs::create_dir_all(&shard).await.map_err(io_error)?;

            let staging = shard.join(format!(".{}.partial-{}", digest, uuid::Uuid::new_v4()));
            tokio::fs::write(&staging, bytes).await.map_err(io_error)?;
            if let Err(e) = tokio::fs::rename(&staging, &path).await {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(io_error(e));
            }
            debug!(%digest, size = bytes.len(), "Stored evidence object");
        }

        Ok(StoredEvidence {
            digest,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            location: path.display().to_string(),
        })
    }

    async fn get(&self, digest: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(digest)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(digest.to_string()))
            }
            Err(e) => Err(io_error(e)),
        }
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let metadata = tokio::fs::metadata(&self.base_path).await.map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", self.base_path.display(), e))
        })?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.base_path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_roundtrip_is_content_addressed() {
        let dir = TempDir::new().unwrap();
        let store = LocalEvidenceStore::new(dir.path()).unwrap();

        let stored = store.put(b"walk-in cooler photo", "image/jpeg").await.unwrap();
        assert_eq!(stored.digest, content_digest(b"walk-in cooler photo"));
        assert!(stored.location.ends_with(&stored.digest));
        assert!(dir.path().join(&stored.digest[..2]).is_dir());

        assert_eq!(store.get(&stored.digest).await.unwrap(), b"walk-in cooler photo");
    }

    #[tokio::test]
    async fn test_duplicate_put_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = LocalEvidenceStore::new(dir.path()).unwrap();

        let first = store.put(b"same", "image/png").await.unwrap();
        let second = store.put(b"same", "image/png").await.unwrap();
        assert_eq!(first, second);

        let shard = std::fs::read_dir(dir.path().join(&first.digest[..2])).unwrap();
        assert_eq!(shard.count(), 1);
    }

    #[tokio::test]
    async fn test_get_rejects_bad_digest_and_missing_object() {
        let dir = TempDir::new().unwrap();
        let store = LocalEvidenceStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.get("../etc/passwd").await,
            Err(StorageError::InvalidDigest(_))
        ));
        assert!(matches!(
            store.get(&content_digest(b"never stored")).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(store.health_check().await.is_ok());
    }
}
