//! # Catalog Storage
//!
//! The registry talks to persistence through [`CatalogStore`]. The store is
//! responsible for one thing the registry relies on: `(provider, key)` is
//! unique, and writes carry the revision they expect to replace so that two
//! writers racing on the same key cannot both win.
//!
//! [`InMemoryCatalog`] is the in-process implementation used by the server
//! and the tests. A relational store plugs in behind the same trait.

use super::model::{ModelSet, Provider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

/// Storage-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Uniqueness violation or stale revision
    Conflict { provider: Provider, key: String },

    /// No row for this `(provider, key)`
    NotFound { provider: Provider, key: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict { provider, key } => {
                write!(f, "model set {}/{} was modified concurrently", provider, key)
            }
            StoreError::NotFound { provider, key } => {
                write!(f, "model set {}/{} does not exist", provider, key)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence port for model sets.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get(&self, provider: Provider, key: &str) -> Result<Option<ModelSet>, StoreError>;

    /// All sets for a provider, ordered by key.
    async fn list(&self, provider: Provider) -> Result<Vec<ModelSet>, StoreError>;

    /// Insert a new row with revision 1.
    ///
    /// Returns `Conflict` if the `(provider, key)` already exists.
    async fn insert(&self, set: ModelSet) -> Result<ModelSet, StoreError>;

    /// Replace an existing row if its revision is still `expected_revision`.
    ///
    /// The stored id and `created_at` are kept; the revision is bumped.
    /// Returns `NotFound` if the row vanished and `Conflict` if it moved on.
    async fn update(&self, set: ModelSet, expected_revision: u64) -> Result<ModelSet, StoreError>;

    async fn delete(&self, provider: Provider, key: &str) -> Result<ModelSet, StoreError>;

    /// Total number of rows across providers.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Catalog kept in memory behind an async `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    rows: RwLock<HashMap<(Provider, String), ModelSet>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn get(&self, provider: Provider, key: &str) -> Result<Option<ModelSet>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(provider, key.to_string())).cloned())
    }

    async fn list(&self, provider: Provider) -> Result<Vec<ModelSet>, StoreError> {
        let rows = self.rows.read().await;
        let mut sets: Vec<ModelSet> = rows
            .values()
            .filter(|set| set.provider == provider)
            .cloned()
            .collect();
        sets.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(sets)
    }

    async fn insert(&self, mut set: ModelSet) -> Result<ModelSet, StoreError> {
        let mut rows = self.rows.write().await;
        let id = (set.provider, set.key.clone());
        if rows.contains_key(&id) {
            return Err(StoreError::Conflict {
                provider: set.provider,
                key: set.key,
            });
        }

        set.revision = 1;
        rows.insert(id, set.clone());
        Ok(set)
    }

    async fn update(&self, mut set: ModelSet, expected_revision: u64) -> Result<ModelSet, StoreError> {
        let mut rows = self.rows.write().await;
        let existing = match rows.get_mut(&(set.provider, set.key.clone())) {
            Some(existing) => existing,
            None => {
                return Err(StoreError::NotFound {
                    provider: set.provider,
                    key: set.key,
                })
            }
        };

        if existing.revision != expected_revision {
            return Err(StoreError::Conflict {
                provider: set.provider,
                key: set.key,
            });
        }

        set.id = existing.id;
        set.created_at = existing.created_at;
        set.revision = expected_revision + 1;
        *existing = set.clone();
        Ok(set)
    }

    async fn delete(&self, provider: Provider, key: &str) -> Result<ModelSet, StoreError> {
        let mut rows = self.rows.write().await;
        rows.remove(&(provider, key.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                provider,
                key: key.to_string(),
            })
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.rows.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn set(provider: Provider, key: &str, path: &str) -> ModelSet {
        let now = Utc::now();
        ModelSet {
            id: Uuid::new_v4(),
            provider,
            key: key.to_string(),
            display_name: key.to_string(),
            path: PathBuf::from(path),
            entries: vec![],
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_enforces_uniqueness() {
        let store = InMemoryCatalog::new();
        let first = store.insert(set(Provider::Asr, "base", "/m/whisper/base")).await.unwrap();
        assert_eq!(first.revision, 1);

        let err = store.insert(set(Provider::Asr, "base", "/m/whisper/other")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // Same key under another provider is a different row
        store.insert(set(Provider::Diarizer, "base", "/m/pyannote/base")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_checks_revision() {
        let store = InMemoryCatalog::new();
        let stored = store.insert(set(Provider::Asr, "base", "/m/whisper/base")).await.unwrap();

        let mut changed = set(Provider::Asr, "base", "/m/whisper/base-v2");
        changed.id = Uuid::new_v4();
        let updated = store.update(changed.clone(), stored.revision).await.unwrap();
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.id, stored.id);
        assert_eq!(updated.created_at, stored.created_at);

        let err = store.update(changed, stored.revision).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = InMemoryCatalog::new();
        store.insert(set(Provider::Asr, "small", "/m/whisper/small")).await.unwrap();
        store.insert(set(Provider::Asr, "base", "/m/whisper/base")).await.unwrap();
        store.insert(set(Provider::Diarizer, "seg", "/m/pyannote/seg")).await.unwrap();

        let keys: Vec<String> = store
            .list(Provider::Asr)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, vec!["base", "small"]);

        store.delete(Provider::Asr, "base").await.unwrap();
        assert!(store.get(Provider::Asr, "base").await.unwrap().is_none());
        assert!(matches!(
            store.delete(Provider::Asr, "base").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
