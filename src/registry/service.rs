//! # Model Registry Service
//!
//! The only way model sets get into (or out of) the catalog. Every path that
//! is written goes through the resolver and the validator first, and a write
//! happens only after *all* paths in the request have been accepted.
//!
//! ## Write protocol:
//! 1. Resolve and validate the set path and every entry path
//! 2. Read the current row for `(provider, key)`
//! 3. Insert, update (with the revision just read) or skip if nothing changed
//! 4. On a storage conflict, go back to 2 exactly once
//! 5. Publish one registry event for the committed change
//!
//! Reads return rows as stored. A row written on another host keeps its
//! foreign path until someone calls [`ModelRegistryService::rebase_set`].

use super::events::{EventSink, RegistryAction, RegistryEvent};
use super::model::{ModelEntry, ModelSet, Provider};
use super::store::{CatalogStore, StoreError};
use crate::error::{AppError, AppResult};
use crate::paths::{self, ResolvedPath, TrustedRoots};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// A model artifact as submitted by a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryRequest {
    pub name: String,

    /// Candidate path; defaults to `<set path>/<name>`
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub requires_accelerator: bool,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Create-or-update request for one model set.
#[derive(Debug, Clone)]
pub struct UpsertSetRequest {
    pub provider: Provider,
    pub key: String,
    pub display_name: String,

    /// Untrusted candidate path for the set
    pub path: String,

    pub entries: Vec<EntryRequest>,

    /// Free text copied into the event log
    pub note: Option<String>,
}

/// Catalog operations with path resolution and validation in front.
pub struct ModelRegistryService {
    store: Arc<dyn CatalogStore>,
    events: Arc<dyn EventSink>,
    roots: RwLock<Arc<TrustedRoots>>,
}

impl ModelRegistryService {
    pub fn new(store: Arc<dyn CatalogStore>, events: Arc<dyn EventSink>, roots: TrustedRoots) -> Self {
        Self {
            store,
            events,
            roots: RwLock::new(Arc::new(roots)),
        }
    }

    /// Snapshot of the trusted roots in effect right now.
    pub fn roots(&self) -> Arc<TrustedRoots> {
        let roots = self.roots.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&roots)
    }

    /// Swap in new trusted roots without restarting.
    ///
    /// Requests already in flight finish with the roots they started with.
    pub fn replace_roots(&self, roots: TrustedRoots) {
        info!(
            current = %roots.current().display(),
            legacy = %roots.legacy().display(),
            anchors = ?roots.anchors(),
            "Trusted model roots replaced"
        );
        let mut guard = self.roots.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(roots);
    }

    /// Resolve a candidate path and check it lands inside a trusted root.
    pub fn resolve_path(&self, candidate: &str) -> AppResult<ResolvedPath> {
        resolve_and_validate(candidate, &self.roots())
    }

    /// Containment check only, for paths that need no rebasing.
    ///
    /// Read paths use this to flag stored rows that need rebasing, so a
    /// rejection is returned without being logged.
    pub fn validate_path(&self, path: &Path) -> AppResult<paths::RootKind> {
        Ok(paths::validate(path, &self.roots())?)
    }

    /// Create or update a model set.
    ///
    /// ## Returns:
    /// - **Ok(ModelSet)**: the row as stored (unchanged if the request
    ///   matched the existing row exactly)
    /// - **Err(UnresolvablePath / InvalidPath)**: a path was refused; nothing
    ///   was written and no event was published
    /// - **Err(Conflict)**: the row kept changing under us after one retry
    pub async fn upsert_set(&self, request: UpsertSetRequest, actor: &str) -> AppResult<ModelSet> {
        let key = validate_key(&request.key)?;
        let display_name = match request.display_name.trim() {
            "" => key.clone(),
            name => name.to_string(),
        };

        let roots = self.roots();
        let resolved = resolve_and_validate(&request.path, &roots)?;
        let entries = resolve_entries(&request.entries, resolved.as_path(), &roots)?;

        let now = Utc::now();
        let candidate = ModelSet {
            id: Uuid::new_v4(),
            provider: request.provider,
            key,
            display_name,
            path: resolved.into_path_buf(),
            entries,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        let (stored, action) = self.write_with_retry(candidate).await?;

        match action {
            Some(action) => {
                info!(
                    provider = %stored.provider,
                    key = %stored.key,
                    path = %stored.path.display(),
                    revision = stored.revision,
                    %action,
                    actor,
                    "Model set saved"
                );
                self.events.publish(RegistryEvent::new(
                    action,
                    stored.provider,
                    &stored.key,
                    &stored.display_name,
                    actor,
                    request.note,
                ));
            }
            None => info!(provider = %stored.provider, key = %stored.key, "Model set unchanged"),
        }

        Ok(stored)
    }

    /// All sets for a provider, as stored. No resolution happens here.
    pub async fn list_sets(&self, provider: Provider) -> AppResult<Vec<ModelSet>> {
        Ok(self.store.list(provider).await?)
    }

    pub async fn get_set(&self, provider: Provider, key: &str) -> AppResult<ModelSet> {
        self.store
            .get(provider, key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("model set {}/{} does not exist", provider, key)))
    }

    /// Remove a model set and its entries.
    pub async fn delete_set(
        &self,
        provider: Provider,
        key: &str,
        actor: &str,
        note: Option<String>,
    ) -> AppResult<ModelSet> {
        let removed = self.store.delete(provider, key).await?;
        info!(provider = %provider, key, actor, "Model set deleted");

        self.events.publish(RegistryEvent::new(
            RegistryAction::Delete,
            provider,
            &removed.key,
            &removed.display_name,
            actor,
            note,
        ));
        Ok(removed)
    }

    /// Re-run resolution on a stored row, e.g. after the catalog was copied
    /// from another host. The stored paths are used as candidates.
    pub async fn rebase_set(&self, provider: Provider, key: &str, actor: &str) -> AppResult<ModelSet> {
        let existing = self.get_set(provider, key).await?;

        let request = UpsertSetRequest {
            provider,
            key: existing.key.clone(),
            display_name: existing.display_name.clone(),
            path: existing.path.to_string_lossy().into_owned(),
            entries: existing
                .entries
                .iter()
                .map(|entry| EntryRequest {
                    name: entry.name.clone(),
                    path: Some(entry.path.to_string_lossy().into_owned()),
                    requires_accelerator: entry.requires_accelerator,
                    notes: entry.notes.clone(),
                })
                .collect(),
            note: Some(format!("rebased from {}", existing.path.display())),
        };

        self.upsert_set(request, actor).await
    }

    /// Number of catalog rows across providers.
    pub async fn catalog_size(&self) -> AppResult<usize> {
        Ok(self.store.count().await?)
    }

    /// Insert or update `candidate`, retrying once on a storage conflict.
    ///
    /// The returned action is `None` when the stored row already matched.
    async fn write_with_retry(&self, candidate: ModelSet) -> AppResult<(ModelSet, Option<RegistryAction>)> {
        let mut retried = false;

        loop {
            let attempt = match self.store.get(candidate.provider, &candidate.key).await? {
                None => self
                    .store
                    .insert(candidate.clone())
                    .await
                    .map(|stored| (stored, Some(RegistryAction::Create))),
                Some(existing) if existing.same_content(&candidate) => return Ok((existing, None)),
                Some(existing) => self
                    .store
                    .update(candidate.clone(), existing.revision)
                    .await
                    .map(|stored| (stored, Some(RegistryAction::Update))),
            };

            match attempt {
                Ok(written) => return Ok(written),
                Err(StoreError::Conflict { .. } | StoreError::NotFound { .. }) if !retried => {
                    warn!(
                        provider = %candidate.provider,
                        key = %candidate.key,
                        "Concurrent write on model set, retrying once"
                    );
                    retried = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn resolve_and_validate(candidate: &str, roots: &TrustedRoots) -> AppResult<ResolvedPath> {
    let resolved = paths::resolve(candidate, roots)?;
    ensure_contained(resolved.as_path(), roots)?;
    Ok(resolved)
}

fn ensure_contained(path: &Path, roots: &TrustedRoots) -> AppResult<paths::RootKind> {
    paths::validate(path, roots).map_err(|err| {
        warn!(path = %path.display(), error = %err, "rejected model path");
        err.into()
    })
}

fn resolve_entries(
    requests: &[EntryRequest],
    set_path: &Path,
    roots: &TrustedRoots,
) -> AppResult<Vec<ModelEntry>> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(requests.len());

    for request in requests {
        let name = request.name.trim();
        if !is_plain_name(name) {
            return Err(AppError::ValidationError(format!("invalid model entry name '{}'", name)));
        }
        if !seen.insert(name.to_string()) {
            return Err(AppError::ValidationError(format!("duplicate model entry '{}'", name)));
        }

        let path = match request.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(candidate) => resolve_and_validate(candidate, roots)?.into_path_buf(),
            None => {
                let default = set_path.join(name);
                ensure_contained(&default, roots)?;
                default
            }
        };

        entries.push(ModelEntry {
            name: name.to_string(),
            path,
            requires_accelerator: request.requires_accelerator,
            notes: request.notes.clone(),
        });
    }

    Ok(entries)
}

fn validate_key(key: &str) -> AppResult<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::ValidationError("model set key cannot be empty".to_string()));
    }
    if !is_plain_name(key) {
        return Err(AppError::ValidationError(format!("invalid model set key '{}'", key)));
    }
    Ok(key.to_string())
}

/// A single path segment: non-empty, no separators, not `.` or `..`.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}
