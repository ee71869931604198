//! Credential service: the operations the HTTP layer exposes.
//!
//! Wraps the store with import/delete/cleanup batches, duplicate handling,
//! and a cache of the last aggregate view. Every write invalidates the
//! cache.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::aggregator::{AggregateView, Aggregator};
use super::duplicates::{self, DuplicateGroup};
use crate::error::{AppError, AppResult};
use crate::mask::mask_secret;
use crate::result_ext::{OptionResultExt, ResultExt};
use crate::store::{Credential, CredentialStore, CredentialSummary};

/// Input for adding a single key.
#[derive(Debug, Clone, Default)]
pub struct NewCredential {
    pub key: String,
    pub name: Option<String>,
    pub note: Option<String>,
}

/// Outcome of a batch import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub success: usize,
    pub failed: usize,
    pub duplicates: usize,
    /// Masked forms of the keys skipped as duplicates
    pub duplicate_keys: Vec<String>,
}

/// Outcome of a batch delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    /// Credentials actually removed
    pub deleted: usize,
    /// IDs whose delete failed
    pub failed_ids: Vec<String>,
}

#[derive(Default)]
struct ViewCache {
    generation: u64,
    view: Option<AggregateView>,
}

/// Service for credential operations.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    aggregator: Aggregator,
    cache: Arc<RwLock<ViewCache>>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn CredentialStore>, aggregator: Aggregator) -> Self {
        Self {
            store,
            aggregator,
            cache: Arc::new(RwLock::new(ViewCache::default())),
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// All credentials, masked, in store order.
    pub async fn list(&self) -> AppResult<Vec<CredentialSummary>> {
        let credentials = self.store.list().await?;
        Ok(credentials.iter().map(Credential::summary).collect())
    }

    pub async fn get(&self, id: &str) -> AppResult<CredentialSummary> {
        Ok(self.find(id).await?.summary())
    }

    /// Add one key. Blank keys are rejected, and so is a key already stored.
    pub async fn add(&self, request: NewCredential) -> AppResult<CredentialSummary> {
        let key = request.key.trim();
        if key.is_empty() {
            return Err(AppError::Validation("key must not be empty".to_string()));
        }

        let existing = self.store.list().await?;
        if existing.iter().any(|c| c.key == key) {
            return Err(AppError::Conflict(format!(
                "key {} already exists",
                mask_secret(key)
            )));
        }

        let credential = Credential::new(key)
            .with_name(non_blank(request.name.as_deref()))
            .with_note(non_blank(request.note.as_deref()));
        let summary = credential.summary();

        self.store.put(credential).await.log("storing new key")?;
        self.invalidate().await;

        tracing::info!(id = %summary.id, key = %summary.masked_key, "Key added");
        Ok(summary)
    }

    /// The full, unmasked key.
    pub async fn reveal(&self, id: &str) -> AppResult<String> {
        let credential = self.find(id).await?;
        tracing::info!(id = %id, "Key revealed");
        Ok(credential.key)
    }

    /// Every stored key, unmasked, in store order.
    pub async fn export(&self) -> AppResult<Vec<String>> {
        let credentials = self.store.list().await.log("listing keys for export")?;
        tracing::info!(count = credentials.len(), "Keys exported");
        Ok(credentials.into_iter().map(|c| c.key).collect())
    }

    /// Set or clear the note of a key. A blank note clears it.
    pub async fn set_note(&self, id: &str, note: Option<&str>) -> AppResult<CredentialSummary> {
        let credential = self.find(id).await?.with_note(non_blank(note));
        let summary = credential.summary();

        self.store.put(credential).await.log("updating key note")?;
        self.invalidate().await;

        Ok(summary)
    }

    /// Delete a single key. Unlike batch deletes, a missing ID is reported.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if !self.store.delete(id).await? {
            return Err(AppError::NotFound(format!("Key '{}' not found", id)));
        }
        self.invalidate().await;
        tracing::info!(id = %id, "Key deleted");
        Ok(())
    }

    /// Import keys, one per entry. Blank entries are ignored and keys
    /// already stored (or repeated in the input) are skipped as duplicates.
    /// A failed insert is counted and the import carries on.
    pub async fn batch_import(&self, secrets: &[String]) -> AppResult<ImportResult> {
        let existing = self
            .store
            .list()
            .await
            .log("listing keys before import")?;
        let mut known: HashSet<String> = existing.into_iter().map(|c| c.key).collect();
        let mut result = ImportResult::default();

        for raw in secrets {
            let key = raw.trim();
            if key.is_empty() {
                continue;
            }

            if known.contains(key) {
                result.duplicates += 1;
                result.duplicate_keys.push(mask_secret(key));
                continue;
            }

            match self.store.put(Credential::new(key)).await {
                Ok(()) => {
                    known.insert(key.to_string());
                    result.success += 1;
                }
                Err(e) => {
                    tracing::warn!(key = %mask_secret(key), error = %e, "Failed to import key");
                    result.failed += 1;
                }
            }
        }

        if result.success > 0 {
            self.invalidate().await;
        }

        tracing::info!(
            success = result.success,
            failed = result.failed,
            duplicates = result.duplicates,
            "Batch import finished"
        );

        Ok(result)
    }

    /// Delete keys concurrently. Missing IDs count as neither deleted nor
    /// failed; successful deletes are never rolled back.
    pub async fn batch_delete(&self, ids: &[String]) -> DeleteReport {
        let store = self.store.as_ref();
        let outcomes = join_all(
            ids.iter()
                .map(|id| async move { (id, store.delete(id).await) }),
        )
        .await;

        let mut report = DeleteReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(true) => report.deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Failed to delete key");
                    report.failed_ids.push(id.clone());
                }
            }
        }

        if report.deleted > 0 {
            self.invalidate().await;
        }

        tracing::info!(
            requested = ids.len(),
            deleted = report.deleted,
            failed = report.failed_ids.len(),
            "Batch delete finished"
        );

        report
    }

    /// Fetch usage for every stored key and cache the resulting view.
    pub async fn aggregate(&self) -> AppResult<AggregateView> {
        let generation = self.cache.read().await.generation;
        let credentials = self.store.list().await.log("listing keys for aggregation")?;

        let view = self.aggregator.aggregate(&credentials).await?;

        // A write during the fetch makes this view stale; don't cache it.
        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.view = Some(view.clone());
        }

        Ok(view)
    }

    /// The last aggregate view, unless a write has happened since.
    pub async fn cached_aggregate(&self) -> Option<AggregateView> {
        self.cache.read().await.view.clone()
    }

    pub async fn find_duplicates(&self) -> AppResult<Vec<DuplicateGroup>> {
        let credentials = self.store.list().await?;
        Ok(duplicates::find_duplicates(&credentials))
    }

    /// Delete the non-canonical members of `groups`.
    pub async fn resolve_duplicates(&self, groups: &[DuplicateGroup]) -> DeleteReport {
        let report = duplicates::resolve_duplicates(self.store.as_ref(), groups).await;
        if report.deleted > 0 {
            self.invalidate().await;
        }
        report
    }

    /// Delete every exhausted or unreachable key in `view`.
    pub async fn cleanup_invalid_and_zero(&self, view: &AggregateView) -> DeleteReport {
        let classification = view.classify();
        tracing::info!(
            exhausted = classification.exhausted.len(),
            invalid = classification.invalid.len(),
            "Cleaning up exhausted and invalid keys"
        );
        self.batch_delete(&classification.cleanup_targets()).await
    }

    async fn find(&self, id: &str) -> AppResult<Credential> {
        self.store
            .get(id)
            .await?
            .log_none(format!("looking up key {}", id))
            .ok_or_else(|| AppError::NotFound(format!("Key '{}' not found", id)))
    }

    async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        cache.generation += 1;
        cache.view = None;
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
