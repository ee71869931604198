//! In-process credential store.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Credential, CredentialStore};
use crate::error::AppResult;

#[derive(Default)]
struct Inner {
    next_seq: u64,
    /// Insertion sequence -> credential
    entries: BTreeMap<u64, Credential>,
    /// Credential ID -> insertion sequence
    index: HashMap<String, u64>,
}

/// Credential store kept in memory. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn put(&self, credential: Credential) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        // Replacing keeps the original position in iteration order.
        let seq = match inner.index.get(&credential.id) {
            Some(seq) => *seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.index.insert(credential.id.clone(), seq);
                seq
            }
        };
        inner.entries.insert(seq, credential);
        Ok(())
    }

    async fn get(&self, id: &str) -> AppResult<Option<Credential>> {
        let inner = self.inner.read().await;
        Ok(inner
            .index
            .get(id)
            .and_then(|seq| inner.entries.get(seq))
            .cloned())
    }

    async fn list(&self) -> AppResult<Vec<Credential>> {
        let inner = self.inner.read().await;
        let mut credentials: Vec<Credential> = inner.entries.values().cloned().collect();
        // Stable sort: equal timestamps stay in insertion order.
        credentials.sort_by_key(|c| c.created_at);
        Ok(credentials)
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.index.remove(id) {
            Some(seq) => {
                inner.entries.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
