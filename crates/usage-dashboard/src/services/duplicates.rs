//! Duplicate key detection and resolution.
//!
//! Keys are grouped by exact byte equality. The first member of a group in
//! store iteration order (creation order) is canonical and survives; every
//! other member is deleted.

use serde::Serialize;
use std::collections::HashMap;

use super::credential::DeleteReport;
use crate::mask::mask_secret;
use crate::store::{Credential, CredentialStore};

/// Credentials sharing one key. `ids[0]` is the canonical member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub masked_key: String,
    pub ids: Vec<String>,
    pub count: usize,
}

impl DuplicateGroup {
    pub fn canonical_id(&self) -> &str {
        &self.ids[0]
    }

    /// Members to delete, i.e. everything but the canonical one.
    pub fn redundant_ids(&self) -> &[String] {
        &self.ids[1..]
    }
}

/// Group credentials by identical key, keeping only groups of two or more.
///
/// Groups come out in the order their canonical member appears in
/// `credentials`; members within a group keep that order too.
pub fn find_duplicates(credentials: &[Credential]) -> Vec<DuplicateGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut members: HashMap<&str, Vec<&str>> = HashMap::new();

    for credential in credentials {
        let ids = members.entry(credential.key.as_str()).or_insert_with(|| {
            order.push(credential.key.as_str());
            Vec::new()
        });
        ids.push(credential.id.as_str());
    }

    order
        .into_iter()
        .filter_map(|key| {
            let ids = &members[key];
            (ids.len() > 1).then(|| DuplicateGroup {
                masked_key: mask_secret(key),
                ids: ids.iter().map(|id| id.to_string()).collect(),
                count: ids.len(),
            })
        })
        .collect()
}

/// Delete every non-canonical member of each group.
///
/// Deletes are independent: one failing does not stop the rest, and
/// nothing is rolled back.
pub async fn resolve_duplicates(
    store: &dyn CredentialStore,
    groups: &[DuplicateGroup],
) -> DeleteReport {
    let mut report = DeleteReport::default();

    for group in groups {
        for id in group.redundant_ids() {
            match store.delete(id).await {
                Ok(true) => report.deleted += 1,
                Ok(false) => {
                    tracing::debug!(id = %id, "Duplicate already gone");
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Failed to delete duplicate key");
                    report.failed_ids.push(id.clone());
                }
            }
        }

        tracing::info!(
            key = %group.masked_key,
            kept = %group.canonical_id(),
            removed = group.count - 1,
            "Resolved duplicate group"
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::aggregator::tests::credential;
    use crate::store::MemoryStore;

    #[test]
    fn test_groups_only_repeated_keys() {
        let credentials = vec![
            credential("D", "fk-shared-key-1234", 1),
            credential("X", "fk-unique-key-0000", 2),
            credential("E", "fk-shared-key-1234", 3),
        ];

        let groups = find_duplicates(&credentials);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids, vec!["D", "E"]);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].canonical_id(), "D");
        assert_eq!(groups[0].masked_key, "fk-s...1234");
    }

    #[test]
    fn test_no_normalization() {
        let credentials = vec![
            credential("a", "fk-Key-00000001", 1),
            credential("b", "fk-key-00000001", 2),
            credential("c", "fk-key-00000001 ", 3),
        ];
        assert!(find_duplicates(&credentials).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let credentials = vec![
            credential("1", "fk-aaaaaaaaaaaa", 1),
            credential("2", "fk-bbbbbbbbbbbb", 2),
            credential("3", "fk-aaaaaaaaaaaa", 3),
            credential("4", "fk-bbbbbbbbbbbb", 4),
            credential("5", "fk-aaaaaaaaaaaa", 5),
        ];
        let first = find_duplicates(&credentials);
        let second = find_duplicates(&credentials);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].ids, vec!["1", "3", "5"]);
        assert_eq!(first[1].ids, vec!["2", "4"]);
    }

    #[tokio::test]
    async fn test_resolve_keeps_earliest() {
        let store = MemoryStore::new();
        store.put(credential("D", "fk-shared-key-1234", 10)).await.unwrap();
        store.put(credential("E", "fk-shared-key-1234", 20)).await.unwrap();
        store.put(credential("F", "fk-shared-key-1234", 30)).await.unwrap();
        store.put(credential("G", "fk-lonely-key-9999", 40)).await.unwrap();

        let groups = find_duplicates(&store.list().await.unwrap());
        let report = resolve_duplicates(&store, &groups).await;

        assert_eq!(report.deleted, 2);
        assert!(report.failed_ids.is_empty());

        let remaining: Vec<String> = store.list().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec!["D", "G"]);
        assert!(find_duplicates(&store.list().await.unwrap()).is_empty());
    }
}
