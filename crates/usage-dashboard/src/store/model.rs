//! Credential model.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::mask::mask_secret;

/// A stored API key plus its metadata.
///
/// `Debug` is implemented by hand so the key never ends up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Unique credential ID
    pub id: String,

    /// The API key itself
    pub key: String,

    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,

    /// Optional free-text note
    #[serde(default)]
    pub note: Option<String>,

    /// Creation time, epoch milliseconds
    pub created_at: i64,
}

impl Credential {
    /// Create a credential with a fresh ID, stamped with the current time.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.into(),
            name: None,
            note: None,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn masked_key(&self) -> String {
        mask_secret(&self.key)
    }

    /// API-facing view with the key masked.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            note: self.note.clone(),
            masked_key: self.masked_key(),
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("key", &self.masked_key())
            .field("name", &self.name)
            .field("note", &self.note)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Credential as returned by list/get endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    pub masked_key: String,

    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_credentials_get_distinct_ids() {
        let a = Credential::new("fk-1111222233334444");
        let b = Credential::new("fk-1111222233334444");
        assert_ne!(a.id, b.id);
        assert!(a.created_at > 0);
    }

    #[test]
    fn test_debug_masks_key() {
        let credential = Credential::new("fk-supersecretvalue");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("fk-s...alue"));
    }

    #[test]
    fn test_summary_omits_key() {
        let credential = Credential::new("fk-supersecretvalue").with_name(Some("team".into()));
        let json = serde_json::to_value(credential.summary()).unwrap();
        assert_eq!(json["masked_key"], "fk-s...alue");
        assert_eq!(json["name"], "team");
        assert!(json.get("key").is_none());
        assert!(json.get("note").is_none());
    }
}
