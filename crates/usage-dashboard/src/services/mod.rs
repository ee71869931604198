//! Service layer for the usage dashboard.
//!
//! Services hold the dashboard's behavior and coordinate between the HTTP
//! handlers, the credential store, and the usage fetcher.

pub mod aggregator;
pub mod credential;
pub mod duplicates;

pub use aggregator::{AggregateProgress, AggregateView, Aggregator, Classification};
pub use credential::{CredentialService, DeleteReport, ImportResult, NewCredential};
pub use duplicates::{find_duplicates, resolve_duplicates, DuplicateGroup};
