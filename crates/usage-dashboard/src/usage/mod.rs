//! Remote usage fetching and snapshot types.

mod fetcher;
mod model;

pub use fetcher::{fetch_snapshot, parse_usage, FetchError, HttpUsageFetcher, UsageSource};
pub use model::{format_epoch_date, KeyStatus, SnapshotOutcome, UsageData, UsageSnapshot};
