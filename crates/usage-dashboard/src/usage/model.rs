//! Usage snapshot types.

use chrono::DateTime;
use serde::Serialize;

/// Rendered for a missing or non-numeric timestamp.
pub const DATE_NOT_AVAILABLE: &str = "N/A";

/// Rendered for a numeric timestamp that does not map to a calendar date.
pub const DATE_INVALID: &str = "Invalid Date";

/// Usage figures reported for one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageData {
    /// Credits granted for the billing period
    pub total_allowance: i64,

    /// Credits consumed so far (`orgTotalTokensUsed`)
    pub total_used: i64,

    /// Consumption ratio as reported by the remote side
    pub used_ratio: f64,

    /// Billing period start, `YYYY-MM-DD`
    pub start_date: String,

    /// Billing period end, `YYYY-MM-DD`
    pub end_date: String,
}

impl UsageData {
    pub fn remaining(&self) -> i64 {
        self.total_allowance - self.total_used
    }
}

/// Classification of a key in an aggregate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Fetched, with a positive remaining balance
    Valid,
    /// Fetched, with zero or negative remaining balance
    Exhausted,
    /// The fetch failed
    Invalid,
}

/// Either the usage figures or the reason the fetch failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SnapshotOutcome {
    Usage(UsageData),
    Error { error: String },
}

/// Remote usage state of one credential at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    /// ID of the credential this snapshot belongs to
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub masked_key: String,

    #[serde(flatten)]
    pub outcome: SnapshotOutcome,
}

impl UsageSnapshot {
    pub fn usage(&self) -> Option<&UsageData> {
        match &self.outcome {
            SnapshotOutcome::Usage(data) => Some(data),
            SnapshotOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            SnapshotOutcome::Usage(_) => None,
            SnapshotOutcome::Error { error } => Some(error),
        }
    }

    pub fn status(&self) -> KeyStatus {
        match self.usage() {
            Some(data) if data.remaining() > 0 => KeyStatus::Valid,
            Some(_) => KeyStatus::Exhausted,
            None => KeyStatus::Invalid,
        }
    }
}

/// Render an epoch-millisecond timestamp as `YYYY-MM-DD` (UTC).
///
/// Missing, null, zero, or non-numeric values render as `N/A`; numbers
/// outside the representable date range render as `Invalid Date`.
pub fn format_epoch_date(value: Option<&serde_json::Value>) -> String {
    let millis = match value.and_then(serde_json::Value::as_f64) {
        Some(ms) if ms != 0.0 => ms,
        _ => return DATE_NOT_AVAILABLE.to_string(),
    };

    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return DATE_INVALID.to_string();
    }

    match DateTime::from_timestamp_millis(millis as i64) {
        Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
        None => DATE_INVALID.to_string(),
    }
}
