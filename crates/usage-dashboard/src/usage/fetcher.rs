//! Remote usage fetcher.
//!
//! One `GET` per key against the accounting endpoint, bearer-authenticated
//! with the key itself. Failures never escape as errors from
//! [`fetch_snapshot`]; they become error-tagged snapshots.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::model::{format_epoch_date, SnapshotOutcome, UsageData, UsageSnapshot};
use crate::store::Credential;

/// Why a usage fetch failed. The display form is the classification shown
/// to operators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The endpoint answered with a non-2xx status.
    #[error("{0}")]
    Status(u16),

    /// 2xx, but the body is not the expected `usage.standard` shape.
    #[error("invalid response structure")]
    InvalidResponse,

    /// The request never completed (DNS, connect, timeout, ...).
    #[error("fetch failed")]
    Transport(String),
}

/// Source of usage data for a single key.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn fetch(&self, secret: &str) -> Result<UsageData, FetchError>;
}

/// [`UsageSource`] backed by the remote accounting API.
#[derive(Clone)]
pub struct HttpUsageFetcher {
    client: reqwest::Client,
    api_url: String,
}

impl HttpUsageFetcher {
    /// Create a fetcher for `api_url`. No retries are made; `timeout`
    /// bounds each request.
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: api_url.to_string(),
        }
    }
}

#[async_trait]
impl UsageSource for HttpUsageFetcher {
    async fn fetch(&self, secret: &str) -> Result<UsageData, FetchError> {
        let response = self
            .client
            .get(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", secret))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let body: Value =
            serde_json::from_slice(&bytes).map_err(|_| FetchError::InvalidResponse)?;

        parse_usage(&body).ok_or(FetchError::InvalidResponse)
    }
}

/// Extract usage figures from an accounting API response body.
///
/// Returns `None` unless `usage` and `usage.standard` are objects and
/// `totalAllowance`, `orgTotalTokensUsed` and `usedRatio` are all numbers.
/// Fractional credit counts are rounded; timestamps go through
/// [`format_epoch_date`].
pub fn parse_usage(body: &Value) -> Option<UsageData> {
    let usage = body.get("usage")?.as_object()?;
    let standard = usage.get("standard")?.as_object()?;

    Some(UsageData {
        total_allowance: credits(standard.get("totalAllowance")?)?,
        total_used: credits(standard.get("orgTotalTokensUsed")?)?,
        used_ratio: standard.get("usedRatio")?.as_f64()?,
        start_date: format_epoch_date(usage.get("startDate")),
        end_date: format_epoch_date(usage.get("endDate")),
    })
}

fn credits(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))
}

/// Fetch usage for one credential and wrap the outcome in a snapshot.
pub async fn fetch_snapshot(source: &dyn UsageSource, credential: &Credential) -> UsageSnapshot {
    let masked_key = credential.masked_key();

    let outcome = match source.fetch(&credential.key).await {
        Ok(data) => SnapshotOutcome::Usage(data),
        Err(e) => {
            match &e {
                FetchError::Transport(detail) => tracing::warn!(
                    id = %credential.id,
                    key = %masked_key,
                    error = %detail,
                    "Usage request failed"
                ),
                _ => tracing::debug!(
                    id = %credential.id,
                    key = %masked_key,
                    reason = %e,
                    "Usage request rejected"
                ),
            }
            SnapshotOutcome::Error {
                error: e.to_string(),
            }
        }
    };

    UsageSnapshot {
        id: credential.id.clone(),
        name: credential.name.clone(),
        masked_key,
        outcome,
    }
}
