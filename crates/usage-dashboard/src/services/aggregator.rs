//! Concurrent usage aggregation.
//!
//! Fans one fetch per credential out behind a semaphore so at most
//! `concurrency` requests are in flight, then fans the snapshots back in
//! by position. The semaphore belongs to the aggregator, so the bound holds
//! across every caller sharing it, and runs are serialized so the progress
//! published on the watch channel always describes a single run.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::{AppError, AppResult};
use crate::store::Credential;
use crate::usage::{fetch_snapshot, KeyStatus, SnapshotOutcome, UsageSnapshot, UsageSource};

/// Default bound on in-flight usage requests.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Aggregated usage across all credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    /// One snapshot per credential, in input order
    pub snapshots: Vec<UsageSnapshot>,

    /// Sum of allowances over successful snapshots
    pub total_allowance: i64,

    /// Sum of consumed credits over successful snapshots
    pub total_used: i64,

    /// Number of credentials in the view, failed ones included
    pub total_count: usize,

    /// Computation time, epoch milliseconds
    pub computed_at: i64,
}

impl AggregateView {
    /// Build a view, computing totals from the successful snapshots.
    pub fn new(snapshots: Vec<UsageSnapshot>) -> Self {
        let (total_allowance, total_used) = sum_usage(snapshots.iter());
        Self {
            total_count: snapshots.len(),
            snapshots,
            total_allowance,
            total_used,
            computed_at: Utc::now().timestamp_millis(),
        }
    }

    /// Partition credential IDs by status.
    pub fn classify(&self) -> Classification {
        let mut classification = Classification::default();
        for snapshot in &self.snapshots {
            let bucket = match snapshot.status() {
                KeyStatus::Valid => &mut classification.valid,
                KeyStatus::Exhausted => &mut classification.exhausted,
                KeyStatus::Invalid => &mut classification.invalid,
            };
            bucket.push(snapshot.id.clone());
        }
        classification
    }
}

/// Credential IDs of an [`AggregateView`], split into disjoint classes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub valid: Vec<String>,
    pub exhausted: Vec<String>,
    pub invalid: Vec<String>,
}

impl Classification {
    /// Keys that should be removed by a cleanup: exhausted, then invalid.
    pub fn cleanup_targets(&self) -> Vec<String> {
        self.exhausted
            .iter()
            .chain(self.invalid.iter())
            .cloned()
            .collect()
    }
}

/// Partial state of the aggregation in progress (or the last one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateProgress {
    pub running: bool,
    pub completed: usize,
    pub total: usize,
    pub total_allowance: i64,
    pub total_used: i64,
}

/// Bounded fan-out/fan-in over a [`UsageSource`].
#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn UsageSource>,
    concurrency: usize,
    permits: Arc<Semaphore>,
    run_lock: Arc<Mutex<()>>,
    progress: Arc<watch::Sender<AggregateProgress>>,
}

impl Aggregator {
    pub fn new(source: Arc<dyn UsageSource>, concurrency: usize) -> Self {
        let (progress, _) = watch::channel(AggregateProgress::default());
        let concurrency = concurrency.max(1);
        Self {
            source,
            concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
            run_lock: Arc::new(Mutex::new(())),
            progress: Arc::new(progress),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> watch::Receiver<AggregateProgress> {
        self.progress.subscribe()
    }

    /// Latest published progress.
    pub fn progress(&self) -> AggregateProgress {
        *self.progress.borrow()
    }

    /// Fetch usage for every credential and aggregate the results.
    ///
    /// Per-credential failures become error snapshots; only an empty input
    /// is an error. A call made while another run is in progress waits for
    /// it to finish.
    pub async fn aggregate(&self, credentials: &[Credential]) -> AppResult<AggregateView> {
        if credentials.is_empty() {
            return Err(AppError::NoCredentials);
        }

        let _run = self.run_lock.lock().await;

        let total = credentials.len();
        self.progress.send_replace(AggregateProgress {
            running: true,
            total,
            ..AggregateProgress::default()
        });

        tracing::info!(
            total,
            concurrency = self.concurrency,
            "Starting usage aggregation"
        );

        let mut tasks = JoinSet::new();

        for (index, credential) in credentials.iter().cloned().enumerate() {
            let semaphore = self.permits.clone();
            let source = self.source.clone();
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, fetch_snapshot(source.as_ref(), &credential).await)
            });
        }

        let mut slots: Vec<Option<UsageSnapshot>> = vec![None; total];
        let mut completed = 0;
        let mut total_allowance = 0;
        let mut total_used = 0;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, snapshot)) => {
                    if let Some(data) = snapshot.usage() {
                        total_allowance += data.total_allowance;
                        total_used += data.total_used;
                    }
                    slots[index] = Some(snapshot);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Usage fetch task aborted");
                }
            }

            completed += 1;
            self.progress.send_replace(AggregateProgress {
                running: completed < total,
                completed,
                total,
                total_allowance,
                total_used,
            });
        }

        let snapshots: Vec<UsageSnapshot> = slots
            .into_iter()
            .zip(credentials)
            .map(|(slot, credential)| slot.unwrap_or_else(|| aborted_snapshot(credential)))
            .collect();

        let view = AggregateView::new(snapshots);

        tracing::info!(
            total = view.total_count,
            total_allowance = view.total_allowance,
            total_used = view.total_used,
            "Usage aggregation finished"
        );

        Ok(view)
    }
}

fn sum_usage<'a>(snapshots: impl Iterator<Item = &'a UsageSnapshot>) -> (i64, i64) {
    snapshots
        .filter_map(UsageSnapshot::usage)
        .fold((0, 0), |(allowance, used), data| {
            (allowance + data.total_allowance, used + data.total_used)
        })
}

fn aborted_snapshot(credential: &Credential) -> UsageSnapshot {
    UsageSnapshot {
        id: credential.id.clone(),
        name: credential.name.clone(),
        masked_key: credential.masked_key(),
        outcome: SnapshotOutcome::Error {
            error: "fetch failed".to_string(),
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::usage::{FetchError, UsageData};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Usage source answering from a fixed table, keyed by secret.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        responses: HashMap<String, Result<(i64, i64), FetchError>>,
        delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeSource {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_usage(mut self, secret: &str, allowance: i64, used: i64) -> Self {
            self.responses
                .insert(secret.to_string(), Ok((allowance, used)));
            self
        }

        pub(crate) fn with_error(mut self, secret: &str, error: FetchError) -> Self {
            self.responses.insert(secret.to_string(), Err(error));
            self
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UsageSource for FakeSource {
        async fn fetch(&self, secret: &str) -> Result<UsageData, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.responses.get(secret) {
                Some(Ok((allowance, used))) => Ok(UsageData {
                    total_allowance: *allowance,
                    total_used: *used,
                    used_ratio: *used as f64 / (*allowance).max(1) as f64,
                    start_date: "2025-01-01".to_string(),
                    end_date: "2025-02-01".to_string(),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Err(FetchError::Status(401)),
            }
        }
    }

    pub(crate) fn credential(id: &str, key: &str, created_at: i64) -> Credential {
        Credential {
            id: id.to_string(),
            key: key.to_string(),
            name: None,
            note: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let aggregator = Aggregator::new(Arc::new(FakeSource::new()), DEFAULT_CONCURRENCY);
        let result = aggregator.aggregate(&[]).await;
        assert!(matches!(result, Err(AppError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_totals_and_classification() {
        let source = FakeSource::new()
            .with_usage("key-a-000000", 1000, 400)
            .with_usage("key-b-000000", 500, 500)
            .with_error("key-c-000000", FetchError::Status(401));
        let aggregator = Aggregator::new(Arc::new(source), DEFAULT_CONCURRENCY);

        let credentials = vec![
            credential("A", "key-a-000000", 1),
            credential("B", "key-b-000000", 2),
            credential("C", "key-c-000000", 3),
        ];
        let view = aggregator.aggregate(&credentials).await.unwrap();

        assert_eq!(view.total_allowance, 1500);
        assert_eq!(view.total_used, 900);
        assert_eq!(view.total_count, 3);
        assert_eq!(view.snapshots[2].error(), Some("401"));

        let classes = view.classify();
        assert_eq!(classes.valid, vec!["A"]);
        assert_eq!(classes.exhausted, vec!["B"]);
        assert_eq!(classes.invalid, vec!["C"]);
        assert_eq!(classes.cleanup_targets(), vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_output_order_matches_input_and_bound_holds() {
        let mut source = FakeSource::new().with_delay(Duration::from_millis(20));
        let mut credentials = Vec::new();
        for i in 0..12 {
            let key = format!("fk-order-key-{:02}", i);
            source = source.with_usage(&key, 100 + i, i);
            credentials.push(credential(&format!("id-{:02}", i), &key, i));
        }
        let source = Arc::new(source);
        let aggregator = Aggregator::new(source.clone(), DEFAULT_CONCURRENCY);

        let view = aggregator.aggregate(&credentials).await.unwrap();

        let ids: Vec<&str> = view.snapshots.iter().map(|s| s.id.as_str()).collect();
        let expected: Vec<String> = (0..12).map(|i| format!("id-{:02}", i)).collect();
        assert_eq!(ids, expected);
        assert_eq!(source.calls(), 12);
        assert!(source.max_in_flight() <= DEFAULT_CONCURRENCY);
        assert!(source.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_failures_contribute_zero_to_totals() {
        let source = FakeSource::new()
            .with_usage("fk-one-0000001", 300, 100)
            .with_error("fk-two-0000002", FetchError::InvalidResponse)
            .with_error("fk-three-000003", FetchError::Transport("dns".into()));
        let aggregator = Aggregator::new(Arc::new(source), 2);

        let view = aggregator
            .aggregate(&[
                credential("1", "fk-one-0000001", 1),
                credential("2", "fk-two-0000002", 2),
                credential("3", "fk-three-000003", 3),
            ])
            .await
            .unwrap();

        assert_eq!(view.total_allowance, 300);
        assert_eq!(view.total_used, 100);
        assert_eq!(view.snapshots[1].error(), Some("invalid response structure"));
        assert_eq!(view.snapshots[2].error(), Some("fetch failed"));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_final() {
        let source = FakeSource::new()
            .with_delay(Duration::from_millis(5))
            .with_usage("fk-p1-00000001", 10, 1)
            .with_usage("fk-p2-00000002", 20, 2)
            .with_usage("fk-p3-00000003", 30, 3);
        let aggregator = Aggregator::new(Arc::new(source), 1);
        let mut rx = aggregator.subscribe();

        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let progress = *rx.borrow_and_update();
                seen.push(progress);
                if progress.total > 0 && progress.completed == progress.total {
                    break;
                }
            }
            seen
        });

        aggregator
            .aggregate(&[
                credential("p1", "fk-p1-00000001", 1),
                credential("p2", "fk-p2-00000002", 2),
                credential("p3", "fk-p3-00000003", 3),
            ])
            .await
            .unwrap();

        let seen = watcher.await.unwrap();
        for pair in seen.windows(2) {
            assert!(pair[1].completed >= pair[0].completed);
            assert!(pair[1].total_allowance >= pair[0].total_allowance);
        }

        let last = aggregator.progress();
        assert!(!last.running);
        assert_eq!(last.completed, 3);
        assert_eq!(last.total_allowance, 60);
        assert_eq!(last.total_used, 6);
    }

    #[tokio::test]
    async fn test_overlapping_runs_share_the_bound() {
        let mut source = FakeSource::new().with_delay(Duration::from_millis(50));
        let mut credentials = Vec::new();
        for i in 0..10 {
            let key = format!("fk-shared-key-{:02}", i);
            source = source.with_usage(&key, 10, 1);
            credentials.push(credential(&format!("s-{:02}", i), &key, i));
        }
        let source = Arc::new(source);
        let aggregator = Aggregator::new(source.clone(), DEFAULT_CONCURRENCY);
        let other = aggregator.clone();

        let (first, second) = tokio::join!(
            aggregator.aggregate(&credentials),
            other.aggregate(&credentials)
        );

        assert_eq!(first.unwrap().total_allowance, 100);
        assert_eq!(second.unwrap().total_allowance, 100);
        assert_eq!(source.calls(), 20);
        assert!(source.max_in_flight() <= DEFAULT_CONCURRENCY);

        let last = aggregator.progress();
        assert!(!last.running);
        assert_eq!(last.completed, 10);
        assert_eq!(last.total_allowance, 100);
    }
}
