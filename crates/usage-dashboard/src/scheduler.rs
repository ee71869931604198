//! Periodic usage refresh.
//!
//! Owns at most one background task that re-aggregates usage on a fixed
//! interval, keeping the cached view warm. The task is started, stopped,
//! and reset explicitly; nothing about it is global.

use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{AppError, AppResult};
use crate::services::CredentialService;

/// Current state of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    /// Seconds until the next refresh, when running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_refresh_in_secs: Option<u64>,
}

struct Running {
    handle: JoinHandle<()>,
    next_tick: Arc<Mutex<Instant>>,
}

/// Background auto-refresh of the aggregate view.
pub struct RefreshScheduler {
    service: CredentialService,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl RefreshScheduler {
    pub fn new(service: CredentialService, interval: Duration) -> Self {
        Self {
            service,
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Start refreshing. The first refresh happens one full interval from
    /// now. Starting an already running scheduler is a no-op.
    pub fn start(&self) -> AppResult<()> {
        let interval = self.interval();
        if interval.is_zero() {
            return Err(AppError::Validation(
                "refresh interval must be greater than zero".to_string(),
            ));
        }

        let mut running = lock(&self.running);
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Ok(());
        }

        let next_tick = Arc::new(Mutex::new(Instant::now() + interval));
        let handle = tokio::spawn(refresh_loop(
            self.service.clone(),
            interval,
            next_tick.clone(),
        ));

        *running = Some(Running { handle, next_tick });
        tracing::info!(interval_secs = interval.as_secs(), "Auto-refresh started");
        Ok(())
    }

    /// Stop refreshing. Stopping an idle scheduler is a no-op.
    pub fn stop(&self) {
        if let Some(running) = lock(&self.running).take() {
            running.handle.abort();
            tracing::info!("Auto-refresh stopped");
        }
    }

    /// Restart the countdown from a full interval.
    pub fn reset(&self) -> AppResult<()> {
        self.stop();
        self.start()
    }

    /// Time left until the next refresh, when running.
    pub fn next_refresh_in(&self) -> Option<Duration> {
        let running = lock(&self.running);
        let running = running.as_ref().filter(|r| !r.handle.is_finished())?;
        let next = *lock(&running.next_tick);
        Some(next.saturating_duration_since(Instant::now()))
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            interval_secs: self.interval().as_secs(),
            next_refresh_in_secs: self.next_refresh_in().map(|d| d.as_secs()),
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn refresh_loop(
    service: CredentialService,
    period: Duration,
    next_tick: Arc<Mutex<Instant>>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match service.aggregate().await {
            Ok(view) => tracing::debug!(
                total = view.total_count,
                total_used = view.total_used,
                "Auto-refresh completed"
            ),
            Err(AppError::NoCredentials) => {
                tracing::debug!("Auto-refresh skipped, no keys stored");
            }
            Err(e) => tracing::warn!(error = %e, "Auto-refresh failed"),
        }

        // Count the next period from the end of this refresh.
        ticker.reset();
        *lock(&next_tick) = Instant::now() + period;
    }
}

/// Lock a std mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
