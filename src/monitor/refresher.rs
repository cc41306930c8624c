// Periodic resource refresh
//
// Background task that fetches a resource immediately, then on a fixed
// interval, and publishes the latest state over a watch channel. A failed
// refresh keeps the previous data and records the error next to it.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ApiClient, HealthStatus, RealtimeMetrics, UsageStats};
use crate::errors::ApiError;

type FetchFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// Snapshot of a refreshed resource
#[derive(Debug, Clone)]
pub struct ResourceState<T> {
    /// Last successfully fetched value, kept across failed refreshes
    pub data: Option<T>,
    pub loading: bool,
    /// Error from the most recent refresh, cleared on success
    pub error: Option<ApiError>,
    /// When `data` was last replaced
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            updated_at: None,
        }
    }
}

impl<T> ResourceState<T> {
    /// True when the shown data is older than the latest attempt
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }
}

/// Handle to a background refresh task; dropping it stops the task
pub struct Refresher<T> {
    state: watch::Receiver<ResourceState<T>>,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
}

impl<T> Refresher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start refreshing with `fetch` every `every`
    pub fn spawn<F, Fut>(name: &'static str, every: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Box::new(move || fetch().boxed());
        let (tx, rx) = watch::channel(ResourceState::default());
        let trigger = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        tokio::spawn(run(
            name,
            every.max(Duration::from_millis(1)),
            fetch,
            tx,
            Arc::clone(&trigger),
            cancel.clone(),
        ));

        Self {
            state: rx,
            trigger,
            cancel,
        }
    }

    /// Current state
    pub fn state(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.clone()
    }

    /// Fetch now instead of waiting for the next tick
    pub fn refresh_now(&self) {
        self.trigger.notify_one();
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Refresher<UsageStats> {
    pub fn usage(client: ApiClient, days: u32, every: Duration) -> Self {
        Self::spawn("usage", every, move || {
            let client = client.clone();
            async move { client.get_usage_stats(days).await }
        })
    }
}

impl Refresher<RealtimeMetrics> {
    pub fn realtime(client: ApiClient, every: Duration) -> Self {
        Self::spawn("realtime_metrics", every, move || {
            let client = client.clone();
            async move { client.realtime_metrics().await }
        })
    }
}

impl Refresher<HealthStatus> {
    pub fn health(client: ApiClient, every: Duration) -> Self {
        Self::spawn("health", every, move || {
            let client = client.clone();
            async move { client.health().await }
        })
    }
}

impl<T> Drop for Refresher<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T>(
    name: &'static str,
    every: Duration,
    fetch: FetchFn<T>,
    tx: watch::Sender<ResourceState<T>>,
    trigger: Arc<Notify>,
    cancel: CancellationToken,
) {
    debug!(resource = name, every_ms = every.as_millis() as u64, "Refresher started");

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = trigger.notified() => ticker.reset(),
            _ = ticker.tick() => {}
        }

        tx.send_modify(|state| state.loading = true);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = fetch() => result,
        };

        tx.send_modify(|state| {
            state.loading = false;
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                    state.updated_at = Some(Utc::now());
                }
                Err(e) => {
                    warn!(resource = name, error = %e, "Refresh failed, keeping previous data");
                    state.error = Some(e);
                }
            }
        });
    }

    debug!(resource = name, "Refresher stopped");
}
