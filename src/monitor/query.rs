// Query runner
//
// Owns at most one in-flight query. Submitting again cancels the previous
// query; its late results are discarded. Dropping the runner cancels
// whatever is still running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ApiClient, QueryRequest, QueryResponse, SubmitOptions};
use crate::errors::ApiError;

#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub loading: bool,
    /// Last reported job progress in percent
    pub progress: u8,
    /// Set once the backend has deferred the query to a job
    pub job_id: Option<String>,
    pub data: Option<QueryResponse>,
    pub error: Option<ApiError>,
}

pub struct QueryRunner {
    client: ApiClient,
    state: Arc<watch::Sender<QueryState>>,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<CancellationToken>>,
}

impl QueryRunner {
    pub fn new(client: ApiClient) -> Self {
        let (tx, _) = watch::channel(QueryState::default());
        Self {
            client,
            state: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
        }
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    /// Run `request`, replacing any query this runner already has in flight
    pub async fn submit(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        self.submit_with(request, SubmitOptions::default()).await
    }

    /// Like `submit`, with caller options; the runner supplies its own
    /// cancellation token and progress callback
    pub async fn submit_with(
        &self,
        request: &QueryRequest,
        options: SubmitOptions,
    ) -> Result<QueryResponse, ApiError> {
        let token = CancellationToken::new();
        let generation = {
            let mut current = self.lock_current();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(previous) = current.replace(token.clone()) {
                debug!(generation, "Cancelling superseded query");
                previous.cancel();
            }
            generation
        };

        self.state.send_replace(QueryState {
            loading: true,
            ..QueryState::default()
        });

        let state = Arc::clone(&self.state);
        let current_generation = Arc::clone(&self.generation);
        let options = options.cancel_token(token.clone()).on_progress(move |progress| {
            if current_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            state.send_modify(|s| {
                s.progress = progress.percent;
                s.job_id = Some(progress.job_id.clone());
            });
        });

        let result = self.client.submit_query_with(request, options).await;

        // A superseded query leaves the state to its successor
        let mut current = self.lock_current();
        if self.generation.load(Ordering::SeqCst) == generation {
            *current = None;
            self.state.send_modify(|s| {
                s.loading = false;
                match &result {
                    Ok(response) => {
                        s.progress = 100;
                        s.data = Some(response.clone());
                        s.error = None;
                    }
                    Err(e) => s.error = Some(e.clone()),
                }
            });
        }
        drop(current);

        result
    }

    /// Cancel the in-flight query, if any
    pub fn cancel(&self) {
        if let Some(token) = self.lock_current().take() {
            token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_current().is_some()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for QueryRunner {
    fn drop(&mut self) {
        self.cancel();
    }
}
