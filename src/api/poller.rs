// Async job polling
//
// Drives `GET /jobs/{id}` until the job completes, fails, disappears, the
// polling budget runs out, or the caller cancels. Polls for one job are
// strictly sequential.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::http::{HttpClient, RequestOptions};
use super::schemas::{error_message, parse_job_snapshot};
use super::types::{JobHandle, JobProgress, JobSnapshot, JobStatus, QueryResponse};
use crate::config::PollingConfig;
use crate::errors::{ApiError, ValidationError};

/// Per-call progress observer
pub type ProgressCallback = Arc<dyn Fn(&JobProgress) + Send + Sync>;

/// Stand-in deadline for budgets too large to add to an `Instant`
const UNBOUNDED: Duration = Duration::from_secs(30 * 365 * 86_400);

/// Statuses the job endpoint uses as answers rather than transport failures
const JOB_PASSTHROUGH: &[u16] = &[404, 500];

pub fn job_endpoint(job_id: &str) -> String {
    format!("/jobs/{}", job_id)
}

pub struct JobPoller<'a> {
    http: &'a HttpClient,
    config: &'a PollingConfig,
}

impl<'a> JobPoller<'a> {
    pub fn new(http: &'a HttpClient, config: &'a PollingConfig) -> Self {
        Self { http, config }
    }

    /// One poll of the job endpoint
    pub async fn fetch(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        let response = self
            .http
            .request(
                &job_endpoint(job_id),
                RequestOptions::get().passthrough(JOB_PASSTHROUGH),
            )
            .await?;

        match response.status {
            404 => Err(ApiError::JobNotFound {
                job_id: job_id.to_string(),
            }),
            500 => Ok(JobSnapshot::Failed {
                status: JobStatus::Failed,
                message: error_message(&response.data.to_value())
                    .unwrap_or_else(|| "job failed without an error message".to_string()),
            }),
            200 | 202 => {
                let body = response.data.as_json().ok_or_else(|| {
                    ValidationError::new("<body>", "expected a JSON job status body")
                })?;
                Ok(parse_job_snapshot(body, response.status == 202)?)
            }
            other => Err(ValidationError::new(
                "<http status>",
                format!("unexpected status {} from job endpoint", other),
            )
            .into()),
        }
    }

    /// Poll until a terminal state
    ///
    /// Waits the job's interval before each poll. Both the wait and the poll
    /// itself are cut short at the polling deadline, after which
    /// `PollingTimeout` is returned without another request.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        progress: Option<&ProgressCallback>,
        cancel: &CancellationToken,
        budget: Duration,
    ) -> Result<QueryResponse, ApiError> {
        let job_id = handle.job_id.as_str();
        let interval = self.config.interval_for(handle.poll_interval_ms);
        let started = Instant::now();
        let deadline = started
            .checked_add(budget)
            .unwrap_or_else(|| started + UNBOUNDED);
        let mut attempts: u32 = 0;

        info!(
            job_id,
            interval_ms = interval.as_millis() as u64,
            budget_ms = budget.as_millis() as u64,
            "Polling job"
        );

        loop {
            let remaining = budget.saturating_sub(started.elapsed());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job_id, attempts, "Polling cancelled");
                    return Err(ApiError::Cancelled { job_id: Some(job_id.to_string()) });
                }
                _ = tokio::time::sleep(interval.min(remaining)) => {}
            }

            if attempts >= self.config.max_attempts || started.elapsed() >= budget {
                return Err(exhausted(job_id, attempts, started));
            }

            attempts += 1;
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job_id, attempts, "Polling cancelled mid-request");
                    return Err(ApiError::Cancelled { job_id: Some(job_id.to_string()) });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(job_id, attempts, "Poll still in flight at deadline");
                    return Err(exhausted(job_id, attempts, started));
                }
                result = self.fetch(job_id) => result?,
            };

            match snapshot {
                JobSnapshot::Completed(response) => {
                    info!(
                        job_id,
                        attempts,
                        request_id = %response.request_id,
                        winner = %response.winner_model,
                        "Job completed"
                    );
                    return Ok(*response);
                }
                JobSnapshot::Failed { status, message } => {
                    warn!(job_id, attempts, %status, message = %message, "Job failed");
                    return Err(ApiError::JobFailed {
                        job_id: job_id.to_string(),
                        message,
                    });
                }
                JobSnapshot::InProgress { status, progress: percent } => {
                    debug!(job_id, attempt = attempts, %status, progress = ?percent, "Job still running");
                    if let Some(callback) = progress {
                        callback(&JobProgress {
                            job_id: job_id.to_string(),
                            status,
                            percent: percent.unwrap_or(0),
                            attempt: attempts,
                        });
                    }
                }
            }
        }
    }
}

fn exhausted(job_id: &str, attempts: u32, started: Instant) -> ApiError {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    warn!(job_id, attempts, elapsed_ms, "Polling budget exhausted");
    ApiError::PollingTimeout {
        job_id: job_id.to_string(),
        elapsed_ms,
        attempts,
    }
}
