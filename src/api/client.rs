// Routing API client
//
// Domain operations over the HTTP wrapper. `submit_query` hides whether the
// backend answered synchronously (200) or deferred to a job (202): either
// way the caller gets one validated `QueryResponse`.

use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::http::{HttpClient, HttpResponse, RequestOptions};
use super::poller::{JobPoller, ProgressCallback};
use super::schemas::{
    decode, validate_job_accepted, validate_query_response, validate_realtime_metrics,
    validate_usage_stats,
};
use super::types::{
    HealthStatus, JobProgress, JobSnapshot, ModelCatalog, QueryAnalysis, QueryRequest,
    QueryResponse, RealtimeMetrics, UsageStats,
};
use crate::config::{load_config, ApiConfig, Config, PollingConfig};
use crate::errors::{ApiError, ValidationError};

/// Usage history window accepted by the backend
pub const MAX_USAGE_DAYS: u32 = 365;

static SHARED: OnceCell<ApiClient> = OnceCell::new();

/// Options for one `submit_query` call
///
/// The progress callback and cancellation token belong to this call only, so
/// concurrent queries never observe each other's progress.
#[derive(Clone, Default)]
pub struct SubmitOptions {
    /// Ask the backend for its fast path (`?fast=true`)
    pub fast: bool,
    pub progress: Option<ProgressCallback>,
    pub cancel: Option<CancellationToken>,
    /// Overrides `polling.max_polling_time_ms`
    pub max_polling_time: Option<Duration>,
}

impl SubmitOptions {
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&JobProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn max_polling_time(mut self, budget: Duration) -> Self {
        self.max_polling_time = Some(budget);
        self
    }
}

impl std::fmt::Debug for SubmitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitOptions")
            .field("fast", &self.fast)
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel)
            .field("max_polling_time", &self.max_polling_time)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    polling: PollingConfig,
    health_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Self::with_settings(&config.api, config.polling.clone())
    }

    pub fn with_settings(api: &ApiConfig, polling: PollingConfig) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpClient::new(api)?,
            polling,
            health_timeout: api.health_timeout(),
        })
    }

    /// Process-wide client built from `load_config()` on first use
    ///
    /// Holds configuration only; per-query state lives in `SubmitOptions`.
    pub fn shared() -> anyhow::Result<&'static ApiClient> {
        SHARED.get_or_try_init(|| {
            let config = load_config()?;
            Ok(ApiClient::new(&config)?)
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    pub async fn submit_query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        self.submit_query_with(request, SubmitOptions::default()).await
    }

    /// Submit a query and wait for its result, polling if the backend defers
    pub async fn submit_query_with(
        &self,
        request: &QueryRequest,
        options: SubmitOptions,
    ) -> Result<QueryResponse, ApiError> {
        request.validate()?;
        let cancel = options.cancel.clone().unwrap_or_default();
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        info!(
            mode = %request.mode,
            prompt_chars = request.prompt.chars().count(),
            fast = options.fast,
            "Submitting query"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled { job_id: None }),
            result = self.http.request(
                "/query",
                RequestOptions::post(body).query("fast", options.fast),
            ) => result?,
        };

        match response.status {
            200 => {
                let result = validate_query_response(json_body(&response)?)?;
                info!(
                    request_id = %result.request_id,
                    winner = %result.winner_model,
                    elapsed_ms = response.elapsed_ms(),
                    "Query answered synchronously"
                );
                Ok(result)
            }
            202 => {
                let handle = validate_job_accepted(json_body(&response)?)?;
                info!(job_id = %handle.job_id, "Query accepted as job");
                let budget = options
                    .max_polling_time
                    .unwrap_or_else(|| self.polling.max_polling_time());
                JobPoller::new(&self.http, &self.polling)
                    .wait(&handle, options.progress.as_ref(), &cancel, budget)
                    .await
            }
            status => Err(ApiError::QuerySubmission {
                status,
                body: Some(response.data.to_value()),
            }),
        }
    }

    /// Single observation of a job, for callers running their own loop
    pub async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, ApiError> {
        JobPoller::new(&self.http, &self.polling).fetch(job_id).await
    }

    pub async fn get_usage_stats(&self, days: u32) -> Result<UsageStats, ApiError> {
        if !(1..=MAX_USAGE_DAYS).contains(&days) {
            return Err(ApiError::InvalidRequest(format!(
                "days must be between 1 and {}, got {}",
                MAX_USAGE_DAYS, days
            )));
        }
        let response = self
            .http
            .request("/usage", RequestOptions::get().query("days", days))
            .await?;
        let stats = validate_usage_stats(json_body(&response)?)?;
        debug!(days, total_requests = stats.total_requests, "Fetched usage stats");
        Ok(stats)
    }

    /// Liveness probe: never errors, any failure is `false`
    pub async fn health_check(&self) -> bool {
        match self.health_request().await {
            Ok(response) if (200..300).contains(&response.status) => {
                debug!(status = response.status, "Health check succeeded");
                true
            }
            Ok(response) => {
                debug!(status = response.status, "Health check failed");
                false
            }
            Err(e) => {
                debug!(error = %e, "Health check request failed");
                false
            }
        }
    }

    /// Detailed health report
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let response = self.health_request().await?;
        Ok(decode(json_body(&response)?)?)
    }

    async fn health_request(&self) -> Result<HttpResponse, ApiError> {
        self.http
            .request(
                "/health",
                RequestOptions::get()
                    .timeout(self.health_timeout)
                    .max_retries(0),
            )
            .await
    }

    /// Available modes and the models behind them
    pub async fn list_models(&self) -> Result<ModelCatalog, ApiError> {
        let response = self.http.request("/models", RequestOptions::get()).await?;
        Ok(decode(json_body(&response)?)?)
    }

    /// Mode recommendations for a prompt, without running it
    pub async fn analyze_query(&self, prompt: &str) -> Result<QueryAnalysis, ApiError> {
        if prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest("prompt must not be empty".to_string()));
        }
        let response = self
            .http
            .request("/analyze", RequestOptions::get().query("prompt", prompt))
            .await?;
        Ok(decode(json_body(&response)?)?)
    }

    pub async fn realtime_metrics(&self) -> Result<RealtimeMetrics, ApiError> {
        let response = self
            .http
            .request("/metrics/realtime", RequestOptions::get())
            .await?;
        Ok(validate_realtime_metrics(json_body(&response)?)?)
    }
}

fn json_body(response: &HttpResponse) -> Result<&Value, ValidationError> {
    response
        .data
        .as_json()
        .ok_or_else(|| ValidationError::new("<body>", "expected a JSON response body"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn client() -> ApiClient {
        ApiClient::new(&Config::new("http://127.0.0.1:9")).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_never_hits_network() {
        let err = client()
            .submit_query(&QueryRequest::new(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_usage_days_range() {
        let err = client().get_usage_stats(0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        let err = client().get_usage_stats(400).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_pre_cancelled_submit() {
        let token = CancellationToken::new();
        token.cancel();
        let err = client()
            .submit_query_with(
                &QueryRequest::new("hello"),
                SubmitOptions::default().cancel_token(token),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_health_check_false_when_unreachable() {
        assert!(!client().health_check().await);
    }

    #[test]
    fn test_shared_client_is_built_once() {
        let first = ApiClient::shared().unwrap();
        let second = ApiClient::shared().unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(first.polling().max_attempts > 0);
    }

    #[test]
    fn test_submit_options_debug_hides_callback() {
        let options = SubmitOptions::default().fast(true).on_progress(|_| {});
        let debug = format!("{:?}", options);
        assert!(debug.contains("progress: true"));
    }
}
