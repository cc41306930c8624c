// Routing API access
//
// http: transport wrapper (timeouts, retries, auth, error classification)
// schemas: response validation
// poller: async job polling
// client: domain operations

pub mod client;
pub mod http;
pub mod poller;
pub mod schemas;
pub mod types;

pub use client::{ApiClient, SubmitOptions, MAX_USAGE_DAYS};
pub use http::{HttpClient, HttpResponse, RequestOptions, ResponseBody, REQUEST_ID_HEADER};
pub use poller::{job_endpoint, JobPoller, ProgressCallback};
pub use schemas::{
    normalize_legacy, validate_job_accepted, validate_query_response, validate_realtime_metrics,
    validate_usage_stats,
};
pub use types::{
    DailyUsage, HealthStatus, JobHandle, JobProgress, JobSnapshot, JobStatus, ModeInfo,
    ModeRecommendation, ModelCatalog, ModelMetric, PromptAnalysis, QueryAnalysis, QueryMode,
    QueryRequest, QueryResponse, RealtimeMetrics, TopModel, UsageStats, MAX_MODELS,
    MAX_PROMPT_CHARS,
};
