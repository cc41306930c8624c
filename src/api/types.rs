// Request/response types for the routing API
//
// Responses are never deserialized straight into these types: payloads go
// through `schemas` first so range checks and numeric coercion apply. The
// Serialize impls produce the canonical wire shape, which the validator
// accepts unchanged.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::ApiError;

/// Longest prompt the backend accepts
pub const MAX_PROMPT_CHARS: usize = 5_000;

/// Most models the backend will fan out to
pub const MAX_MODELS: u32 = 5;

/// Routing strategy requested for a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Speed,
    #[default]
    Balanced,
    Quality,
    Cost,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Speed => "speed",
            QueryMode::Balanced => "balanced",
            QueryMode::Quality => "quality",
            QueryMode::Cost => "cost",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "speed" => Ok(QueryMode::Speed),
            "balanced" => Ok(QueryMode::Balanced),
            "quality" => Ok(QueryMode::Quality),
            "cost" => Ok(QueryMode::Cost),
            other => Err(format!(
                "unknown mode '{}' (expected speed, balanced, quality or cost)",
                other
            )),
        }
    }
}

/// A prompt submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub prompt: String,
    pub mode: QueryMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_models: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_reasoning: Option<bool>,
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: QueryMode::default(),
            max_models: None,
            budget_limit: None,
            include_reasoning: None,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_models(mut self, max_models: u32) -> Self {
        self.max_models = Some(max_models);
        self
    }

    pub fn with_budget_limit(mut self, budget_limit: f64) -> Self {
        self.budget_limit = Some(budget_limit);
        self
    }

    pub fn with_reasoning(mut self, include_reasoning: bool) -> Self {
        self.include_reasoning = Some(include_reasoning);
        self
    }

    /// Client-side checks; a request failing these never reaches the network
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest("prompt must not be empty".to_string()));
        }
        let chars = self.prompt.chars().count();
        if chars > MAX_PROMPT_CHARS {
            return Err(ApiError::InvalidRequest(format!(
                "prompt is {} characters, limit is {}",
                chars, MAX_PROMPT_CHARS
            )));
        }
        if let Some(n) = self.max_models {
            if !(1..=MAX_MODELS).contains(&n) {
                return Err(ApiError::InvalidRequest(format!(
                    "max_models must be between 1 and {}, got {}",
                    MAX_MODELS, n
                )));
            }
        }
        if let Some(budget) = self.budget_limit {
            if !budget.is_finite() || budget < 0.0 {
                return Err(ApiError::InvalidRequest(format!(
                    "budget_limit must be a non-negative number, got {}",
                    budget
                )));
            }
        }
        Ok(())
    }
}

/// One model's contribution to a routed answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetric {
    pub model: String,
    pub response: String,
    pub confidence: f64,
    pub response_time_ms: f64,
    pub cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reliability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hallucination_risk: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_quality: Option<f64>,
    pub rank_position: u32,
    pub is_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub request_id: String,
    pub answer: String,
    pub confidence: f64,
    pub winner_model: String,
    pub response_time_ms: f64,
    pub models_used: Vec<String>,
    pub model_metrics: Vec<ModelMetric>,
    pub total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores_by_trait: Option<BTreeMap<String, f64>>,
}

impl QueryResponse {
    pub fn winner(&self) -> Option<&ModelMetric> {
        self.model_metrics.iter().find(|m| m.is_winner)
    }

    /// Metrics ordered by rank (1 first)
    pub fn ranked_metrics(&self) -> Vec<&ModelMetric> {
        let mut ranked: Vec<&ModelMetric> = self.model_metrics.iter().collect();
        ranked.sort_by_key(|m| m.rank_position);
        ranked
    }
}

/// Server-side lifecycle of an async query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "accepted" => Some(JobStatus::Accepted),
            "pending" | "queued" => Some(JobStatus::Pending),
            "processing" | "running" | "in_progress" => Some(JobStatus::Processing),
            "completed" | "complete" | "succeeded" => Some(JobStatus::Completed),
            "failed" | "error" => Some(JobStatus::Failed),
            "cancelled" | "canceled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by `POST /query` when the backend defers work to a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub job_id: String,
    pub status: JobStatus,
    pub poll_interval_ms: Option<u64>,
    pub progress: Option<u8>,
}

/// One observation of `GET /jobs/{id}`
#[derive(Debug, Clone, PartialEq)]
pub enum JobSnapshot {
    InProgress {
        status: JobStatus,
        progress: Option<u8>,
    },
    Completed(Box<QueryResponse>),
    Failed {
        status: JobStatus,
        message: String,
    },
}

/// Progress report handed to per-call progress callbacks
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    /// Reported percentage, 0 when the backend did not report one
    pub percent: u8,
    /// 1-based poll number
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopModel {
    pub name: String,
    pub usage_percentage: f64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: String,
    pub requests: u64,
    pub cost: f64,
}

impl DailyUsage {
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub total_requests: u64,
    pub total_cost: f64,
    /// Seconds
    pub avg_response_time: f64,
    pub avg_confidence: f64,
    pub top_models: Vec<TopModel>,
    pub daily_usage: Vec<DailyUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl UsageStats {
    /// Day with the most requests
    pub fn busiest_day(&self) -> Option<&DailyUsage> {
        self.daily_usage.iter().max_by_key(|d| d.requests)
    }
}

/// `GET /health` body; extra fields are kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.to_lowercase().as_str(), "healthy" | "ok")
    }

    pub fn checked_at(&self) -> Option<DateTime<Utc>> {
        let ts = self.timestamp?;
        let secs = ts.trunc() as i64;
        let nanos = ((ts.fract()) * 1e9) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub typical_response_time: Option<String>,
}

/// `GET /models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    pub modes: BTreeMap<String, ModeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAnalysis {
    pub word_count: u64,
    pub complexity: String,
    pub estimated_tokens: f64,
    #[serde(default)]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub query_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeRecommendation {
    #[serde(default)]
    pub models: Vec<String>,
    pub estimated_time_ms: f64,
    pub estimated_cost: f64,
}

/// `GET /analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query_analysis: PromptAnalysis,
    #[serde(default)]
    pub recommendations: BTreeMap<String, ModeRecommendation>,
    pub suggested_mode: String,
}

/// `GET /metrics/realtime`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeMetrics {
    pub current_requests_per_minute: f64,
    pub active_connections: u64,
    /// Seconds
    pub avg_response_time_last_minute: f64,
    pub error_rate_percent: f64,
    pub cache_hit_rate: f64,
    pub timestamp: Option<String>,
}
