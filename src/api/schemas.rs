// Response validation
//
// Turns untrusted JSON from the backend into typed values. Validation is
// fail-fast: the first missing or out-of-range field is reported by its JSON
// path. Numeric fields may arrive as numbers or numeric strings; both pass
// through the same range checks.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

use super::types::{
    DailyUsage, JobHandle, JobSnapshot, JobStatus, ModelMetric, QueryResponse, RealtimeMetrics,
    TopModel, UsageStats,
};
use crate::errors::ValidationError;
use crate::format::parse_numeric_str;

type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, Copy)]
enum Bound {
    Any,
    NonNegative,
    Unit,
    Percent,
}

impl Bound {
    fn check(self, v: f64) -> std::result::Result<f64, &'static str> {
        let ok = match self {
            Bound::Any => true,
            Bound::NonNegative => v >= 0.0,
            Bound::Unit => (0.0..=1.0).contains(&v),
            Bound::Percent => (0.0..=100.0).contains(&v),
        };
        if ok {
            Ok(v)
        } else {
            Err(match self {
                Bound::Any => "must be finite",
                Bound::NonNegative => "must be >= 0",
                Bound::Unit => "must be within [0, 1]",
                Bound::Percent => "must be within [0, 100]",
            })
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

/// Coerce a number or numeric string
fn coerce_number(value: &Value, path: &str) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_numeric_str(s),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ValidationError::new(path, format!("expected a number, got {}", describe(value)))
    })
}

/// Field accessor over one JSON object, carrying its path for error messages
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    fn of(value: &'a Value, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            other => Err(ValidationError::new(
                if path.is_empty() { "<body>".to_string() } else { path },
                format!("expected an object, got {}", describe(other)),
            )),
        }
    }

    fn path(&self, name: &str) -> String {
        join(&self.path, name)
    }

    /// Null counts as absent
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    fn required(&self, name: &str) -> Result<&'a Value> {
        self.get(name)
            .ok_or_else(|| ValidationError::new(self.path(name), "is missing"))
    }

    fn opt_string(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(ValidationError::new(
                self.path(name),
                format!("expected a string, got {}", describe(other)),
            )),
        }
    }

    fn string(&self, name: &str) -> Result<String> {
        self.required(name)?;
        self.opt_string(name).map(Option::unwrap_or_default)
    }

    fn non_empty_string(&self, name: &str) -> Result<String> {
        let s = self.string(name)?;
        if s.trim().is_empty() {
            return Err(ValidationError::new(self.path(name), "must not be empty"));
        }
        Ok(s)
    }

    fn opt_number(&self, name: &str, bound: Bound) -> Result<Option<f64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let path = self.path(name);
        let v = coerce_number(value, &path)?;
        bound
            .check(v)
            .map(Some)
            .map_err(|reason| ValidationError::new(path, format!("{}, got {}", reason, v)))
    }

    fn number(&self, name: &str, bound: Bound) -> Result<f64> {
        self.required(name)?;
        self.opt_number(name, bound).map(Option::unwrap_or_default)
    }

    fn opt_integer(&self, name: &str, min: u64) -> Result<Option<u64>> {
        let Some(v) = self.opt_number(name, Bound::Any)? else {
            return Ok(None);
        };
        if v.fract() != 0.0 || v < min as f64 || v > u64::MAX as f64 {
            return Err(ValidationError::new(
                self.path(name),
                format!("expected an integer >= {}, got {}", min, v),
            ));
        }
        Ok(Some(v as u64))
    }

    fn integer(&self, name: &str, min: u64) -> Result<u64> {
        self.required(name)?;
        self.opt_integer(name, min).map(Option::unwrap_or_default)
    }

    fn boolean(&self, name: &str) -> Result<bool> {
        match self.required(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(ValidationError::new(
                self.path(name),
                format!("expected a boolean, got {}", describe(other)),
            )),
        }
    }

    fn opt_array(&self, name: &str) -> Result<Option<&'a Vec<Value>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(ValidationError::new(
                self.path(name),
                format!("expected an array, got {}", describe(other)),
            )),
        }
    }

    fn array(&self, name: &str) -> Result<&'a Vec<Value>> {
        match self.required(name)? {
            Value::Array(items) => Ok(items),
            other => Err(ValidationError::new(
                self.path(name),
                format!("expected an array, got {}", describe(other)),
            )),
        }
    }

    fn item_path(&self, name: &str, index: usize) -> String {
        format!("{}[{}]", self.path(name), index)
    }
}

/// Rewrite historical response shapes into the canonical one
///
/// - `estimated_cost` becomes `total_cost`
/// - `model_details` becomes `model_metrics`, with `rank_position` taken from
///   array order and `is_winner` from `model == winner_model` when absent
///
/// Canonical payloads are returned borrowed and untouched.
pub fn normalize_legacy(raw: &Value) -> Cow<'_, Value> {
    let Value::Object(map) = raw else {
        return Cow::Borrowed(raw);
    };
    let legacy_cost = !map.contains_key("total_cost") && map.contains_key("estimated_cost");
    let legacy_details = !map.contains_key("model_metrics") && map.contains_key("model_details");
    if !legacy_cost && !legacy_details {
        return Cow::Borrowed(raw);
    }

    let mut map = map.clone();
    if legacy_cost {
        if let Some(cost) = map.remove("estimated_cost") {
            map.insert("total_cost".to_string(), cost);
        }
    }
    if legacy_details {
        let winner = map.get("winner_model").and_then(Value::as_str).map(str::to_string);
        if let Some(mut details) = map.remove("model_details") {
            if let Value::Array(items) = &mut details {
                for (index, item) in items.iter_mut().enumerate() {
                    let Value::Object(metric) = item else { continue };
                    metric
                        .entry("rank_position")
                        .or_insert_with(|| Value::from(index as u64 + 1));
                    if !metric.contains_key("is_winner") {
                        let is_winner = winner.is_some()
                            && metric.get("model").and_then(Value::as_str) == winner.as_deref();
                        metric.insert("is_winner".to_string(), Value::Bool(is_winner));
                    }
                    metric
                        .entry("response")
                        .or_insert_with(|| Value::String(String::new()));
                }
            }
            map.insert("model_metrics".to_string(), details);
        }
    }
    Cow::Owned(Value::Object(map))
}

/// Validate a `QueryResponse` payload
pub fn validate_query_response(raw: &Value) -> Result<QueryResponse> {
    query_response_at(raw, "")
}

fn query_response_at(raw: &Value, path: &str) -> Result<QueryResponse> {
    let normalized = normalize_legacy(raw);
    let fields = Fields::of(&normalized, path)?;

    let request_id = fields.non_empty_string("request_id")?;
    let answer = fields.non_empty_string("answer")?;
    let confidence = fields.number("confidence", Bound::Unit)?;
    let winner_model = fields.non_empty_string("winner_model")?;
    let raw_metrics = fields.array("model_metrics")?;

    // Confidence is checked across every metric before anything else in them
    for (index, item) in raw_metrics.iter().enumerate() {
        let metric = Fields::of(item, fields.item_path("model_metrics", index))?;
        metric.number("confidence", Bound::Unit)?;
    }

    let model_metrics = raw_metrics
        .iter()
        .enumerate()
        .map(|(index, item)| model_metric_at(item, &fields.item_path("model_metrics", index)))
        .collect::<Result<Vec<_>>>()?;

    let response_time_ms = fields
        .opt_number("response_time_ms", Bound::NonNegative)?
        .unwrap_or_default();

    let models_used = match fields.opt_array("models_used")? {
        None => Vec::new(),
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ValidationError::new(
                    fields.item_path("models_used", index),
                    format!("expected a string, got {}", describe(other)),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let total_cost = fields
        .opt_number("total_cost", Bound::NonNegative)?
        .unwrap_or_default();
    let reasoning = fields.opt_string("reasoning")?;

    let scores_by_trait = match fields.get("scores_by_trait") {
        None => None,
        Some(value) => {
            let traits = Fields::of(value, fields.path("scores_by_trait"))?;
            let mut scores = BTreeMap::new();
            for name in traits.map.keys() {
                if let Some(score) = traits.opt_number(name, Bound::Any)? {
                    scores.insert(name.clone(), score);
                }
            }
            Some(scores)
        }
    };

    check_winner(&model_metrics, &winner_model, &fields.path("model_metrics"))?;

    Ok(QueryResponse {
        request_id,
        answer,
        confidence,
        winner_model,
        response_time_ms,
        models_used,
        model_metrics,
        total_cost,
        reasoning,
        scores_by_trait,
    })
}

fn model_metric_at(raw: &Value, path: &str) -> Result<ModelMetric> {
    let fields = Fields::of(raw, path)?;
    Ok(ModelMetric {
        model: fields.non_empty_string("model")?,
        response: fields.opt_string("response")?.unwrap_or_default(),
        confidence: fields.number("confidence", Bound::Unit)?,
        response_time_ms: fields.number("response_time_ms", Bound::NonNegative)?,
        cost: fields.number("cost", Bound::NonNegative)?,
        reliability_score: fields.opt_number("reliability_score", Bound::Unit)?,
        hallucination_risk: fields.opt_number("hallucination_risk", Bound::Unit)?,
        consistency_score: fields.opt_number("consistency_score", Bound::Unit)?,
        citation_quality: fields.opt_number("citation_quality", Bound::Unit)?,
        rank_position: u32::try_from(fields.integer("rank_position", 1)?).map_err(|_| {
            ValidationError::new(fields.path("rank_position"), "is out of range")
        })?,
        is_winner: fields.boolean("is_winner")?,
        error: fields.opt_string("error")?,
    })
}

/// Exactly one winner, and it is the response's `winner_model`
fn check_winner(metrics: &[ModelMetric], winner_model: &str, path: &str) -> Result<()> {
    if metrics.is_empty() {
        return Ok(());
    }
    let winners: Vec<&ModelMetric> = metrics.iter().filter(|m| m.is_winner).collect();
    match winners.as_slice() {
        [only] if only.model == winner_model => Ok(()),
        [only] => Err(ValidationError::new(
            path,
            format!(
                "winner `{}` does not match winner_model `{}`",
                only.model, winner_model
            ),
        )),
        _ => Err(ValidationError::new(
            path,
            format!("expected exactly one winner, found {}", winners.len()),
        )),
    }
}

/// Validate a `UsageStats` payload
pub fn validate_usage_stats(raw: &Value) -> Result<UsageStats> {
    let fields = Fields::of(raw, "")?;

    let total_requests = fields.integer("total_requests", 0)?;
    let avg_confidence = fields.number("avg_confidence", Bound::Unit)?;

    let top_models = fields
        .array("top_models")?
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let model = Fields::of(item, fields.item_path("top_models", index))?;
            Ok(TopModel {
                name: model.non_empty_string("name")?,
                usage_percentage: model.number("usage_percentage", Bound::Percent)?,
                avg_score: model.number("avg_score", Bound::Unit)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let total_cost = fields
        .opt_number("total_cost", Bound::NonNegative)?
        .unwrap_or_default();
    let avg_response_time = fields
        .opt_number("avg_response_time", Bound::NonNegative)?
        .unwrap_or_default();

    let daily_usage = match fields.opt_array("daily_usage")? {
        None => Vec::new(),
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let day = Fields::of(item, fields.item_path("daily_usage", index))?;
                Ok(DailyUsage {
                    date: day.non_empty_string("date")?,
                    requests: day.integer("requests", 0)?,
                    cost: day.number("cost", Bound::NonNegative)?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let total_tokens = fields.opt_integer("total_tokens", 0)?;

    Ok(UsageStats {
        total_requests,
        total_cost,
        avg_response_time,
        avg_confidence,
        top_models,
        daily_usage,
        total_tokens,
    })
}

/// Progress may be numeric or a placeholder string like "in_progress"
fn lenient_progress(fields: &Fields<'_>) -> Option<u8> {
    let value = fields.get("progress")?;
    let v = coerce_number(value, "progress").ok()?;
    Some(v.round().clamp(0.0, 100.0) as u8)
}

fn job_status_field(fields: &Fields<'_>) -> Result<Option<JobStatus>> {
    match fields.opt_string("status")? {
        None => Ok(None),
        Some(s) => JobStatus::parse(&s).map(Some).ok_or_else(|| {
            ValidationError::new(fields.path("status"), format!("unknown job status {:?}", s))
        }),
    }
}

/// Validate the body of a `202 Accepted` query submission
pub fn validate_job_accepted(raw: &Value) -> Result<JobHandle> {
    let fields = Fields::of(raw, "")?;
    let job_id = if fields.get("job_id").is_none() && fields.get("id").is_some() {
        fields.non_empty_string("id")?
    } else {
        fields.non_empty_string("job_id")?
    };
    if job_id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '%'))
    {
        return Err(ValidationError::new(
            "job_id",
            format!("{:?} is not usable as a URL path segment", job_id),
        ));
    }
    Ok(JobHandle {
        job_id,
        status: job_status_field(&fields)?.unwrap_or(JobStatus::Accepted),
        poll_interval_ms: fields.opt_integer("poll_interval_ms", 0)?,
        progress: lenient_progress(&fields),
    })
}

/// Pull a human-readable message out of an error body
pub fn error_message(body: &Value) -> Option<String> {
    match body {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => ["error", "detail", "message"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Object(_) => error_message(v),
                Value::Null => None,
                other => Some(other.to_string()),
            }),
        _ => None,
    }
}

/// Interpret a `200`/`202` body from `GET /jobs/{id}`
///
/// `accepted` is true when the HTTP status was 202, which implies the job is
/// still running even if the body carries no status field.
pub fn parse_job_snapshot(raw: &Value, accepted: bool) -> Result<JobSnapshot> {
    let fields = Fields::of(raw, "")?;
    let status = job_status_field(&fields)?;
    let result = fields.get("result");

    match (status, result) {
        (None | Some(JobStatus::Completed), Some(result)) => {
            let response = query_response_at(result, "result")?;
            Ok(JobSnapshot::Completed(Box::new(response)))
        }
        (Some(JobStatus::Completed), None) => Err(ValidationError::new(
            "result",
            "is missing for a completed job",
        )),
        (Some(status @ (JobStatus::Failed | JobStatus::Cancelled)), _) => {
            let message = error_message(raw).unwrap_or_else(|| match status {
                JobStatus::Cancelled => "job was cancelled".to_string(),
                _ => "job failed without an error message".to_string(),
            });
            Ok(JobSnapshot::Failed { status, message })
        }
        (Some(status), _) => Ok(JobSnapshot::InProgress {
            status,
            progress: lenient_progress(&fields),
        }),
        (None, None) if accepted => Ok(JobSnapshot::InProgress {
            status: JobStatus::Processing,
            progress: lenient_progress(&fields),
        }),
        (None, None) => Err(ValidationError::new("status", "is missing")),
    }
}

/// Validate a `GET /metrics/realtime` payload
pub fn validate_realtime_metrics(raw: &Value) -> Result<RealtimeMetrics> {
    let fields = Fields::of(raw, "")?;
    Ok(RealtimeMetrics {
        current_requests_per_minute: fields
            .number("current_requests_per_minute", Bound::NonNegative)?,
        active_connections: fields.integer("active_connections", 0)?,
        avg_response_time_last_minute: fields
            .number("avg_response_time_last_minute", Bound::NonNegative)?,
        error_rate_percent: fields.number("error_rate_percent", Bound::Percent)?,
        cache_hit_rate: fields.number("cache_hit_rate", Bound::Unit)?,
        timestamp: fields.opt_string("timestamp")?,
    })
}

/// Shape-only decoding for payloads without range invariants
pub fn decode<T: DeserializeOwned>(raw: &Value) -> Result<T> {
    T::deserialize(raw).map_err(|e| ValidationError::new("<body>", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metric(model: &str, confidence: Value, winner: bool, rank: u32) -> Value {
        json!({
            "model": model,
            "response": "y",
            "confidence": confidence,
            "response_time_ms": 10,
            "cost": 0.01,
            "reliability_score": 0.8,
            "hallucination_risk": 0.1,
            "consistency_score": 0.8,
            "citation_quality": 0.7,
            "rank_position": rank,
            "is_winner": winner
        })
    }

    fn response(metrics: Vec<Value>) -> Value {
        json!({
            "request_id": "r1",
            "answer": "y",
            "confidence": 0.9,
            "winner_model": "m1",
            "model_metrics": metrics,
            "response_time_ms": 220,
            "models_used": ["m1", "m2"],
            "total_cost": 0.01
        })
    }

    #[test]
    fn test_valid_response() {
        let raw = response(vec![
            metric("m1", json!(0.9), true, 1),
            metric("m2", json!(0.7), false, 2),
        ]);
        let parsed = validate_query_response(&raw).unwrap();
        assert_eq!(parsed.winner_model, "m1");
        assert_eq!(parsed.model_metrics.len(), 2);
        assert_eq!(parsed.winner().unwrap().model, "m1");
        assert_eq!(parsed.response_time_ms, 220.0);
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let mut raw = response(vec![]);
        raw.as_object_mut().unwrap().remove("answer");
        let err = validate_query_response(&raw).unwrap_err();
        assert_eq!(err.field, "answer");
        assert_eq!(err.reason, "is missing");
    }

    #[test]
    fn test_confidence_out_of_range() {
        let mut raw = response(vec![]);
        raw["confidence"] = json!(1.2);
        let err = validate_query_response(&raw).unwrap_err();
        assert_eq!(err.field, "confidence");
    }

    #[test]
    fn test_first_bad_metric_confidence_index() {
        let mut bad_cost = metric("m1", json!(0.9), true, 1);
        bad_cost["cost"] = json!(-1);
        let raw = response(vec![
            bad_cost,
            metric("m2", json!(0.5), false, 2),
            metric("m3", json!(-0.1), false, 3),
            metric("m4", json!(2.0), false, 4),
        ]);
        let err = validate_query_response(&raw).unwrap_err();
        assert_eq!(err.field, "model_metrics[2].confidence");
    }

    #[test]
    fn test_string_numbers_are_coerced() {
        let raw = response(vec![metric("m1", json!("0.42"), true, 1)]);
        let parsed = validate_query_response(&raw).unwrap();
        assert_eq!(parsed.model_metrics[0].confidence, 0.42);

        let raw = response(vec![metric("m1", json!("abc"), true, 1)]);
        let err = validate_query_response(&raw).unwrap_err();
        assert_eq!(err.field, "model_metrics[0].confidence");
        assert!(err.reason.contains("expected a number"));
    }

    #[test]
    fn test_winner_invariant() {
        let raw = response(vec![
            metric("m1", json!(0.9), true, 1),
            metric("m2", json!(0.7), true, 2),
        ]);
        let err = validate_query_response(&raw).unwrap_err();
        assert_eq!(err.field, "model_metrics");
        assert!(err.reason.contains("exactly one winner"));

        let raw = response(vec![metric("m2", json!(0.9), true, 1)]);
        let err = validate_query_response(&raw).unwrap_err();
        assert!(err.reason.contains("does not match"));
    }

    #[test]
    fn test_rank_position_must_be_positive_integer() {
        let raw = response(vec![metric("m1", json!(0.9), true, 0)]);
        let err = validate_query_response(&raw).unwrap_err();
        assert_eq!(err.field, "model_metrics[0].rank_position");

        let mut fractional = metric("m1", json!(0.9), true, 1);
        fractional["rank_position"] = json!(1.5);
        let err = validate_query_response(&response(vec![fractional])).unwrap_err();
        assert_eq!(err.field, "model_metrics[0].rank_position");
    }

    #[test]
    fn test_legacy_shape_is_adapted() {
        let raw = json!({
            "request_id": "r1",
            "answer": "y",
            "confidence": 0.8,
            "winner_model": "openai/gpt-4o",
            "response_time_ms": 1200,
            "models_used": ["openai/gpt-4o", "google/gemini-pro-1.5"],
            "estimated_cost": 0.02,
            "model_details": [
                {"model": "openai/gpt-4o", "response": "y", "confidence": 0.8,
                 "response_time_ms": 900, "tokens_used": 120, "cost": 0.015},
                {"model": "google/gemini-pro-1.5", "response": "z", "confidence": 0.6,
                 "response_time_ms": 700, "tokens_used": 80, "cost": 0.005}
            ]
        });
        let parsed = validate_query_response(&raw).unwrap();
        assert_eq!(parsed.total_cost, 0.02);
        assert_eq!(parsed.model_metrics[1].rank_position, 2);
        assert!(parsed.model_metrics[0].is_winner);
        assert!(!parsed.model_metrics[1].is_winner);
        assert_eq!(parsed.model_metrics[0].reliability_score, None);
    }

    #[test]
    fn test_canonical_payload_not_copied() {
        let raw = response(vec![]);
        assert!(matches!(normalize_legacy(&raw), Cow::Borrowed(_)));
    }

    #[test]
    fn test_usage_stats() {
        let raw = json!({
            "total_requests": "1500",
            "total_cost": 42.5,
            "avg_response_time": 1.8,
            "avg_confidence": 0.93,
            "total_tokens": 1000000,
            "top_models": [
                {"name": "GPT-4 Turbo", "usage_percentage": 42, "avg_score": 0.95}
            ],
            "daily_usage": [
                {"date": "2024-01-01", "requests": 800, "cost": 20.5}
            ]
        });
        let stats = validate_usage_stats(&raw).unwrap();
        assert_eq!(stats.total_requests, 1500);
        assert_eq!(stats.top_models[0].usage_percentage, 42.0);
        assert_eq!(stats.daily_usage[0].requests, 800);
        assert_eq!(stats.total_tokens, Some(1_000_000));
    }

    #[test]
    fn test_usage_stats_rejects_bad_percentage() {
        let raw = json!({
            "total_requests": 10,
            "avg_confidence": 0.9,
            "top_models": [
                {"name": "a", "usage_percentage": 50, "avg_score": 0.9},
                {"name": "b", "usage_percentage": 150, "avg_score": 0.9}
            ]
        });
        let err = validate_usage_stats(&raw).unwrap_err();
        assert_eq!(err.field, "top_models[1].usage_percentage");

        let raw = json!({"total_requests": -1, "avg_confidence": 0.9, "top_models": []});
        assert_eq!(validate_usage_stats(&raw).unwrap_err().field, "total_requests");
    }

    #[test]
    fn test_job_accepted() {
        let handle = validate_job_accepted(&json!({"job_id": "abc", "poll_interval_ms": 100})).unwrap();
        assert_eq!(handle.job_id, "abc");
        assert_eq!(handle.poll_interval_ms, Some(100));
        assert_eq!(handle.status, JobStatus::Accepted);

        let err = validate_job_accepted(&json!({"status": "pending"})).unwrap_err();
        assert_eq!(err.field, "job_id");

        let err = validate_job_accepted(&json!({"job_id": "../admin"})).unwrap_err();
        assert_eq!(err.field, "job_id");
    }

    #[test]
    fn test_job_snapshots() {
        let snap = parse_job_snapshot(&json!({"status": "processing", "progress": 50}), true).unwrap();
        assert_eq!(
            snap,
            JobSnapshot::InProgress {
                status: JobStatus::Processing,
                progress: Some(50)
            }
        );

        let snap = parse_job_snapshot(&json!({"status": "processing", "progress": "in_progress"}), true).unwrap();
        assert_eq!(
            snap,
            JobSnapshot::InProgress {
                status: JobStatus::Processing,
                progress: None
            }
        );

        let snap = parse_job_snapshot(&json!({"status": "failed", "error": "boom"}), false).unwrap();
        assert!(matches!(snap, JobSnapshot::Failed { ref message, .. } if message == "boom"));

        let snap = parse_job_snapshot(&json!({"id": "abc", "status": "cancelled"}), false).unwrap();
        assert!(matches!(snap, JobSnapshot::Failed { status: JobStatus::Cancelled, .. }));

        let raw = json!({"result": response(vec![metric("m1", json!(0.9), true, 1)])});
        assert!(matches!(parse_job_snapshot(&raw, false).unwrap(), JobSnapshot::Completed(_)));
    }

    #[test]
    fn test_completed_job_result_errors_are_prefixed() {
        let mut result = response(vec![]);
        result["confidence"] = json!("high");
        let err = parse_job_snapshot(&json!({"status": "completed", "result": result}), false).unwrap_err();
        assert_eq!(err.field, "result.confidence");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"detail": "Invalid key"})).as_deref(), Some("Invalid key"));
        assert_eq!(error_message(&json!({"error": {"message": "nested"}})).as_deref(), Some("nested"));
        assert_eq!(error_message(&json!("plain")).as_deref(), Some("plain"));
        assert_eq!(error_message(&json!({"other": 1})), None);
    }

    #[test]
    fn test_non_object_body() {
        let err = validate_query_response(&json!("<html>")).unwrap_err();
        assert_eq!(err.field, "<body>");
    }
}
