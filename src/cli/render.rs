// Terminal rendering
//
// Plain-text views of API payloads. Every number goes through the `format`
// helpers so malformed values print as "--" instead of panicking.

use std::fmt::{self, Write};

use crate::api::{
    HealthStatus, JobSnapshot, ModelCatalog, QueryAnalysis, QueryResponse, RealtimeMetrics,
    UsageStats,
};
use crate::format::{
    currency, duration, percentage, to_fixed_safe, CurrencyOptions, DurationOptions,
    PercentOptions,
};

fn money(value: f64) -> String {
    currency(value, &CurrencyOptions::default())
}

fn fraction(value: f64) -> String {
    percentage(value, &PercentOptions::default())
}

fn whole_percent(value: f64) -> String {
    percentage(
        value,
        &PercentOptions {
            expects_fraction: false,
            ..PercentOptions::default()
        },
    )
}

fn millis(value: f64) -> String {
    duration(value, &DurationOptions::default())
}

/// Usage and realtime averages arrive in seconds
fn seconds(value: f64) -> String {
    millis(value * 1_000.0)
}

/// Fill a fresh buffer; writing into a `String` only fails if `build` does
fn buffered(build: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut out = String::new();
    build(&mut out)
        .map(|()| out.trim_end().to_string())
        .unwrap_or_default()
}

pub fn query_response(response: &QueryResponse) -> String {
    buffered(|out| {
        writeln!(out, "{}\n", response.answer.trim())?;
        writeln!(
            out,
            "Winner: {}  confidence {}  cost {}  time {}",
            response.winner_model,
            fraction(response.confidence),
            money(response.total_cost),
            millis(response.response_time_ms)
        )?;

        if !response.model_metrics.is_empty() {
            writeln!(out, "\nModels:")?;
            for metric in response.ranked_metrics() {
                let marker = if metric.is_winner { "*" } else { " " };
                write!(
                    out,
                    "  {} #{} {:<24} {:>7} {:>9} {:>8}",
                    marker,
                    metric.rank_position,
                    metric.model,
                    fraction(metric.confidence),
                    money(metric.cost),
                    millis(metric.response_time_ms)
                )?;
                if let Some(error) = &metric.error {
                    write!(out, "  error: {}", error)?;
                }
                writeln!(out)?;
            }
        }

        if let Some(scores) = &response.scores_by_trait {
            writeln!(out, "\nScores by trait:")?;
            for (name, score) in scores {
                writeln!(out, "  {:<20} {}", name, to_fixed_safe(*score, 2))?;
            }
        }

        if let Some(reasoning) = &response.reasoning {
            writeln!(out, "\nReasoning:\n{}", reasoning.trim())?;
        }

        write!(out, "\nRequest {}", response.request_id)
    })
}

pub fn usage(stats: &UsageStats, days: u32) -> String {
    buffered(|out| {
        writeln!(out, "Usage over the last {} days", days)?;
        writeln!(out, "  Requests:        {}", stats.total_requests)?;
        writeln!(out, "  Total cost:      {}", money(stats.total_cost))?;
        writeln!(out, "  Avg response:    {}", seconds(stats.avg_response_time))?;
        writeln!(out, "  Avg confidence:  {}", fraction(stats.avg_confidence))?;
        if let Some(tokens) = stats.total_tokens {
            writeln!(out, "  Tokens:          {}", tokens)?;
        }

        if !stats.top_models.is_empty() {
            writeln!(out, "\nTop models:")?;
            for model in &stats.top_models {
                writeln!(
                    out,
                    "  {:<24} {:>7} of requests, avg score {}",
                    model.name,
                    whole_percent(model.usage_percentage),
                    to_fixed_safe(model.avg_score, 2)
                )?;
            }
        }

        if let Some(busiest) = stats.busiest_day() {
            writeln!(
                out,
                "\nBusiest day: {} ({} requests, {})",
                busiest.date,
                busiest.requests,
                money(busiest.cost)
            )?;
        }
        Ok(())
    })
}

pub fn health(status: Option<&HealthStatus>, reachable: bool) -> String {
    buffered(|out| {
        writeln!(
            out,
            "Backend: {}",
            if reachable { "reachable" } else { "unreachable" }
        )?;
        if let Some(status) = status {
            writeln!(out, "Status:  {}", status.status)?;
            if let Some(version) = &status.version {
                writeln!(out, "Version: {}", version)?;
            }
            if let Some(at) = status.checked_at() {
                writeln!(out, "Checked: {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
            }
            for (key, value) in &status.extra {
                writeln!(out, "{}: {}", key, value)?;
            }
        }
        Ok(())
    })
}

pub fn models(catalog: &ModelCatalog) -> String {
    buffered(|out| {
        for (mode, info) in &catalog.modes {
            write!(out, "{:<10} {}", mode, info.description)?;
            if let Some(typical) = &info.typical_response_time {
                write!(out, " (typically {})", typical)?;
            }
            writeln!(out)?;
            for model in &info.models {
                writeln!(out, "    {}", model)?;
            }
        }
        Ok(())
    })
}

pub fn analysis(analysis: &QueryAnalysis) -> String {
    let prompt = &analysis.query_analysis;
    buffered(|out| {
        writeln!(
            out,
            "Words: {}  complexity: {}  est. tokens: {}",
            prompt.word_count,
            prompt.complexity,
            to_fixed_safe(prompt.estimated_tokens, 0)
        )?;
        if let Some(kind) = &prompt.query_type {
            writeln!(out, "Query type: {}", kind)?;
        }
        writeln!(out, "Suggested mode: {}", analysis.suggested_mode)?;
        for (mode, rec) in &analysis.recommendations {
            writeln!(
                out,
                "  {:<10} {:>8} {:>9}  {}",
                mode,
                millis(rec.estimated_time_ms),
                money(rec.estimated_cost),
                rec.models.join(", ")
            )?;
        }
        Ok(())
    })
}

pub fn realtime(metrics: &RealtimeMetrics) -> String {
    buffered(|out| {
        writeln!(
            out,
            "Requests/min:    {}",
            to_fixed_safe(metrics.current_requests_per_minute, 1)
        )?;
        writeln!(out, "Connections:     {}", metrics.active_connections)?;
        writeln!(
            out,
            "Avg response:    {}",
            seconds(metrics.avg_response_time_last_minute)
        )?;
        writeln!(out, "Error rate:      {}", whole_percent(metrics.error_rate_percent))?;
        writeln!(out, "Cache hit rate:  {}", fraction(metrics.cache_hit_rate))
    })
}

/// One-shot view of `GET /jobs/{id}`
pub fn job(job_id: &str, snapshot: &JobSnapshot) -> String {
    match snapshot {
        JobSnapshot::InProgress { status, progress } => {
            let percent = progress
                .map(|p| format!(" {}%", p))
                .unwrap_or_default();
            format!("Job {}: {}{}", job_id, status, percent)
        }
        JobSnapshot::Completed(response) => {
            format!("Job {}: completed\n\n{}", job_id, query_response(response))
        }
        JobSnapshot::Failed { status, message } => {
            format!("Job {}: {} ({})", job_id, status, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::schemas::{validate_query_response, validate_usage_stats};
    use serde_json::json;

    #[test]
    fn test_query_response_marks_winner() {
        let response = validate_query_response(&json!({
            "request_id": "r1",
            "answer": "Paris",
            "confidence": 0.92,
            "winner_model": "gpt-4",
            "response_time_ms": 1500,
            "models_used": ["gpt-4", "claude"],
            "total_cost": 0.0123,
            "model_metrics": [
                {"model": "claude", "response": "Paris.", "confidence": 0.8,
                 "response_time_ms": 900, "cost": 0.004, "rank_position": 2, "is_winner": false},
                {"model": "gpt-4", "response": "Paris", "confidence": 0.92,
                 "response_time_ms": 1500, "cost": 0.0083, "rank_position": 1, "is_winner": true}
            ]
        }))
        .unwrap();

        let text = query_response(&response);
        assert!(text.starts_with("Paris"));
        assert!(text.contains("confidence 92.0%"));
        assert!(text.contains("cost $0.0123"));
        assert!(text.contains("time 1.5s"));
        let winner_line = text.lines().find(|l| l.contains("#1")).unwrap();
        assert!(winner_line.trim_start().starts_with('*'));
    }

    #[test]
    fn test_usage_shows_busiest_day() {
        let stats = validate_usage_stats(&json!({
            "total_requests": 30,
            "total_cost": 1.5,
            "avg_response_time": 1.8,
            "avg_confidence": 0.9,
            "top_models": [{"name": "gpt-4", "usage_percentage": 60, "avg_score": 0.91}],
            "daily_usage": [
                {"date": "2024-01-01", "requests": 10, "cost": 0.5},
                {"date": "2024-01-02", "requests": 20, "cost": 1.0}
            ]
        }))
        .unwrap();

        let text = usage(&stats, 7);
        assert!(text.contains("last 7 days"));
        assert!(text.contains("$1.50"));
        assert!(text.contains("Avg response:    1.8s"));
        assert!(text.contains("60.0%"));
        assert!(text.contains("Busiest day: 2024-01-02"));
    }

    #[test]
    fn test_health_unreachable() {
        assert_eq!(health(None, false), "Backend: unreachable");
    }

    #[test]
    fn test_realtime_average_in_seconds() {
        let metrics = RealtimeMetrics {
            current_requests_per_minute: 42.0,
            active_connections: 7,
            avg_response_time_last_minute: 2.1,
            error_rate_percent: 0.4,
            cache_hit_rate: 0.35,
            timestamp: None,
        };
        let text = realtime(&metrics);
        assert!(text.contains("Avg response:    2.1s"));
        assert!(text.contains("Error rate:      0.4%"));
        assert!(text.contains("Cache hit rate:  35.0%"));

        let sub_second = RealtimeMetrics {
            avg_response_time_last_minute: 0.45,
            ..metrics
        };
        assert!(realtime(&sub_second).contains("Avg response:    450ms"));
    }

    #[test]
    fn test_job_views() {
        use crate::api::JobStatus;

        let running = JobSnapshot::InProgress {
            status: JobStatus::Processing,
            progress: Some(40),
        };
        assert_eq!(job("j1", &running), "Job j1: processing 40%");

        let failed = JobSnapshot::Failed {
            status: JobStatus::Failed,
            message: "all models failed".to_string(),
        };
        assert_eq!(job("j1", &failed), "Job j1: failed (all models failed)");
    }
}
