// Refresher and QueryRunner against a mock backend

use mockito::{Matcher, Server, ServerGuard};
use nextagi::api::{ApiClient, QueryRequest};
use nextagi::config::Config;
use nextagi::errors::{ApiError, ErrorKind};
use nextagi::monitor::{QueryRunner, Refresher};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn client(server: &ServerGuard) -> ApiClient {
    let mut config = Config::new(server.url());
    config.api.max_retries = 0;
    config.polling.default_interval_ms = 20;
    config.polling.max_interval_ms = 100;
    ApiClient::new(&config).unwrap()
}

fn usage_body(total_requests: u64) -> String {
    json!({
        "total_requests": total_requests,
        "total_cost": 1.25,
        "avg_response_time": 0.64,
        "avg_confidence": 0.87,
        "top_models": [{"name": "m1", "usage_percentage": 100, "avg_score": 0.9}],
        "daily_usage": [{"date": "2024-03-01", "requests": total_requests, "cost": 1.25}]
    })
    .to_string()
}

fn answer(request_id: &str) -> String {
    json!({
        "request_id": request_id,
        "answer": "done",
        "confidence": 0.9,
        "winner_model": "m1",
        "model_metrics": [{
            "model": "m1", "response": "done", "confidence": 0.9,
            "response_time_ms": 12, "cost": 0.001, "rank_position": 1, "is_winner": true
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_usage_refresh_keeps_stale_data_on_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/usage")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(usage_body(10))
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/usage")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let refresher = Refresher::usage(client(&server), 30, Duration::from_secs(3600));
    let mut state = refresher.subscribe();
    state
        .wait_for(|s| s.data.is_some() && !s.loading)
        .await
        .unwrap();

    refresher.refresh_now();
    let snapshot = state.wait_for(|s| s.error.is_some()).await.unwrap().clone();

    assert_eq!(snapshot.data.as_ref().map(|d| d.total_requests), Some(10));
    assert_eq!(snapshot.error.as_ref().map(ApiError::kind), Some(ErrorKind::Server));
    assert!(snapshot.is_stale());
    assert!(snapshot.updated_at.is_some());
}

#[tokio::test]
async fn test_usage_refresh_replaces_data_and_clears_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/usage")
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/usage")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(usage_body(25))
        .create_async()
        .await;

    let refresher = Refresher::usage(client(&server), 7, Duration::from_millis(30));
    let mut state = refresher.subscribe();
    state.wait_for(|s| s.error.is_some()).await.unwrap();

    let snapshot = state.wait_for(|s| s.data.is_some()).await.unwrap().clone();
    assert_eq!(snapshot.data.map(|d| d.total_requests), Some(25));
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_realtime_refresher_polls_on_interval() {
    let mut server = Server::new_async().await;
    let metrics = server
        .mock("GET", "/metrics/realtime")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "current_requests_per_minute": 12.5,
                "active_connections": 4,
                "avg_response_time_last_minute": 1.7,
                "error_rate_percent": 0.5,
                "cache_hit_rate": 0.3,
                "timestamp": "2024-03-01T12:00:00Z"
            })
            .to_string(),
        )
        .expect_at_least(2)
        .create_async()
        .await;

    let refresher = Refresher::realtime(client(&server), Duration::from_millis(30));
    let mut state = refresher.subscribe();
    let snapshot = state.wait_for(|s| s.data.is_some()).await.unwrap().clone();
    let data = snapshot.data.unwrap();
    assert_eq!(data.active_connections, 4);
    assert_eq!(data.avg_response_time_last_minute, 1.7);

    // Second fetch comes from the timer, not a manual trigger
    let first_update = snapshot.updated_at;
    state
        .wait_for(|s| s.updated_at != first_update && !s.loading)
        .await
        .unwrap();
    refresher.stop();
    metrics.assert_async().await;
}

#[tokio::test]
async fn test_health_refresher_reports_unreachable_backend() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "healthy", "version": "2.0.0", "models_online": 5}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/health")
        .with_status(503)
        .create_async()
        .await;

    let refresher = Refresher::health(client(&server), Duration::from_secs(3600));
    let mut state = refresher.subscribe();
    let healthy = state.wait_for(|s| s.data.is_some()).await.unwrap().clone();
    let status = healthy.data.unwrap();
    assert!(status.is_healthy());
    assert_eq!(status.version.as_deref(), Some("2.0.0"));
    assert_eq!(status.extra.get("models_online"), Some(&json!(5)));

    refresher.refresh_now();
    let degraded = state.wait_for(|s| s.error.is_some()).await.unwrap().clone();
    assert!(degraded.is_stale());
    assert_eq!(degraded.error.map(|e| e.kind()), Some(ErrorKind::Server));
}

#[tokio::test]
async fn test_query_runner_publishes_progress_and_result() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/query")
        .match_query(Matcher::Any)
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id": "j1", "poll_interval_ms": 20}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/jobs/j1")
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "processing", "progress": 40}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/jobs/j1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"status": "completed", "result": {}}}"#, answer("r-j1")))
        .create_async()
        .await;

    let runner = QueryRunner::new(client(&server));
    let mut state = runner.subscribe();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while state.changed().await.is_ok() {
            let snapshot = state.borrow_and_update().clone();
            seen.push(snapshot.progress);
            if !snapshot.loading {
                break;
            }
        }
        seen
    });

    let response = runner.submit(&QueryRequest::new("hello")).await.unwrap();
    assert_eq!(response.request_id, "r-j1");

    let final_state = runner.state();
    assert!(!final_state.loading);
    assert_eq!(final_state.job_id.as_deref(), Some("j1"));
    assert_eq!(final_state.progress, 100);
    assert_eq!(final_state.data.map(|d| d.request_id), Some("r-j1".to_string()));
    assert!(!runner.is_running());

    let seen = observer.await.unwrap();
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn test_new_submission_supersedes_previous() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/query")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({"prompt": "slow"})))
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id": "slow-job", "poll_interval_ms": 20}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/jobs/slow-job")
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "processing", "progress": 5}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/query")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({"prompt": "quick"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(answer("r-quick"))
        .create_async()
        .await;

    let runner = Arc::new(QueryRunner::new(client(&server)));
    let first = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.submit(&QueryRequest::new("slow")).await })
    };

    // Let the first query reach the polling stage
    let mut state = runner.subscribe();
    state.wait_for(|s| s.job_id.is_some()).await.unwrap();

    let second = runner.submit(&QueryRequest::new("quick")).await.unwrap();
    assert_eq!(second.request_id, "r-quick");

    let first = first.await.unwrap();
    assert!(matches!(first, Err(ApiError::Cancelled { .. })));

    let final_state = runner.state();
    assert!(final_state.error.is_none());
    assert_eq!(final_state.data.map(|d| d.request_id), Some("r-quick".to_string()));
}

#[tokio::test]
async fn test_cancel_records_cancellation() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/query")
        .match_query(Matcher::Any)
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job_id": "forever", "poll_interval_ms": 20}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/jobs/forever")
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "pending"}"#)
        .create_async()
        .await;

    let runner = Arc::new(QueryRunner::new(client(&server)));
    let task = {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move { runner.submit(&QueryRequest::new("x")).await })
    };

    let mut state = runner.subscribe();
    state.wait_for(|s| s.job_id.is_some()).await.unwrap();
    runner.cancel();

    let result = task.await.unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    let final_state = runner.state();
    assert!(!final_state.loading);
    assert_eq!(final_state.error.map(|e| e.kind()), Some(ErrorKind::Cancelled));
}
