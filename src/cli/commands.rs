// Dashboard commands
//
// One function per subcommand. Each prints to stdout and returns API errors
// unchanged so `main` can render them with a hint.

use anyhow::{Context, Result};
use futures::future;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use super::render;
use crate::api::{ApiClient, QueryRequest, SubmitOptions};
use crate::monitor::{QueryRunner, QueryState, Refresher};

/// Output switches for `query`
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOutput {
    pub fast: bool,
    pub json: bool,
}

pub async fn run_query(client: ApiClient, request: QueryRequest, output: QueryOutput) -> Result<()> {
    let runner = QueryRunner::new(client);
    let spinner = query_spinner(output.json)?;
    let updater = tokio::spawn(follow_progress(runner.subscribe(), spinner.clone()));

    let submit = runner.submit_with(&request, SubmitOptions::default().fast(output.fast));
    tokio::pin!(submit);

    let result = tokio::select! {
        result = &mut submit => result,
        _ = tokio::signal::ctrl_c() => {
            spinner.set_message("cancelling...");
            runner.cancel();
            submit.await
        }
    };

    updater.abort();
    spinner.finish_and_clear();
    let response = result?;

    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialize response")?
        );
    } else {
        println!("{}", render::query_response(&response));
    }
    Ok(())
}

fn query_spinner(hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .context("Invalid spinner template")?,
    );
    spinner.set_message("routing query...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

async fn follow_progress(mut state: watch::Receiver<QueryState>, spinner: ProgressBar) {
    while state.changed().await.is_ok() {
        let snapshot = state.borrow_and_update().clone();
        if let Some(job_id) = &snapshot.job_id {
            spinner.set_message(format!("job {} {}%", job_id, snapshot.progress));
        }
    }
}

pub async fn run_usage(client: ApiClient, days: u32, watch_secs: Option<u64>) -> Result<()> {
    let Some(secs) = watch_secs else {
        let stats = client.get_usage_stats(days).await?;
        println!("{}", render::usage(&stats, days));
        return Ok(());
    };

    let refresher = Refresher::usage(client, days, every(secs));
    follow_refresher("usage", &refresher, |stats| render::usage(stats, days)).await
}

/// Re-render every refreshed state until Ctrl-C
async fn follow_refresher<T, F>(name: &str, refresher: &Refresher<T>, view: F) -> Result<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> String,
{
    let mut state = refresher.subscribe();
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        let snapshot = state.borrow_and_update().clone();
        if snapshot.loading {
            continue;
        }
        if let Some(data) = &snapshot.data {
            let stamp = snapshot
                .updated_at
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            println!("\n[{}]\n{}", stamp, view(data));
        }
        if let Some(e) = &snapshot.error {
            eprintln!("{} refresh failed: {}", name, e);
        }
    }

    debug!(resource = name, "Stopping watch");
    refresher.stop();
    Ok(())
}

fn every(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

pub async fn run_health(client: ApiClient, watch_secs: Option<u64>) -> Result<()> {
    if let Some(secs) = watch_secs {
        let refresher = Refresher::health(client, every(secs));
        return follow_refresher("health", &refresher, |status| render::health(Some(status), true))
            .await;
    }

    let (reachable, detail) = future::join(client.health_check(), client.health()).await;
    let detail = match detail {
        Ok(status) => Some(status),
        Err(e) => {
            debug!(error = %e, "Detailed health unavailable");
            None
        }
    };
    println!("{}", render::health(detail.as_ref(), reachable));
    if !reachable {
        anyhow::bail!("backend at {} is not healthy", client.http().base_url());
    }
    Ok(())
}

pub async fn run_job(client: ApiClient, job_id: &str) -> Result<()> {
    let snapshot = client.job_status(job_id).await?;
    println!("{}", render::job(job_id, &snapshot));
    Ok(())
}

pub async fn run_models(client: ApiClient) -> Result<()> {
    let catalog = client.list_models().await?;
    println!("{}", render::models(&catalog));
    Ok(())
}

pub async fn run_analyze(client: ApiClient, prompt: &str) -> Result<()> {
    let analysis = client.analyze_query(prompt).await?;
    println!("{}", render::analysis(&analysis));
    Ok(())
}

pub async fn run_metrics(client: ApiClient, watch_secs: Option<u64>) -> Result<()> {
    if let Some(secs) = watch_secs {
        let refresher = Refresher::realtime(client, every(secs));
        return follow_refresher("realtime_metrics", &refresher, render::realtime).await;
    }

    let metrics = client.realtime_metrics().await?;
    println!("{}", render::realtime(&metrics));
    Ok(())
}
