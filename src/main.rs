// NextAGI - Multi-model routing dashboard
// Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use nextagi::api::{ApiClient, QueryMode, QueryRequest};
use nextagi::cli::{self, QueryOutput};
use nextagi::config::{apply_env_overrides, load_config, load_config_file, Config};
use nextagi::errors::{describe, ApiError};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "nextagi")]
#[command(about = "Multi-model routing dashboard", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Override the API base URL
    #[arg(long = "api-url", global = true)]
    api_url: Option<String>,

    /// Read configuration from this file instead of ~/.nextagi/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Route a prompt across models and print the winning answer
    Query {
        /// Prompt text
        prompt: String,
        /// Routing mode (speed, balanced, quality, cost)
        #[arg(long, default_value_t = QueryMode::Balanced)]
        mode: QueryMode,
        /// Number of models to consult (1-5)
        #[arg(long = "max-models")]
        max_models: Option<u32>,
        /// Spending cap for this query in USD
        #[arg(long)]
        budget: Option<f64>,
        /// Ask for the router's reasoning
        #[arg(long)]
        reasoning: bool,
        /// Use the backend's fast path
        #[arg(long)]
        fast: bool,
        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show usage statistics
    Usage {
        /// History window in days (1-365)
        #[arg(long)]
        days: Option<u32>,
        /// Keep refreshing every N seconds
        #[arg(long = "watch", value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Check backend health
    Health {
        /// Keep refreshing every N seconds
        #[arg(long = "watch", value_name = "SECS")]
        watch: Option<u64>,
    },
    /// List routing modes and their models
    Models,
    /// Recommend a mode for a prompt without running it
    Analyze {
        prompt: String,
    },
    /// Show realtime backend metrics
    Metrics {
        /// Keep refreshing every N seconds
        #[arg(long = "watch", value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Show the current state of an async query job
    Job {
        job_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = resolve_config(&args)?;
    let client = ApiClient::new(&config).context("Failed to create API client")?;

    let result = match args.command {
        Command::Query {
            prompt,
            mode,
            max_models,
            budget,
            reasoning,
            fast,
            json,
        } => {
            let mut request = QueryRequest::new(prompt).with_mode(mode);
            if reasoning {
                request = request.with_reasoning(true);
            }
            if let Some(max_models) = max_models {
                request = request.with_max_models(max_models);
            }
            if let Some(budget) = budget {
                request = request.with_budget_limit(budget);
            }
            cli::run_query(client, request, QueryOutput { fast, json }).await
        }
        Command::Usage { days, watch } => {
            let days = days.unwrap_or(config.dashboard.usage_days);
            cli::run_usage(client, days, watch).await
        }
        Command::Health { watch } => cli::run_health(client, watch).await,
        Command::Models => cli::run_models(client).await,
        Command::Analyze { prompt } => cli::run_analyze(client, &prompt).await,
        Command::Metrics { watch } => cli::run_metrics(client, watch).await,
        Command::Job { job_id } => cli::run_job(client, &job_id).await,
    };

    if let Err(e) = result {
        if let Some(api_error) = e.downcast_ref::<ApiError>() {
            eprintln!("{}", describe(api_error));
            std::process::exit(1);
        }
        return Err(e);
    }
    Ok(())
}

/// Config file (explicit or default), then environment, then `--api-url`
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = load_config_file(path)?
                .with_context(|| format!("Config file not found: {}", path.display()))?;
            apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
            config
        }
        None => load_config()?,
    };

    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(verbose: bool) {
    // RUST_LOG wins over --verbose
    let default_filter = if verbose { "nextagi=debug" } else { "nextagi=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
