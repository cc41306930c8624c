// CLI module
// Subcommand handlers and terminal rendering for the `nextagi` binary

mod commands;
pub mod render;

pub use commands::{
    run_analyze, run_health, run_job, run_metrics, run_models, run_query, run_usage, QueryOutput,
};
