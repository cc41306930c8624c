// NextAGI - Multi-model routing API client
// Library exports

pub mod api; // HTTP wrapper, validation, job polling
pub mod cli;
pub mod config;
pub mod errors;
pub mod format; // Total display formatters
pub mod monitor; // Background refresh and query state

pub use api::{ApiClient, QueryMode, QueryRequest, QueryResponse, SubmitOptions};
pub use config::{load_config, Config};
pub use errors::{ApiError, ErrorKind, ValidationError};
