// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{
    apply_env_overrides, config_path, load_config, load_config_file, ENV_API_KEY, ENV_API_URL,
    ENV_AUTH_PROFILE,
};
pub use settings::{
    ApiConfig, AuthProfile, Config, DashboardConfig, PollingConfig, DEFAULT_BASE_URL,
    MAX_HEALTH_TIMEOUT_MS,
};
