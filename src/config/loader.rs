// Configuration loader
// Loads settings from ~/.nextagi/config.toml, then applies environment overrides

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::settings::{AuthProfile, Config};

pub const ENV_API_URL: &str = "NEXTAGI_API_URL";
pub const ENV_API_KEY: &str = "NEXTAGI_API_KEY";
pub const ENV_AUTH_PROFILE: &str = "NEXTAGI_AUTH_PROFILE";

/// Default config location
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".nextagi/config.toml"))
}

/// Load configuration from the NextAGI config file and environment
///
/// A missing file is not an error: defaults apply and the environment can
/// still supply the base URL and API key.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    let mut config = load_config_file(&path)?.unwrap_or_default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse a config file, returning `None` if it does not exist
pub fn load_config_file(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    debug!(path = %path.display(), base_url = %config.api.base_url, "Loaded config file");
    Ok(Some(config))
}

/// Apply environment overrides using `lookup` (injectable for tests)
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
        config.api.base_url = url.trim().to_string();
    }
    if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
        config.api.api_key = Some(key.trim().to_string());
    }
    if let Some(profile) = lookup(ENV_AUTH_PROFILE).filter(|v| !v.trim().is_empty()) {
        config.api.auth = profile
            .parse::<AuthProfile>()
            .with_context(|| format!("Invalid {}", ENV_AUTH_PROFILE))?;
    }
    Ok(())
}
