// Configuration structs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Liveness probes never wait longer than this
pub const MAX_HEALTH_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Config pointing at `base_url` with everything else defaulted
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                ..ApiConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid api.base_url: {}", self.api.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            bail!("api.base_url must use http or https, got '{}'", url.scheme());
        }
        if self.api.timeout_ms == 0 {
            bail!("api.timeout_ms must be greater than 0");
        }
        if self.polling.default_interval_ms == 0 {
            bail!("polling.default_interval_ms must be greater than 0");
        }
        if self.polling.default_interval_ms > self.polling.max_interval_ms {
            bail!(
                "polling.default_interval_ms ({}) exceeds polling.max_interval_ms ({})",
                self.polling.default_interval_ms,
                self.polling.max_interval_ms
            );
        }
        if self.polling.max_attempts == 0 || self.polling.max_polling_time_ms == 0 {
            bail!("polling budget must allow at least one poll");
        }
        if self.dashboard.refresh_interval_secs == 0 {
            bail!("dashboard.refresh_interval_secs must be greater than 0");
        }
        Ok(())
    }
}

/// How credentials are attached to outgoing requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProfile {
    /// `Authorization: Bearer <key>` on every endpoint not listed as unauthenticated
    #[default]
    Bearer,
    /// No credentials anywhere (local no-auth backend builds)
    Development,
}

impl std::str::FromStr for AuthProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bearer" => Ok(AuthProfile::Bearer),
            "development" | "dev" => Ok(AuthProfile::Development),
            other => bail!("Unknown auth profile '{}' (expected 'bearer' or 'development')", other),
        }
    }
}

/// Connection settings for the routing backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL including the API prefix (e.g., "http://localhost:8000/api/v1")
    pub base_url: String,
    pub api_key: Option<String>,
    pub auth: AuthProfile,
    /// Endpoint paths sent without credentials even under the bearer profile
    pub unauthenticated_paths: Vec<String>,
    /// Per-call timeout
    pub timeout_ms: u64,
    /// Retries after the first attempt (5xx and transport failures only)
    pub max_retries: u32,
    /// Linear backoff unit: delay before retry n is `retry_base_delay_ms * n`
    pub retry_base_delay_ms: u64,
    pub health_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            auth: AuthProfile::Bearer,
            unauthenticated_paths: Vec::new(),
            timeout_ms: 10_000,
            max_retries: 2,
            retry_base_delay_ms: 1_000,
            health_timeout_ms: MAX_HEALTH_TIMEOUT_MS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms.min(MAX_HEALTH_TIMEOUT_MS))
    }
}

/// Async job polling budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Used when the server does not suggest an interval
    pub default_interval_ms: u64,
    /// Server-suggested intervals are clamped to this
    pub max_interval_ms: u64,
    pub max_attempts: u32,
    pub max_polling_time_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 500,
            max_interval_ms: 5_000,
            max_attempts: 120,
            max_polling_time_ms: 60_000,
        }
    }
}

impl PollingConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    pub fn max_polling_time(&self) -> Duration {
        Duration::from_millis(self.max_polling_time_ms)
    }

    /// Resolve the interval to use for a job, given what the server suggested
    pub fn interval_for(&self, suggested_ms: Option<u64>) -> Duration {
        let ms = match suggested_ms {
            Some(ms) if ms > 0 => ms.min(self.max_interval_ms),
            _ => self.default_interval_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Terminal dashboard settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub usage_days: u32,
    pub refresh_interval_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            usage_days: 30,
            refresh_interval_secs: 30,
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
