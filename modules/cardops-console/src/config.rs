use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use cardops_client::{DEFAULT_BASE_URL, DEFAULT_HEALTH_URL};

use crate::shell::DEFAULT_HEALTH_INTERVAL;
use crate::staging::DEFAULT_POLL_INTERVAL;

/// Console configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    // Backend
    pub api_url: String,
    pub health_url: String,
    pub request_timeout: Duration,

    // Credentials
    pub email: Option<String>,
    pub password: Option<String>,
    pub corporate: Option<String>,

    // Timing
    pub poll_interval: Duration,
    pub health_interval: Duration,

    pub download_dir: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            health_url: DEFAULT_HEALTH_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            email: None,
            password: None,
            corporate: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    /// Build from any key lookup. Unset and empty values fall back to
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_url: get("CARDOPS_API_URL").unwrap_or(defaults.api_url),
            health_url: get("CARDOPS_HEALTH_URL").unwrap_or(defaults.health_url),
            request_timeout: seconds(&get, "CARDOPS_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            email: get("CARDOPS_EMAIL"),
            password: get("CARDOPS_PASSWORD"),
            corporate: get("CARDOPS_CORPORATE"),
            poll_interval: seconds(&get, "CARDOPS_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            health_interval: seconds(&get, "CARDOPS_HEALTH_INTERVAL_SECS", defaults.health_interval)?,
            download_dir: get("CARDOPS_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
        })
    }

    /// Both email and password are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n: usize = val.chars().take(3).map(char::len_utf8).sum();
            format!("{}...({} chars)", &val[..n], val.len())
        }
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  CARDOPS_API_URL: {}", self.api_url);
        tracing::info!("  CARDOPS_HEALTH_URL: {}", self.health_url);
        tracing::info!("  CARDOPS_EMAIL: {}", self.email.as_deref().unwrap_or("<not set>"));
        tracing::info!("  CARDOPS_PASSWORD: {}", preview_opt(&self.password));
        tracing::info!("  CARDOPS_CORPORATE: {}", self.corporate.as_deref().unwrap_or("<not set>"));
        tracing::info!("  poll every {:?}, health every {:?}", self.poll_interval, self.health_interval);
    }
}

fn seconds(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match get(key) {
        Some(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of seconds, got {raw:?}"))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}
