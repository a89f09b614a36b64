use super::schema::JobPilotConfig;
use crate::strategy::StrategyError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const ENV_URL: &str = "JOBPILOT_URL";
pub const ENV_USERNAME: &str = "JOBPILOT_USERNAME";
pub const ENV_PASSWORD: &str = "JOBPILOT_PASSWORD";
pub const ENV_HEADLESS: &str = "JOBPILOT_HEADLESS";
pub const ENV_BROWSER_TIMEOUT: &str = "JOBPILOT_BROWSER_TIMEOUT";
pub const ENV_WEBDRIVER_URL: &str = "JOBPILOT_WEBDRIVER_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid console URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid strategy override: {0}")]
    Strategy(#[from] StrategyError),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./jobpilot.yaml
    /// 2. ~/.jobpilot/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<JobPilotConfig, ConfigError> {
        let local_config = PathBuf::from("./jobpilot.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".jobpilot").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(JobPilotConfig::default())
    }

    /// Load and validate one file. An empty file yields the defaults.
    pub async fn load_from(path: &Path) -> Result<JobPilotConfig, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let config: JobPilotConfig = if content.trim().is_empty() {
            JobPilotConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };
        Self::validate(&config)?;
        Ok(config)
    }

    /// `path` if given, otherwise the default locations; then environment
    /// overrides and validation.
    pub async fn load(path: Option<&Path>) -> Result<JobPilotConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path).await?,
            None => Self::load_default().await?,
        };
        Self::apply_env(&mut config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Apply `JOBPILOT_*` overrides from the process environment.
    pub fn apply_env(config: &mut JobPilotConfig) -> Result<(), ConfigError> {
        Self::apply_env_from(config, |key| std::env::var(key).ok())
    }

    /// Apply `JOBPILOT_*` overrides from an arbitrary lookup.
    pub fn apply_env_from<F>(config: &mut JobPilotConfig, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            config.console.url = url;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            config.credentials.username = Some(username);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.credentials.password = Some(password);
        }
        if let Some(headless) = lookup(ENV_HEADLESS) {
            config.browser.headless = parse_bool(ENV_HEADLESS, &headless)?;
        }
        if let Some(timeout) = lookup(ENV_BROWSER_TIMEOUT) {
            config.browser.default_timeout_ms = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be a number of milliseconds, got '{}'",
                    ENV_BROWSER_TIMEOUT, timeout
                ))
            })?;
        }
        if let Some(webdriver) = lookup(ENV_WEBDRIVER_URL) {
            config.browser.webdriver_url = (!webdriver.is_empty()).then_some(webdriver);
        }
        Ok(())
    }

    pub fn validate(config: &JobPilotConfig) -> Result<(), ConfigError> {
        url::Url::parse(&config.console.url).map_err(|source| ConfigError::InvalidUrl {
            url: config.console.url.clone(),
            source,
        })?;
        if config.discovery.max_jobs == 0 {
            return Err(ConfigError::Invalid(
                "discovery.max_jobs must be greater than zero".into(),
            ));
        }
        config.strategy_overrides()?;
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid(format!(
            "{} must be true or false, got '{}'",
            key, other
        ))),
    }
}
