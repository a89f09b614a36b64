use crate::session::UnknownSessionPolicy;
use crate::strategy::{CandidateList, CandidateStrategy, StrategyError, StrategyTable, TargetKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPilotConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    /// Per-target candidate lists that replace the built-in ones.
    #[serde(default)]
    pub strategies: BTreeMap<TargetKey, Vec<CandidateStrategy>>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl JobPilotConfig {
    /// Overrides as validated candidate lists; an empty list names its key.
    pub fn strategy_overrides(&self) -> Result<BTreeMap<TargetKey, CandidateList>, StrategyError> {
        self.strategies
            .iter()
            .map(|(key, strategies)| {
                CandidateList::new(strategies.clone())
                    .map(|list| (*key, list))
                    .map_err(|_| StrategyError::Empty(key.to_string()))
            })
            .collect()
    }

    /// Built-in strategies with the configured overrides applied.
    pub fn strategy_table(&self) -> Result<StrategyTable, StrategyError> {
        Ok(StrategyTable::builtin().with_overrides(&self.strategy_overrides()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_console_url")]
    pub url: String,
    /// Path joined onto `url` when no navigation link resolves.
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
    /// A current URL containing any of these is treated as the listing view.
    #[serde(default = "default_listing_url_markers")]
    pub listing_url_markers: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            url: default_console_url(),
            listing_path: default_listing_path(),
            listing_url_markers: default_listing_url_markers(),
        }
    }
}

impl ConsoleConfig {
    pub fn listing_url(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.listing_path.trim_start_matches('/')
        )
    }

    pub fn is_listing_url(&self, current: &str) -> bool {
        self.listing_url_markers
            .iter()
            .any(|marker| current.contains(marker.as_str()))
    }
}

fn default_console_url() -> String {
    "https://platform.uipath.com".to_string()
}

fn default_listing_path() -> String {
    "jobs".to_string()
}

fn default_listing_url_markers() -> Vec<String> {
    vec!["/jobs".to_string(), "/processes".to_string()]
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Both values present and non-empty.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_browser_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// How long a visible browser stays open after the flow ends.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
    /// Connect to this WebDriver endpoint instead of launching Chromium.
    #[serde(default)]
    pub webdriver_url: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            default_timeout_ms: default_browser_timeout_ms(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            linger_ms: default_linger_ms(),
            webdriver_url: None,
        }
    }
}

impl BrowserConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

fn default_browser_timeout_ms() -> u64 {
    30000
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_linger_ms() -> u64 {
    5000
}

/// Every bounded wait the orchestrator performs, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_probe_ms")]
    pub probe_ms: u64,
    #[serde(default = "default_negative_probe_ms")]
    pub negative_probe_ms: u64,
    #[serde(default = "default_job_row_ms")]
    pub job_row_ms: u64,
    #[serde(default)]
    pub row_name_probe_ms: u64,
    #[serde(default = "default_quiescence_ms")]
    pub quiescence_ms: u64,
    #[serde(default = "default_post_login_ms")]
    pub post_login_ms: u64,
    #[serde(default = "default_listing_settle_ms")]
    pub listing_settle_ms: u64,
    #[serde(default = "default_post_trigger_settle_ms")]
    pub post_trigger_settle_ms: u64,
    #[serde(default = "default_inter_job_delay_ms")]
    pub inter_job_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            probe_ms: default_probe_ms(),
            negative_probe_ms: default_negative_probe_ms(),
            job_row_ms: default_job_row_ms(),
            row_name_probe_ms: 0,
            quiescence_ms: default_quiescence_ms(),
            post_login_ms: default_post_login_ms(),
            listing_settle_ms: default_listing_settle_ms(),
            post_trigger_settle_ms: default_post_trigger_settle_ms(),
            inter_job_delay_ms: default_inter_job_delay_ms(),
        }
    }
}

impl TimingConfig {
    /// No waiting at all: single-shot probes and no settle delays.
    pub fn none() -> Self {
        Self {
            probe_ms: 0,
            negative_probe_ms: 0,
            job_row_ms: 0,
            row_name_probe_ms: 0,
            quiescence_ms: 0,
            post_login_ms: 0,
            listing_settle_ms: 0,
            post_trigger_settle_ms: 0,
            inter_job_delay_ms: 0,
        }
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn negative_probe(&self) -> Duration {
        Duration::from_millis(self.negative_probe_ms)
    }

    pub fn job_row(&self) -> Duration {
        Duration::from_millis(self.job_row_ms)
    }

    pub fn row_name_probe(&self) -> Duration {
        Duration::from_millis(self.row_name_probe_ms)
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn post_login(&self) -> Duration {
        Duration::from_millis(self.post_login_ms)
    }

    pub fn listing_settle(&self) -> Duration {
        Duration::from_millis(self.listing_settle_ms)
    }

    pub fn post_trigger_settle(&self) -> Duration {
        Duration::from_millis(self.post_trigger_settle_ms)
    }

    pub fn inter_job_delay(&self) -> Duration {
        Duration::from_millis(self.inter_job_delay_ms)
    }
}

fn default_probe_ms() -> u64 {
    2000
}

fn default_negative_probe_ms() -> u64 {
    1000
}

fn default_job_row_ms() -> u64 {
    5000
}

fn default_quiescence_ms() -> u64 {
    30000
}

fn default_post_login_ms() -> u64 {
    10000
}

fn default_listing_settle_ms() -> u64 {
    2000
}

fn default_post_trigger_settle_ms() -> u64 {
    2000
}

fn default_inter_job_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
        }
    }
}

fn default_max_jobs() -> usize {
    50
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub on_unknown: UnknownSessionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_debug_screenshot")]
    pub debug_screenshot: String,
    #[serde(default = "default_error_screenshot")]
    pub error_screenshot: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            debug_screenshot: default_debug_screenshot(),
            error_screenshot: default_error_screenshot(),
        }
    }
}

impl ArtifactsConfig {
    pub fn debug_screenshot_path(&self) -> PathBuf {
        self.dir.join(&self.debug_screenshot)
    }

    pub fn error_screenshot_path(&self) -> PathBuf {
        self.dir.join(&self.error_screenshot)
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_debug_screenshot() -> String {
    "jobs_page_debug.png".to_string()
}

fn default_error_screenshot() -> String {
    "error_screenshot.png".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file written alongside stderr. `null` disables it.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("jobpilot.log"))
}

fn default_log_level() -> String {
    "info".to_string()
}
