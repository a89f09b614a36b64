use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use jobpilot_engine::backend::BackendError;
use jobpilot_engine::config::BrowserConfig;
use serde_json::{Map, Value, json};

/// Where the WebDriver server lives and how the session is shaped.
#[derive(Debug, Clone)]
pub struct WebDriverOptions {
    pub url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl WebDriverOptions {
    pub fn new(url: impl Into<String>) -> Self {
        let defaults = BrowserConfig::default();
        Self {
            url: url.into(),
            headless: defaults.headless,
            window_width: defaults.window_width,
            window_height: defaults.window_height,
        }
    }

    /// `None` when the configuration names no driver.
    pub fn from_config(browser: &BrowserConfig) -> Option<Self> {
        browser.webdriver_url.as_ref().map(|url| Self {
            url: url.clone(),
            headless: browser.headless,
            window_width: browser.window_width,
            window_height: browser.window_height,
        })
    }

    /// W3C capabilities. Vendor blocks for both Chrome and Firefox are sent;
    /// a driver ignores the ones it does not own.
    pub fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        if self.headless {
            let size = format!("--window-size={},{}", self.window_width, self.window_height);
            caps.insert(
                "goog:chromeOptions".into(),
                json!({ "args": ["--headless=new", size] }),
            );
            caps.insert(
                "moz:firefoxOptions".into(),
                json!({ "args": ["-headless"] }),
            );
        }
        caps
    }
}

pub struct WebDriverClient {
    pub client: Client,
}

impl WebDriverClient {
    pub async fn connect(options: &WebDriverOptions) -> Result<Self, BackendError> {
        let client = ClientBuilder::native()
            .capabilities(options.capabilities())
            .connect(&options.url)
            .await
            .map_err(|e| {
                BackendError::Other(format!(
                    "Failed to connect to WebDriver at {}: {}",
                    options.url, e
                ))
            })?;

        if !options.headless
            && let Err(e) = client
                .set_window_size(options.window_width, options.window_height)
                .await
        {
            tracing::debug!("Driver refused window size: {}", e);
        }

        Ok(Self { client })
    }

    pub async fn close(self) -> Result<(), BackendError> {
        self.client
            .close()
            .await
            .map_err(|e| BackendError::Other(format!("Failed to close session: {}", e)))
    }
}

/// A dropped connection or a dead session cannot be retried; anything else is
/// an ordinary command failure.
pub fn map_cmd_error(err: CmdError) -> BackendError {
    let message = err.to_string();
    if matches!(err, CmdError::Lost(_)) || message.contains("invalid session id") {
        BackendError::ConnectionLost(message)
    } else {
        BackendError::ScriptError(message)
    }
}
