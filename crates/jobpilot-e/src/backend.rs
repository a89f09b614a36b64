use crate::webdriver::{WebDriverClient, WebDriverOptions, map_cmd_error};
use async_trait::async_trait;
use jobpilot_engine::backend::{Backend, BackendError, NavigationResult};
use jobpilot_engine::protocol::{LocatorData, LocatorRequest, LocatorResponse};
use std::time::Duration;
use tracing::{info, warn};

/// Retries while the page is between documents and the locator global is gone.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);
const READY_POLL: Duration = Duration::from_millis(100);

const PROCESS_SCRIPT: &str = "return window.JobPilot.process(arguments[0]);";

/// A browser driven through an external WebDriver server (chromedriver,
/// geckodriver, Selenium).
pub struct WebDriverBackend {
    client: Option<WebDriverClient>,
    options: WebDriverOptions,
}

impl WebDriverBackend {
    pub fn new(options: WebDriverOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    /// Connect to a driver with default session settings.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WebDriverOptions::new(url))
    }

    fn client(&self) -> Result<&WebDriverClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }

    async fn get_navigation_result(
        client: &WebDriverClient,
    ) -> Result<NavigationResult, BackendError> {
        let title = client.client.title().await.unwrap_or_default();
        let url = client
            .client
            .current_url()
            .await
            .map_err(map_cmd_error)?
            .to_string();
        Ok(NavigationResult { url, title })
    }

    async fn ensure_injected(client: &WebDriverClient) -> Result<(), BackendError> {
        let loaded = client
            .client
            .execute("return typeof window.JobPilot !== 'undefined';", vec![])
            .await
            .map_err(map_cmd_error)?
            .as_bool()
            .unwrap_or(false);
        if !loaded {
            info!("Injecting locator...");
            client
                .client
                .execute(jobpilot_scanner::LOCATOR_JS, vec![])
                .await
                .map_err(map_cmd_error)?;
        }
        Ok(())
    }
}

fn is_missing_locator(message: &str) -> bool {
    message.contains("JobPilot is not defined")
        || message.contains("undefined is not an object")
        || message.contains("Cannot read properties of undefined")
}

#[async_trait]
impl Backend for WebDriverBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Connecting to external WebDriver at {}...", self.options.url);
        let client = WebDriverClient::connect(&self.options).await?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let client = self.client()?;

        info!("Navigating to: {}", url);
        client
            .client
            .goto(url)
            .await
            .map_err(|e| match map_cmd_error(e) {
                BackendError::ScriptError(msg) => BackendError::Navigation(msg),
                other => other,
            })?;

        Self::get_navigation_result(client).await
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        let client = self.client()?;
        Ok(client
            .client
            .current_url()
            .await
            .map_err(map_cmd_error)?
            .to_string())
    }

    async fn wait_for_quiescence(&mut self, timeout: Duration) -> Result<(), BackendError> {
        let client = self.client()?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = client
                .client
                .execute("return document.readyState;", vec![])
                .await
                .map_err(map_cmd_error)?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BackendError::Timeout(format!(
                    "page not loaded after {}ms",
                    timeout.as_millis()
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client()?;
        client
            .client
            .screenshot()
            .await
            .map_err(|e| match map_cmd_error(e) {
                BackendError::ScriptError(msg) => {
                    BackendError::Other(format!("Screenshot failed: {}", msg))
                }
                other => other,
            })
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        let client = self.client()?;
        // WebDriver private-use code points for named keys.
        let keys = match key {
            "Enter" => "\u{e007}",
            "Tab" => "\u{e004}",
            "Escape" => "\u{e00c}",
            other => other,
        };
        let focused = client.client.active_element().await.map_err(map_cmd_error)?;
        focused.send_keys(keys).await.map_err(map_cmd_error)
    }

    async fn execute_locator(
        &mut self,
        request: &LocatorRequest,
    ) -> Result<LocatorData, BackendError> {
        let client = self.client()?;
        let args = serde_json::to_value(request)?;
        tracing::trace!("Locator op: {}", request.op());

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                warn!("Retrying {} (attempt {})...", request.op(), attempt);
                tokio::time::sleep(RETRY_DELAY).await;
            }

            Self::ensure_injected(client).await?;

            match client.client.execute(PROCESS_SCRIPT, vec![args.clone()]).await {
                // The document was replaced between injection and the call.
                Ok(value) if value.is_null() => {
                    last_error = Some(BackendError::ScriptError(format!(
                        "{} returned null",
                        request.op()
                    )));
                }
                Ok(value) => {
                    let response: LocatorResponse = serde_json::from_value(value)?;
                    return response.into_result();
                }
                Err(e) => match map_cmd_error(e) {
                    BackendError::ScriptError(msg) if is_missing_locator(&msg) => {
                        last_error = Some(BackendError::ScriptError(msg));
                    }
                    other => return Err(other),
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BackendError::ScriptError(format!("{} failed after retries", request.op()))
        }))
    }
}
