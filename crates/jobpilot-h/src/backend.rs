use crate::cdp::{CdpClient, LaunchOptions, map_cdp_error};
use crate::inject::{run_locator, wait_for_ready_state};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use jobpilot_engine::backend::{Backend, BackendError, NavigationResult};
use jobpilot_engine::protocol::{LocatorData, LocatorRequest};
use std::time::Duration;
use tracing::info;

/// Extra idle time after `readyState` reports complete, for client-side
/// rendering that starts on the load event.
const IDLE_MARGIN: Duration = Duration::from_millis(500);

/// Chromium driven over CDP.
pub struct HeadlessBackend {
    client: Option<CdpClient>,
    options: LaunchOptions,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_options(LaunchOptions::default())
    }

    pub fn with_options(options: LaunchOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn client(&self) -> Result<&CdpClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, BackendError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }

    async fn dispatch_key(&self, params: DispatchKeyEventParams) -> Result<(), BackendError> {
        self.client()?
            .page
            .execute(params)
            .await
            .map_err(map_cdp_error)?;
        Ok(())
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Launching Headless Backend (Chromium)...");
        let client = CdpClient::launch(&self.options).await?;
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
        client.page.goto(url).await.map_err(|e| match map_cdp_error(e) {
            BackendError::ScriptError(msg) => BackendError::Navigation(msg),
            other => other,
        })?;

        Self::get_navigation_result(&client.page).await
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        let client = self.client()?;
        Ok(client
            .page
            .url()
            .await
            .map_err(map_cdp_error)?
            .unwrap_or_default())
    }

    async fn wait_for_quiescence(&mut self, timeout: Duration) -> Result<(), BackendError> {
        let client = self.client()?;
        wait_for_ready_state(&client.page, timeout).await?;
        tokio::time::sleep(IDLE_MARGIN.min(timeout)).await;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client()?;
        client
            .page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(map_cdp_error)
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        // Enter needs its text and key code or forms do not submit.
        let (text, code, key_code) = match key {
            "Enter" => (Some("\r"), "Enter", Some(13)),
            "Tab" => (None, "Tab", Some(9)),
            "Escape" => (None, "Escape", Some(27)),
            _ => (None, key, None),
        };

        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind.clone())
                .key(key)
                .code(code);
            if let Some(key_code) = key_code {
                builder = builder.windows_virtual_key_code(key_code);
            }
            if let (Some(text), DispatchKeyEventType::KeyDown) = (text, &kind) {
                builder = builder.text(text);
            }
            let params = builder
                .build()
                .map_err(|e| BackendError::Other(format!("Failed to build key event: {:?}", e)))?;
            self.dispatch_key(params).await?;
        }
        Ok(())
    }

    async fn execute_locator(
        &mut self,
        request: &LocatorRequest,
    ) -> Result<LocatorData, BackendError> {
        let client = self.client()?;
        run_locator(&client.page, request).await
    }
}
