use async_trait::async_trait;
pub use jobpilot_common::error::BackendError;
use jobpilot_common::protocol::{ElementHandle, LocatorData, LocatorRequest, Scope, Selector};
use std::time::Duration;
use tokio::time::Instant;

/// Interval between visibility probes while waiting for an element.
pub const PROBE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub title: String,
}

/// The page capability every browser backend implements.
///
/// Element-level operations have default implementations on top of
/// [`Backend::execute_locator`], so a backend only needs to ship the locator
/// script to the page. Test doubles override them directly.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Launch the backend (start browser, connect to a driver, etc.)
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the backend and cleanup resources. Must be idempotent.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// Navigate to a specific URL.
    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError>;

    /// URL of the page currently loaded.
    async fn current_url(&mut self) -> Result<String, BackendError>;

    /// Wait until the page has settled, at most `timeout`.
    async fn wait_for_quiescence(&mut self, timeout: Duration) -> Result<(), BackendError>;

    /// Capture a screenshot of the current viewport (PNG bytes).
    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError>;

    /// Press a key on the focused element.
    async fn press_key(&mut self, key: &str) -> Result<(), BackendError>;

    /// Evaluate one request with the page-side locator.
    async fn execute_locator(
        &mut self,
        _request: &LocatorRequest,
    ) -> Result<LocatorData, BackendError> {
        Err(BackendError::NotSupported("execute_locator".into()))
    }

    /// Poll until an element matching `selector` inside `scope` is visible.
    /// Returns `None` once `timeout` elapses without a visible match.
    async fn probe_visible(
        &mut self,
        selector: &Selector,
        scope: Scope,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, BackendError> {
        let request = LocatorRequest::Probe {
            selector: selector.clone(),
            scope: scope.element(),
        };
        let deadline = Instant::now() + timeout;
        loop {
            match self.execute_locator(&request).await? {
                LocatorData::Element { id: Some(id) } => return Ok(Some(id)),
                LocatorData::Element { id: None } => {}
                other => return Err(unexpected_reply("probe", &other)),
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(PROBE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// All elements matching `selector` inside `scope`, in document order, at most `max`.
    async fn query_all(
        &mut self,
        selector: &Selector,
        scope: Scope,
        max: usize,
    ) -> Result<Vec<ElementHandle>, BackendError> {
        let request = LocatorRequest::QueryAll {
            selector: selector.clone(),
            scope: scope.element(),
            max,
        };
        match self.execute_locator(&request).await? {
            LocatorData::Elements { mut ids } => {
                ids.truncate(max);
                Ok(ids)
            }
            other => Err(unexpected_reply("query_all", &other)),
        }
    }

    async fn fill(&mut self, element: ElementHandle, text: &str) -> Result<(), BackendError> {
        let request = LocatorRequest::Fill {
            element,
            text: text.to_string(),
        };
        self.execute_locator(&request).await.map(|_| ())
    }

    async fn click(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        self.execute_locator(&LocatorRequest::Click { element })
            .await
            .map(|_| ())
    }

    async fn inner_text(&mut self, element: ElementHandle) -> Result<String, BackendError> {
        match self
            .execute_locator(&LocatorRequest::Text { element })
            .await?
        {
            LocatorData::Text { text } => Ok(text),
            other => Err(unexpected_reply("text", &other)),
        }
    }
}

fn unexpected_reply(op: &str, data: &LocatorData) -> BackendError {
    BackendError::Scanner(format!("unexpected reply to {}: {:?}", op, data))
}
