#![allow(dead_code)]

use async_trait::async_trait;
use jobpilot_engine::backend::{Backend, BackendError, NavigationResult};
use jobpilot_engine::config::{JobPilotConfig, TimingConfig};
use jobpilot_engine::protocol::{ElementHandle, Scope, Selector};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const CONSOLE_URL: &str = "https://console.test";

/// What is rendered at one point in time: visible elements keyed by the
/// exact selector and scope that should find them.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    visible: Vec<(Scope, Selector, ElementHandle)>,
    lists: Vec<(Scope, Selector, Vec<ElementHandle>)>,
    texts: HashMap<ElementHandle, String>,
    errors: Vec<(Selector, BackendError)>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(mut self, selector: Selector, id: u32) -> Self {
        self.visible.push((Scope::Page, selector, ElementHandle(id)));
        self
    }

    pub fn show_in(mut self, scope: u32, selector: Selector, id: u32) -> Self {
        self.visible
            .push((Scope::Element(ElementHandle(scope)), selector, ElementHandle(id)));
        self
    }

    pub fn rows(mut self, selector: Selector, ids: &[u32]) -> Self {
        let ids = ids.iter().copied().map(ElementHandle).collect();
        self.lists.push((Scope::Page, selector, ids));
        self
    }

    pub fn text(mut self, id: u32, text: &str) -> Self {
        self.texts.insert(ElementHandle(id), text.to_string());
        self
    }

    pub fn failing(mut self, selector: Selector, error: BackendError) -> Self {
        self.errors.push((selector, error));
        self
    }
}

/// Scripted page capability. Clicking an element, pressing Enter or
/// navigating to a URL can switch to another page.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pages: Vec<FakePage>,
    current: usize,
    url: String,
    on_click: HashMap<ElementHandle, usize>,
    on_enter: Option<usize>,
    on_navigate: HashMap<String, usize>,
    click_errors: HashMap<ElementHandle, BackendError>,
    launch_error: Option<BackendError>,
    fatal: Option<BackendError>,
    hang_on_navigate: bool,

    pub launches: usize,
    pub closes: usize,
    pub screenshots: usize,
    pub probes: Vec<(Selector, Scope, Duration)>,
    pub clicks: Vec<ElementHandle>,
    pub fills: Vec<(ElementHandle, String)>,
    pub keys: Vec<String>,
    pub navigations: Vec<String>,
}

impl FakeBackend {
    pub fn new(page: FakePage) -> Self {
        Self {
            pages: vec![page],
            url: "about:blank".to_string(),
            ..Default::default()
        }
    }

    /// Add a page and return its index.
    pub fn add_page(&mut self, page: FakePage) -> usize {
        self.pages.push(page);
        self.pages.len() - 1
    }

    pub fn on_click(mut self, id: u32, page: usize) -> Self {
        self.on_click.insert(ElementHandle(id), page);
        self
    }

    pub fn on_enter(mut self, page: usize) -> Self {
        self.on_enter = Some(page);
        self
    }

    pub fn on_navigate(mut self, url: &str, page: usize) -> Self {
        self.on_navigate.insert(url.to_string(), page);
        self
    }

    pub fn click_error(mut self, id: u32, error: BackendError) -> Self {
        self.click_errors.insert(ElementHandle(id), error);
        self
    }

    pub fn launch_error(mut self, error: BackendError) -> Self {
        self.launch_error = Some(error);
        self
    }

    /// Every page operation after launch fails with `error`.
    pub fn fatal(mut self, error: BackendError) -> Self {
        self.fatal = Some(error);
        self
    }

    pub fn hang_on_navigate(mut self) -> Self {
        self.hang_on_navigate = true;
        self
    }

    pub fn at_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    fn page(&self) -> &FakePage {
        &self.pages[self.current]
    }

    fn check_fatal(&self) -> Result<(), BackendError> {
        match &self.fatal {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.launches += 1;
        match &self.launch_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closes += 1;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launches > 0 && self.closes == 0
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.check_fatal()?;
        self.navigations.push(url.to_string());
        if self.hang_on_navigate {
            std::future::pending::<()>().await;
        }
        self.url = url.to_string();
        if let Some(page) = self.on_navigate.get(url) {
            self.current = *page;
        }
        Ok(NavigationResult {
            url: url.to_string(),
            title: "Console".to_string(),
        })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        self.check_fatal()?;
        Ok(self.url.clone())
    }

    async fn wait_for_quiescence(&mut self, _timeout: Duration) -> Result<(), BackendError> {
        self.check_fatal()
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        self.screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn press_key(&mut self, key: &str) -> Result<(), BackendError> {
        self.check_fatal()?;
        self.keys.push(key.to_string());
        if key == "Enter"
            && let Some(page) = self.on_enter
        {
            self.current = page;
        }
        Ok(())
    }

    async fn probe_visible(
        &mut self,
        selector: &Selector,
        scope: Scope,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, BackendError> {
        self.check_fatal()?;
        self.probes.push((selector.clone(), scope, timeout));
        if let Some((_, e)) = self.page().errors.iter().find(|(s, _)| s == selector) {
            return Err(e.clone());
        }
        Ok(self
            .page()
            .visible
            .iter()
            .find(|(sc, s, _)| *sc == scope && s == selector)
            .map(|(_, _, id)| *id))
    }

    async fn query_all(
        &mut self,
        selector: &Selector,
        scope: Scope,
        max: usize,
    ) -> Result<Vec<ElementHandle>, BackendError> {
        self.check_fatal()?;
        if let Some((_, e)) = self.page().errors.iter().find(|(s, _)| s == selector) {
            return Err(e.clone());
        }
        // Deliberately ignores `max`; callers must cap the result.
        let _ = max;
        Ok(self
            .page()
            .lists
            .iter()
            .find(|(sc, s, _)| *sc == scope && s == selector)
            .map(|(_, _, ids)| ids.clone())
            .unwrap_or_default())
    }

    async fn fill(&mut self, element: ElementHandle, text: &str) -> Result<(), BackendError> {
        self.check_fatal()?;
        self.fills.push((element, text.to_string()));
        Ok(())
    }

    async fn click(&mut self, element: ElementHandle) -> Result<(), BackendError> {
        self.check_fatal()?;
        if let Some(e) = self.click_errors.get(&element) {
            return Err(e.clone());
        }
        self.clicks.push(element);
        if let Some(page) = self.on_click.get(&element) {
            self.current = *page;
        }
        Ok(())
    }

    async fn inner_text(&mut self, element: ElementHandle) -> Result<String, BackendError> {
        self.check_fatal()?;
        self.page()
            .texts
            .get(&element)
            .cloned()
            .ok_or(BackendError::ElementStale { id: element.0 })
    }
}

/// Config with no waits, a headless browser and artifacts under `dir`.
pub fn test_config(dir: &Path) -> JobPilotConfig {
    let mut config = JobPilotConfig::default();
    config.console.url = CONSOLE_URL.to_string();
    config.timing = TimingConfig::none();
    config.browser.headless = true;
    config.browser.linger_ms = 0;
    config.artifacts.dir = dir.to_path_buf();
    config
}

pub fn with_credentials(mut config: JobPilotConfig) -> JobPilotConfig {
    config.credentials.username = Some("robot@example.com".to_string());
    config.credentials.password = Some("hunter2".to_string());
    config
}

// Element ids used by the console scenario.
pub const USERNAME: u32 = 1;
pub const PASSWORD: u32 = 2;
pub const SUBMIT: u32 = 3;
pub const SIGN_IN_TEXT: u32 = 4;
pub const JOBS_TEXT: u32 = 10;
pub const JOBS_LINK: u32 = 11;
pub const PLAY_INVOICE: u32 = 40;

pub fn login_page() -> FakePage {
    FakePage::new()
        .show(Selector::css(r#"input[name="email"]"#), USERNAME)
        .show(Selector::css(r#"input[name="password"]"#), PASSWORD)
        .show(Selector::css(r#"button[type="submit"]"#), SUBMIT)
        .show(Selector::text("Sign in"), SIGN_IN_TEXT)
}

pub fn home_page() -> FakePage {
    FakePage::new()
        .show(Selector::text("Jobs"), JOBS_TEXT)
        .show(Selector::css_with_text("a", "Jobs"), JOBS_LINK)
}

/// Three rows under `tbody tr`; only "Invoice Sync" has a play button.
pub fn listing_page() -> FakePage {
    FakePage::new()
        .show(Selector::text("Jobs"), JOBS_TEXT)
        .show(Selector::css_with_text("a", "Jobs"), JOBS_LINK)
        .rows(Selector::css("tbody tr"), &[20, 21, 22])
        .show_in(20, Selector::css("td:first-child"), 30)
        .show_in(21, Selector::css("td:first-child"), 31)
        .show_in(22, Selector::css("td:first-child"), 32)
        .text(30, "  Invoice Sync ")
        .text(31, "Report Gen")
        .text(32, "Cleanup")
        .show(Selector::css_with_text("tr", "Invoice Sync"), 20)
        .show(Selector::css_with_text("tr", "Report Gen"), 21)
        .show(Selector::css_with_text("tr", "Cleanup"), 22)
        .show_in(20, Selector::css(r#"button[aria-label*="play" i]"#), PLAY_INVOICE)
}

/// Login page → (submit) home page → (jobs link) listing page.
pub fn console_backend() -> FakeBackend {
    let mut backend = FakeBackend::new(login_page());
    let home = backend.add_page(home_page());
    let listing = backend.add_page(listing_page());
    backend.on_click(SUBMIT, home).on_click(JOBS_LINK, listing)
}
