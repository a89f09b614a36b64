//! Job orchestrator: login, navigation to the listing view, discovery and
//! triggering, sequenced over one exclusively owned backend.
//!
//! Operation failures are logged and turned into result values. Only fatal
//! backend errors (a lost page capability) escape, and [`Orchestrator::run`]
//! still closes the backend exactly once when they do.

use crate::backend::{Backend, BackendError};
use crate::config::{ConfigError, JobPilotConfig};
use crate::jobs::{DiscoveryReport, JobDiscovery, JobOutcomes, JobRecord, JobTrigger};
use crate::resolution::{ElementResolver, Resolution};
use crate::session::{SessionClassifier, SessionState};
use crate::strategy::SemanticTarget;
use async_trait::async_trait;
use jobpilot_common::protocol::{Scope, Selector};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Browser error: {0}")]
    Backend(#[from] BackendError),
    #[error("Interrupted by user")]
    Interrupted,
    #[error("Orchestrator is closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    BrowserStarted,
    LoggedIn(SessionState),
    Ready,
    Listing,
    Triggering,
    RunningAll,
    Closed,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorState::Idle => f.write_str("idle"),
            OrchestratorState::BrowserStarted => f.write_str("browser started"),
            OrchestratorState::LoggedIn(state) => write!(f, "logged in ({})", state),
            OrchestratorState::Ready => f.write_str("ready"),
            OrchestratorState::Listing => f.write_str("listing"),
            OrchestratorState::Triggering => f.write_str("triggering"),
            OrchestratorState::RunningAll => f.write_str("running all"),
            OrchestratorState::Closed => f.write_str("closed"),
        }
    }
}

/// What a run should do once logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    ListJobs,
    RunJobs(Vec<String>),
    RunAll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowReport {
    Jobs(Vec<JobRecord>),
    Outcomes(JobOutcomes),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Whether the automated login succeeded.
    pub login: bool,
    pub result: FlowReport,
}

/// Lets an operator finish a login the automation could not complete.
#[async_trait]
pub trait OperatorPrompt: Send {
    /// Block until the operator reports the browser session is logged in.
    async fn await_manual_login(&mut self) -> std::io::Result<()>;
}

pub struct Orchestrator<B: Backend> {
    backend: B,
    config: JobPilotConfig,
    resolver: ElementResolver,
    classifier: SessionClassifier,
    discovery: JobDiscovery,
    trigger: JobTrigger,
    prompt: Option<Box<dyn OperatorPrompt>>,
    state: OrchestratorState,
    closed: bool,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(backend: B, config: JobPilotConfig) -> Result<Self, ConfigError> {
        let table = Arc::new(config.strategy_table()?);
        let timing = &config.timing;
        let resolver = ElementResolver::new(table, timing.probe());
        let classifier =
            SessionClassifier::new(resolver.clone(), timing.probe(), timing.negative_probe());
        let discovery = JobDiscovery::new(resolver.clone(), timing.row_name_probe());
        let trigger = JobTrigger::new(
            resolver.clone(),
            timing.job_row(),
            timing.post_trigger_settle(),
        );

        Ok(Self {
            backend,
            config,
            resolver,
            classifier,
            discovery,
            trigger,
            prompt: None,
            state: OrchestratorState::Idle,
            closed: false,
        })
    }

    /// Consulted by [`Orchestrator::run`] when login fails in a visible browser.
    pub fn with_prompt(mut self, prompt: Box<dyn OperatorPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn config(&self) -> &JobPilotConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn set_state(&mut self, state: OrchestratorState) {
        if self.state != state {
            debug!("Orchestrator: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn ensure_open(&self) -> Result<(), OrchestratorError> {
        if self.closed {
            return Err(OrchestratorError::Closed);
        }
        Ok(())
    }

    // ============================================================
    // Lifecycle
    // ============================================================

    /// Run `flow` end to end: start, login, optional manual login, flow,
    /// teardown.
    pub async fn run(&mut self, flow: Flow) -> Result<RunReport, OrchestratorError> {
        self.run_until(flow, std::future::pending::<()>()).await
    }

    /// Like [`Orchestrator::run`], but abandons the flow at its current wait
    /// when `shutdown` completes. Teardown runs either way.
    pub async fn run_until<F>(
        &mut self,
        flow: Flow,
        shutdown: F,
    ) -> Result<RunReport, OrchestratorError>
    where
        F: Future,
    {
        let result = tokio::select! {
            result = self.drive(flow) => result,
            _ = shutdown => {
                info!("Interrupted by user");
                Err(OrchestratorError::Interrupted)
            }
        };

        if let Err(OrchestratorError::Backend(e)) = &result {
            error!("Unexpected error: {}", e);
            if self.state != OrchestratorState::Idle {
                self.capture_error_screenshot().await;
            }
        }

        self.close().await;
        result
    }

    async fn drive(&mut self, flow: Flow) -> Result<RunReport, OrchestratorError> {
        self.start().await?;

        let login = self.login().await?;
        if !login {
            error!("Login failed. Please check credentials or log in manually.");
            if !self.config.browser.headless
                && let Some(prompt) = self.prompt.as_mut()
            {
                prompt.await_manual_login().await?;
            }
        }

        let result = match flow {
            Flow::ListJobs => FlowReport::Jobs(self.list_jobs().await?),
            Flow::RunJobs(names) => FlowReport::Outcomes(self.run_jobs(&names).await?),
            Flow::RunAll => FlowReport::Outcomes(self.run_all().await?),
        };

        if !self.config.browser.headless {
            let linger = self.config.browser.linger();
            if !linger.is_zero() {
                info!("Browser will close in {} seconds...", linger.as_secs());
                tokio::time::sleep(linger).await;
            }
        }

        Ok(RunReport { login, result })
    }

    /// Idle → BrowserStarted.
    pub async fn start(&mut self) -> Result<(), OrchestratorError> {
        self.ensure_open()?;
        info!("Starting browser...");
        self.backend.launch().await?;
        self.set_state(OrchestratorState::BrowserStarted);
        info!("Browser started successfully");
        Ok(())
    }

    /// Release the backend. Only the first call reaches it.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("Closing browser...");
        match self.backend.close().await {
            Ok(()) => info!("Browser closed"),
            Err(e) => error!("Error closing browser: {}", e),
        }
        self.set_state(OrchestratorState::Closed);
    }

    // ============================================================
    // Session
    // ============================================================

    /// Classify the current page without navigating.
    pub async fn session_state(&mut self) -> Result<SessionState, OrchestratorError> {
        self.ensure_open()?;
        let state = self
            .classifier
            .classify(&mut self.backend, Scope::Page)
            .await;
        recover(state, SessionState::Unknown, "checking login status")
    }

    /// Navigate to the console and log in if needed. Safe to call when the
    /// session is already authenticated.
    pub async fn login(&mut self) -> Result<bool, OrchestratorError> {
        self.ensure_open()?;
        info!("Navigating to {}...", self.config.console.url);
        let attempt = self.try_login().await;
        let (logged_in, state) = recover(
            attempt,
            (false, SessionState::Unknown),
            "during login",
        )?;
        self.set_state(OrchestratorState::LoggedIn(state));
        Ok(logged_in)
    }

    async fn try_login(&mut self) -> Result<(bool, SessionState), BackendError> {
        let policy = self.config.session.on_unknown;
        let url = self.config.console.url.clone();
        self.backend.navigate(&url).await?;
        self.settle_page(self.config.timing.quiescence()).await?;

        let state = self
            .classifier
            .classify(&mut self.backend, Scope::Page)
            .await?;
        if policy.is_authenticated(state) {
            info!("Already logged in ({})", state);
            return Ok((true, state));
        }

        let Some((username, password)) = self
            .config
            .credentials
            .pair()
            .map(|(u, p)| (u.to_string(), p.to_string()))
        else {
            warn!(
                "No credentials provided. Please log in manually or set JOBPILOT_USERNAME and JOBPILOT_PASSWORD"
            );
            return Ok((false, state));
        };

        info!("Attempting to log in...");
        let Some(selector) = self
            .fill_target(SemanticTarget::UsernameField, &username)
            .await?
        else {
            warn!("Could not find username field. You may need to log in manually.");
            return Ok((false, state));
        };
        info!("Filled username using selector: {}", selector);

        if self
            .fill_target(SemanticTarget::PasswordField, &password)
            .await?
            .is_none()
        {
            warn!("Could not find password field.");
            return Ok((false, state));
        }
        info!("Filled password");

        match self
            .resolver
            .resolve(&mut self.backend, &SemanticTarget::LoginButton, Scope::Page)
            .await?
        {
            Resolution::Found {
                element, selector, ..
            } => {
                self.backend.click(element).await?;
                info!("Clicked login button using selector: {}", selector);
            }
            Resolution::NotFound { .. } => {
                warn!("Could not find login button. Trying to press Enter...");
                self.backend.press_key("Enter").await?;
            }
        }

        self.settle_page(self.config.timing.post_login()).await?;
        let state = self
            .classifier
            .classify(&mut self.backend, Scope::Page)
            .await?;
        if policy.is_authenticated(state) {
            info!("Login successful");
            Ok((true, state))
        } else {
            warn!("Login may have failed. Check credentials.");
            Ok((false, state))
        }
    }

    async fn fill_target(
        &mut self,
        target: SemanticTarget,
        value: &str,
    ) -> Result<Option<Selector>, BackendError> {
        match self
            .resolver
            .resolve(&mut self.backend, &target, Scope::Page)
            .await?
        {
            Resolution::Found {
                element, selector, ..
            } => {
                self.backend.fill(element, value).await?;
                Ok(Some(selector))
            }
            Resolution::NotFound { .. } => Ok(None),
        }
    }

    // ============================================================
    // Navigation
    // ============================================================

    /// LoggedIn → Ready: reach the job listing view.
    pub async fn navigate_to_listing(&mut self) -> Result<(), OrchestratorError> {
        self.ensure_open()?;
        info!("Navigating to jobs page...");
        let attempt = self.try_navigate_to_listing().await;
        recover(attempt, (), "navigating to jobs")?;
        self.set_state(OrchestratorState::Ready);
        Ok(())
    }

    async fn try_navigate_to_listing(&mut self) -> Result<(), BackendError> {
        let quiescence = self.config.timing.quiescence();

        if let Resolution::Found {
            element, selector, ..
        } = self
            .resolver
            .resolve(&mut self.backend, &SemanticTarget::NavigationLink, Scope::Page)
            .await?
        {
            match self.backend.click(element).await {
                Ok(()) => {
                    self.settle_page(quiescence).await?;
                    info!("Clicked on jobs link: {}", selector);
                    return Ok(());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Jobs link {} not clickable: {}", selector, e),
            }
        }

        let current = self.backend.current_url().await?;
        if self.config.console.is_listing_url(&current) {
            info!("Already on jobs page");
            return Ok(());
        }

        warn!("Could not find jobs link. Attempting direct navigation...");
        let listing = self.config.console.listing_url();
        self.backend.navigate(&listing).await?;
        self.settle_page(quiescence).await
    }

    /// Navigate to the listing and give it time to render.
    async fn open_listing(&mut self) -> Result<(), OrchestratorError> {
        self.navigate_to_listing().await?;
        pause(self.config.timing.listing_settle()).await;
        Ok(())
    }

    /// Wait for quiescence; a timeout is logged, not returned.
    async fn settle_page(&mut self, timeout: Duration) -> Result<(), BackendError> {
        match self.backend.wait_for_quiescence(timeout).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Page did not settle: {}", e);
                Ok(())
            }
        }
    }

    // ============================================================
    // Jobs
    // ============================================================

    /// Ready → Listing.
    pub async fn list_jobs(&mut self) -> Result<Vec<JobRecord>, OrchestratorError> {
        self.ensure_open()?;
        info!("Listing available jobs...");
        self.open_listing().await?;
        self.set_state(OrchestratorState::Listing);
        let report = self.discover().await?;
        self.set_state(OrchestratorState::Ready);
        Ok(report.records)
    }

    /// Discovery on the current page, with the debug screenshot written when
    /// no row-group strategy produced a job.
    pub async fn discover(&mut self) -> Result<DiscoveryReport, OrchestratorError> {
        self.ensure_open()?;
        let max_jobs = self.config.discovery.max_jobs;
        let report = self
            .discovery
            .discover(&mut self.backend, Scope::Page, max_jobs)
            .await;
        let report = recover(report, DiscoveryReport::default(), "discovering jobs")?;

        if report.is_structural_miss() {
            warn!("Could not find jobs using standard selectors. Page structure may be different.");
            let url = self.backend.current_url().await;
            let url = recover(url, "<unknown>".to_string(), "reading page URL")?;
            info!("Page URL: {}", url);
            info!("Saving page screenshot for debugging...");
            let path = self.config.artifacts.debug_screenshot_path();
            self.save_screenshot(&path).await?;
        }
        Ok(report)
    }

    /// Ready → Triggering for one job. The listing is re-opened and the job
    /// re-resolved by name.
    pub async fn run_job(&mut self, job_name: &str) -> Result<bool, OrchestratorError> {
        self.ensure_open()?;
        info!("Attempting to run job: {}", job_name);
        self.open_listing().await?;
        self.set_state(OrchestratorState::Triggering);
        let outcome = self
            .trigger
            .trigger(&mut self.backend, Scope::Page, job_name)
            .await
            .map(|o| o.succeeded());
        let triggered = recover(outcome, false, &format!("running job {}", job_name))?;
        self.set_state(OrchestratorState::Ready);
        Ok(triggered)
    }

    /// Trigger each name in order, one at a time.
    pub async fn run_jobs<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Result<JobOutcomes, OrchestratorError> {
        let mut outcomes = JobOutcomes::new();
        for (index, name) in names.iter().enumerate() {
            if index > 0 {
                pause(self.config.timing.inter_job_delay()).await;
            }
            let name = name.as_ref();
            let triggered = self.run_job(name).await?;
            outcomes.record(name, triggered);
        }
        Ok(outcomes)
    }

    /// Ready → RunningAll: every discovered job, in discovery order.
    pub async fn run_all(&mut self) -> Result<JobOutcomes, OrchestratorError> {
        self.ensure_open()?;
        info!("Running all jobs...");
        self.set_state(OrchestratorState::RunningAll);
        let names: Vec<String> = self
            .list_jobs()
            .await?
            .into_iter()
            .map(|record| record.name)
            .collect();
        self.set_state(OrchestratorState::RunningAll);
        let outcomes = self.run_jobs(&names).await?;
        self.set_state(OrchestratorState::Ready);
        Ok(outcomes)
    }

    // ============================================================
    // Artifacts
    // ============================================================

    /// Write a screenshot to `path`. Only a fatal backend error is returned.
    pub async fn save_screenshot(&mut self, path: &Path) -> Result<(), OrchestratorError> {
        let bytes = match self.backend.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Could not capture screenshot: {}", e);
                return Ok(());
            }
        };
        if let Err(e) = write_artifact(path, &bytes).await {
            warn!("Could not write {}: {}", path.display(), e);
        } else {
            info!("Screenshot saved to {}", path.display());
        }
        Ok(())
    }

    async fn capture_error_screenshot(&mut self) {
        let path = self.config.artifacts.error_screenshot_path();
        if let Err(e) = self.save_screenshot(&path).await {
            debug!("No error screenshot: {}", e);
        }
    }
}

async fn write_artifact(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Operation boundary: fatal errors escape, everything else is logged and
/// replaced by `fallback`.
fn recover<T>(
    result: Result<T, BackendError>,
    fallback: T,
    context: &str,
) -> Result<T, OrchestratorError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(OrchestratorError::Backend(e)),
        Err(e) => {
            error!("Error {}: {}", context, e);
            Ok(fallback)
        }
    }
}
