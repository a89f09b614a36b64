use crate::backend::{Backend, BackendError};
use crate::resolution::{ElementResolver, Resolution};
use crate::strategy::SemanticTarget;
use jobpilot_common::protocol::{ElementHandle, Scope};
use std::time::Duration;
use tracing::{error, info, warn};

/// Which pass, if any, started the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Row found, action control clicked inside it.
    RowScoped,
    /// Action control found by the page-global, name-embedding selectors.
    GlobalFallback,
    NotTriggered,
}

impl TriggerOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, TriggerOutcome::NotTriggered)
    }
}

/// Starts a job by clicking its play/run control.
///
/// Two independent passes: row-scoped first, then page-global. Each pass
/// re-resolves by name; row positions from discovery are never reused.
#[derive(Debug, Clone)]
pub struct JobTrigger {
    resolver: ElementResolver,
    row_timeout: Duration,
    settle: Duration,
}

impl JobTrigger {
    pub fn new(resolver: ElementResolver, row_timeout: Duration, settle: Duration) -> Self {
        Self {
            resolver,
            row_timeout,
            settle,
        }
    }

    pub async fn trigger<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        scope: Scope,
        job_name: &str,
    ) -> Result<TriggerOutcome, BackendError> {
        if self.row_scoped_pass(backend, scope, job_name).await? {
            return Ok(TriggerOutcome::RowScoped);
        }
        if self.global_pass(backend, scope, job_name).await? {
            return Ok(TriggerOutcome::GlobalFallback);
        }
        error!("Could not trigger job: {}", job_name);
        Ok(TriggerOutcome::NotTriggered)
    }

    /// Resolve the job's row, then the action control inside that row.
    pub async fn row_scoped_pass<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        scope: Scope,
        job_name: &str,
    ) -> Result<bool, BackendError> {
        let row = self
            .resolver
            .resolve_with_timeout(
                backend,
                &SemanticTarget::JobRow(job_name.to_string()),
                scope,
                self.row_timeout,
            )
            .await?;
        let Resolution::Found { element: row, .. } = row else {
            warn!("Could not find job row: {}", job_name);
            return Ok(false);
        };
        info!("Found job row for: {}", job_name);

        let control = self
            .resolver
            .resolve(backend, &SemanticTarget::JobActionControl, Scope::Element(row))
            .await?;
        let Resolution::Found { element, .. } = control else {
            warn!("Could not find play button in row for job: {}", job_name);
            return Ok(false);
        };
        info!("Found play button for job: {}", job_name);

        self.invoke(backend, element, job_name).await
    }

    /// Page-global selectors that embed the job name, for markup where the
    /// control is not a descendant of the row.
    pub async fn global_pass<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        scope: Scope,
        job_name: &str,
    ) -> Result<bool, BackendError> {
        let control = self
            .resolver
            .resolve(
                backend,
                &SemanticTarget::JobActionGlobal(job_name.to_string()),
                scope,
            )
            .await?;
        match control {
            Resolution::Found {
                element, selector, ..
            } => {
                info!("Found play button for {} using selector: {}", job_name, selector);
                self.invoke(backend, element, job_name).await
            }
            Resolution::NotFound { .. } => Ok(false),
        }
    }

    async fn invoke<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        control: ElementHandle,
        job_name: &str,
    ) -> Result<bool, BackendError> {
        match backend.click(control).await {
            Ok(()) => {
                if !self.settle.is_zero() {
                    tokio::time::sleep(self.settle).await;
                }
                info!("Successfully triggered job: {}", job_name);
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Clicking play button for {} failed: {}", job_name, e);
                Ok(false)
            }
        }
    }
}
