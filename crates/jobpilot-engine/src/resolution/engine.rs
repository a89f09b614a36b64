//! Element resolver: walks a target's candidate list in order and returns the
//! first strategy whose bounded visibility probe succeeds.
//!
//! Worst-case latency is `strategies × per-probe timeout`. Probe errors are
//! treated like timeouts; only a lost page capability escapes.

use super::result::Resolution;
use crate::backend::{Backend, BackendError};
use crate::strategy::{CandidateList, CandidateStrategy, SemanticTarget, StrategyTable};
use jobpilot_common::protocol::{ElementHandle, Scope};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ElementResolver {
    table: Arc<StrategyTable>,
    probe_timeout: Duration,
}

impl ElementResolver {
    pub fn new(table: Arc<StrategyTable>, probe_timeout: Duration) -> Self {
        Self {
            table,
            probe_timeout,
        }
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Resolve `target` within `scope` using the default per-probe timeout.
    pub async fn resolve<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        target: &SemanticTarget,
        scope: Scope,
    ) -> Result<Resolution, BackendError> {
        self.resolve_with_timeout(backend, target, scope, self.probe_timeout)
            .await
    }

    /// Resolve `target` within `scope`; strategies without their own timeout
    /// use `per_probe_timeout`.
    pub async fn resolve_with_timeout<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        target: &SemanticTarget,
        scope: Scope,
        per_probe_timeout: Duration,
    ) -> Result<Resolution, BackendError> {
        let candidates = self.table.candidates(target);
        let resolution = self
            .resolve_candidates(backend, &candidates, scope, per_probe_timeout)
            .await?;
        match &resolution {
            Resolution::Found {
                strategy, selector, ..
            } => debug!("{} resolved by strategy {} ({})", target, strategy, selector),
            Resolution::NotFound { attempted } => {
                debug!("{} not found after {} strategies", target, attempted)
            }
        }
        Ok(resolution)
    }

    /// Probe an explicit candidate list in order.
    pub async fn resolve_candidates<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        candidates: &CandidateList,
        scope: Scope,
        per_probe_timeout: Duration,
    ) -> Result<Resolution, BackendError> {
        for (index, strategy) in candidates.iter().enumerate() {
            let timeout = strategy.timeout_or(per_probe_timeout);
            match backend
                .probe_visible(&strategy.selector, scope, timeout)
                .await
            {
                Ok(Some(element)) => {
                    return Ok(Resolution::Found {
                        element,
                        strategy: index,
                        selector: strategy.selector.clone(),
                    });
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Probe '{}' failed, trying next: {}", strategy.selector, e),
            }
        }
        Ok(Resolution::NotFound {
            attempted: candidates.len(),
        })
    }

    /// Batch variant for one strategy: every match in `scope`, at most `max`.
    /// Non-fatal errors yield an empty list.
    pub async fn query_all<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        strategy: &CandidateStrategy,
        scope: Scope,
        max: usize,
    ) -> Result<Vec<ElementHandle>, BackendError> {
        match backend.query_all(&strategy.selector, scope, max).await {
            Ok(mut elements) => {
                elements.truncate(max);
                Ok(elements)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("Query '{}' failed: {}", strategy.selector, e);
                Ok(Vec::new())
            }
        }
    }
}
