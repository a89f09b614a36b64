use super::outcome::JobRecord;
use crate::backend::{Backend, BackendError};
use crate::resolution::{ElementResolver, Resolution};
use crate::strategy::{SemanticTarget, TargetKey};
use jobpilot_common::protocol::Scope;
use std::time::Duration;
use tracing::{debug, info};

/// What a discovery pass found, plus enough detail to tell "no jobs" apart
/// from "selectors did not match".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    pub records: Vec<JobRecord>,
    /// Index of the row-group strategy that produced the records.
    pub strategy: Option<usize>,
    /// Rows matched across all row-group strategies tried.
    pub rows_matched: usize,
}

impl DiscoveryReport {
    /// No row-group strategy produced a named row.
    pub fn is_structural_miss(&self) -> bool {
        self.strategy.is_none()
    }

    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct JobDiscovery {
    resolver: ElementResolver,
    name_timeout: Duration,
}

impl JobDiscovery {
    /// `name_timeout` bounds each name-cell probe inside a row. Rows are
    /// already rendered when they are enumerated, so zero (a single check) is
    /// usually enough.
    pub fn new(resolver: ElementResolver, name_timeout: Duration) -> Self {
        Self {
            resolver,
            name_timeout,
        }
    }

    /// Enumerate job rows in `scope`, at most `max_count`.
    ///
    /// Row-group strategies are tried in order; the first one whose rows yield
    /// at least one name wins and later strategies are not merged in. Rows
    /// whose name cannot be extracted are skipped.
    pub async fn discover<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        scope: Scope,
        max_count: usize,
    ) -> Result<DiscoveryReport, BackendError> {
        let mut report = DiscoveryReport::default();
        if max_count == 0 {
            return Ok(report);
        }

        let groups = self.resolver.table().get(TargetKey::JobRowGroup).clone();
        for (index, strategy) in groups.iter().enumerate() {
            let rows = self
                .resolver
                .query_all(backend, strategy, scope, max_count)
                .await?;
            if rows.is_empty() {
                continue;
            }
            info!(
                "Found {} items using selector: {}",
                rows.len(),
                strategy.selector
            );
            report.rows_matched += rows.len();

            let mut records = Vec::new();
            for (position, row) in rows.into_iter().enumerate() {
                if let Some(name) = self.row_name(backend, Scope::Element(row)).await? {
                    records.push(JobRecord {
                        name,
                        index: position,
                    });
                }
            }

            if !records.is_empty() {
                records.truncate(max_count);
                report.records = records;
                report.strategy = Some(index);
                return Ok(report);
            }
            debug!(
                "No row names extracted with selector {}, trying next",
                strategy.selector
            );
        }

        Ok(report)
    }

    async fn row_name<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        row: Scope,
    ) -> Result<Option<String>, BackendError> {
        let resolution = self
            .resolver
            .resolve_with_timeout(
                backend,
                &SemanticTarget::RowNameField,
                row,
                self.name_timeout,
            )
            .await?;
        let Resolution::Found { element, .. } = resolution else {
            return Ok(None);
        };
        match backend.inner_text(element).await {
            Ok(text) => {
                let name = text.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("Could not read row name: {}", e);
                Ok(None)
            }
        }
    }
}
