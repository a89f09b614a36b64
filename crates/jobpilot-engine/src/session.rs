use crate::backend::{Backend, BackendError};
use crate::resolution::{ElementResolver, Resolution};
use jobpilot_common::protocol::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Coarse authentication state of the browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    Unauthenticated,
    /// Neither indicator set matched.
    Unknown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Authenticated => f.write_str("authenticated"),
            SessionState::Unauthenticated => f.write_str("unauthenticated"),
            SessionState::Unknown => f.write_str("unknown"),
        }
    }
}

/// How a caller treats [`SessionState::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSessionPolicy {
    #[default]
    AssumeAuthenticated,
    AssumeUnauthenticated,
}

impl UnknownSessionPolicy {
    pub fn is_authenticated(&self, state: SessionState) -> bool {
        match state {
            SessionState::Authenticated => true,
            SessionState::Unauthenticated => false,
            SessionState::Unknown => *self == UnknownSessionPolicy::AssumeAuthenticated,
        }
    }
}

/// Stateless classifier over the positive/negative indicator sets.
#[derive(Debug, Clone)]
pub struct SessionClassifier {
    resolver: ElementResolver,
    positive_timeout: Duration,
    negative_timeout: Duration,
}

impl SessionClassifier {
    pub fn new(
        resolver: ElementResolver,
        positive_timeout: Duration,
        negative_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            positive_timeout,
            negative_timeout,
        }
    }

    /// Positive indicators are checked first and win over negative ones.
    pub async fn classify<B: Backend + ?Sized>(
        &self,
        backend: &mut B,
        scope: Scope,
    ) -> Result<SessionState, BackendError> {
        let indicators = self.resolver.table().indicators();

        let positive = self
            .resolver
            .resolve_candidates(backend, &indicators.positive, scope, self.positive_timeout)
            .await?;
        if let Resolution::Found { selector, .. } = positive {
            tracing::debug!("Authenticated indicator visible: {}", selector);
            return Ok(SessionState::Authenticated);
        }

        let negative = self
            .resolver
            .resolve_candidates(backend, &indicators.negative, scope, self.negative_timeout)
            .await?;
        if let Resolution::Found { selector, .. } = negative {
            tracing::debug!("Login indicator visible: {}", selector);
            return Ok(SessionState::Unauthenticated);
        }

        Ok(SessionState::Unknown)
    }
}
