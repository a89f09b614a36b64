use jobpilot_common::protocol::{ElementHandle, Selector};

/// Result of resolving a semantic target.
///
/// A miss is a value, not an error: callers branch on it to fall back or
/// report failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// First visible match, and which strategy produced it.
    Found {
        element: ElementHandle,
        strategy: usize,
        selector: Selector,
    },

    /// Every strategy was tried without a visible match.
    NotFound { attempted: usize },
}

impl Resolution {
    pub fn element(&self) -> Option<ElementHandle> {
        match self {
            Resolution::Found { element, .. } => Some(*element),
            Resolution::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found { .. })
    }
}
