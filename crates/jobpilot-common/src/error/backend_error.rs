/// Errors raised by a page capability (browser backend).
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Element Errors
    // ============================================================
    #[error("Element {id} is stale (removed from DOM or page navigated)")]
    ElementStale { id: u32 },

    #[error("Invalid selector: {selector}")]
    SelectorInvalid { selector: String },

    // ============================================================
    // Execution Errors
    // ============================================================
    #[error("Script execution error: {0}")]
    ScriptError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Locator execution failed: {0}")]
    Scanner(String),

    // ============================================================
    // System Errors
    // ============================================================
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Not ready")]
    NotReady,

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other: {0}")]
    Other(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Navigation(_) => "NAVIGATION_ERROR",
            BackendError::ElementStale { .. } => "ELEMENT_STALE",
            BackendError::SelectorInvalid { .. } => "SELECTOR_INVALID",
            BackendError::ScriptError(_) => "SCRIPT_ERROR",
            BackendError::Timeout(_) => "TIMEOUT",
            BackendError::Scanner(_) => "SCANNER_ERROR",
            BackendError::ConnectionLost(_) => "CONNECTION_LOST",
            BackendError::NotReady => "NOT_READY",
            BackendError::Io(_) => "IO_ERROR",
            BackendError::Serialization(_) => "SERIALIZATION_ERROR",
            BackendError::Other(_) => "INTERNAL_ERROR",
            BackendError::NotSupported(_) => "NOT_SUPPORTED",
        }
    }

    /// True when the page capability itself is gone. Every other error is
    /// local to one probe or one operation and can be skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackendError::ConnectionLost(_) | BackendError::NotReady
        )
    }

    /// Map an error code reported by the page-side locator back to an error.
    pub fn from_locator_code(code: &str, message: String) -> Self {
        match code {
            "ELEMENT_STALE" => {
                let id = message
                    .rsplit(' ')
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default();
                BackendError::ElementStale { id }
            }
            "SELECTOR_INVALID" => BackendError::SelectorInvalid { selector: message },
            "NOT_SUPPORTED" => BackendError::NotSupported(message),
            _ => BackendError::ScriptError(message),
        }
    }
}
