use crate::cdp::map_cdp_error;
use chromiumoxide::Page;
use jobpilot_engine::backend::BackendError;
use jobpilot_engine::protocol::{LocatorData, LocatorRequest, LocatorResponse};
use jobpilot_scanner::LOCATOR_JS;
use std::time::Duration;

/// Upper bound on one locator evaluation. A blocking dialog would otherwise
/// hang the JS thread.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

enum EvalError {
    Timeout,
    Context(String),
    Backend(BackendError),
}

/// Install the locator unless the current document already has it.
async fn ensure_injected(page: &Page) -> Result<(), EvalError> {
    let loaded: bool = evaluate(page, "typeof window.JobPilot !== 'undefined'")
        .await?
        .as_bool()
        .unwrap_or(false);
    if !loaded {
        evaluate(page, LOCATOR_JS).await?;
    }
    Ok(())
}

async fn evaluate(page: &Page, expression: &str) -> Result<serde_json::Value, EvalError> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => {
            let err_str = e.to_string();
            if is_context_error(&err_str) {
                Err(EvalError::Context(err_str))
            } else {
                Err(EvalError::Backend(map_cdp_error(e)))
            }
        }
        // `undefined` results (the injection IIFE) carry no value.
        Ok(Ok(remote)) => Ok(remote.value().cloned().unwrap_or(serde_json::Value::Null)),
    }
}

/// Run one locator request in the page, injecting the script first and
/// retrying while the page is between documents.
pub async fn run_locator(
    page: &Page,
    request: &LocatorRequest,
) -> Result<LocatorData, BackendError> {
    let expression = format!("window.JobPilot.process({})", serde_json::to_string(request)?);
    tracing::trace!("Locator op: {}", request.op());

    let mut last_error = None;
    for attempt in 0..MAX_CONTEXT_RETRIES {
        let outcome = match ensure_injected(page).await {
            Ok(()) => evaluate(page, &expression).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(value) => {
                let response: LocatorResponse = serde_json::from_value(value)?;
                return response.into_result();
            }
            Err(EvalError::Timeout) => {
                return Err(BackendError::Timeout(
                    "Locator timed out - possibly blocked by a dialog".into(),
                ));
            }
            Err(EvalError::Context(err_str)) => {
                tracing::debug!(
                    "Context error during {} (attempt {}/{}), retrying...",
                    request.op(),
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            Err(EvalError::Backend(e)) => return Err(e),
        }
    }

    Err(BackendError::ScriptError(last_error.unwrap_or_else(|| {
        format!("{} failed after retries", request.op())
    })))
}

/// `document.readyState == "complete"`, polled until `timeout`.
pub async fn wait_for_ready_state(page: &Page, timeout: Duration) -> Result<(), BackendError> {
    const POLL: Duration = Duration::from_millis(100);
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match evaluate(page, "document.readyState").await {
            Ok(state) if state.as_str() == Some("complete") => return Ok(()),
            Ok(_) | Err(EvalError::Context(_)) => {}
            Err(EvalError::Timeout) => {
                return Err(BackendError::Timeout("readyState check timed out".into()));
            }
            Err(EvalError::Backend(e)) => return Err(e),
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BackendError::Timeout(format!(
                "page not loaded after {}ms",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(POLL).await;
    }
}
