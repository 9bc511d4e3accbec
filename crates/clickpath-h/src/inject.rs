use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use clickpath_scanner::CAPTURE_JS;
use std::error::Error;
use std::future::Future;
use std::time::Duration;

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Retry an async operation that may fail due to context errors during page navigation.
/// Returns immediately on success or non-context errors; retries only on context errors.
async fn retry_on_context_error<T, E, F, Fut>(
    operation_name: &str,
    mut operation: F,
) -> Result<T, Box<dyn Error + Send + Sync>>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let err_str = e.to_string();
                if is_context_error(&err_str) {
                    tracing::debug!(
                        "{} context error (attempt {}/{}), retrying...",
                        operation_name,
                        attempt + 1,
                        MAX_CONTEXT_RETRIES
                    );
                    last_error = Some(err_str);
                    tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
                    continue;
                }
                return Err(err_str.into());
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| format!("{} failed after retries", operation_name))
        .into())
}

/// Register the capture script for every future document of `page`.
pub async fn install_capture(page: &Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(CAPTURE_JS))
        .await
        .map_err(|e| format!("Failed to register capture script: {}", e))?;
    inject_capture(page).await
}

/// Make sure the current document runs the capture script.
pub async fn inject_capture(page: &Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    retry_on_context_error("Capture injection", || try_inject_capture(page)).await
}

async fn try_inject_capture(page: &Page) -> Result<(), Box<dyn Error + Send + Sync>> {
    let is_loaded: bool = page
        .evaluate("typeof window.__clickpath !== 'undefined'")
        .await
        .map_err(|e| format!("Failed to check capture status: {}", e))?
        .into_value()
        .map_err(|e| format!("Failed to get bool value: {}", e))?;

    if !is_loaded {
        page.evaluate(CAPTURE_JS)
            .await
            .map_err(|e| format!("Failed to inject capture.js: {}", e))?;
    }

    Ok(())
}
