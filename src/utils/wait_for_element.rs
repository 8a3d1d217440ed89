//! Element polling utility for SPA support
//!
//! Provides wait_for_element() which polls for DOM elements with exponential backoff.
//! This is critical for login pages that render form steps via JavaScript
//! after the initial page load event fires.

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::element::Element;

use crate::browser::{BrowserError, BrowserResult};

/// Wait for an element to appear in the DOM using exponential backoff polling
///
/// # Arguments
/// * `page` - The chromiumoxide Page to search in
/// * `selector` - CSS selector for the element
/// * `timeout` - Maximum time to wait for the element
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry (exponential backoff)
/// - Caps at 1 second maximum interval
/// - Total duration limited by timeout parameter
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> BrowserResult<Element> {
    let start = std::time::Instant::now();
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }

        if start.elapsed() >= timeout {
            return Err(BrowserError::ElementNotFound(format!(
                "'{}' (timeout after {}ms)",
                selector,
                timeout.as_millis()
            )));
        }

        tokio::time::sleep(poll_interval).await;

        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
