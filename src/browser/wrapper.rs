//! Shared browser process handle
//!
//! Wraps the chromiumoxide Browser and its CDP event handler task so the
//! pair can be shared behind an `Arc` by every in-flight request. Handler
//! MUST be aborted to prevent it running indefinitely after the browser
//! is closed.

use std::path::PathBuf;

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserError, BrowserResult};

/// Handle to the single long-lived browser process.
///
/// Page creation and the liveness probe take `&self`; the inner `Browser`
/// sits behind an async Mutex because shutdown needs exclusive access while
/// requests may still hold clones of the `Arc`.
#[derive(Debug)]
pub struct BrowserWrapper {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    /// Ephemeral profile directory to remove on shutdown. `None` when the
    /// operator configured a persistent profile.
    temp_profile_dir: std::sync::Mutex<Option<PathBuf>>,
}

impl BrowserWrapper {
    pub(crate) fn new(
        browser: Browser,
        handler: JoinHandle<()>,
        temp_profile_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            browser: Mutex::new(browser),
            handler,
            temp_profile_dir: std::sync::Mutex::new(temp_profile_dir),
        }
    }

    /// Open a fresh tab. Each request gets its own page and closes it on
    /// every exit path; pages are never pooled.
    pub async fn new_page(&self, url: &str) -> BrowserResult<Page> {
        let browser = self.browser.lock().await;
        browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))
    }

    /// Liveness probe via the Browser.getVersion CDP command. A dead or
    /// wedged Chrome fails this, which triggers relaunch in the manager.
    pub async fn is_alive(&self) -> bool {
        let browser = self.browser.lock().await;
        browser.version().await.is_ok()
    }

    /// Close the browser process and wait for it to exit, then remove any
    /// ephemeral profile directory.
    ///
    /// Both `close()` and `wait()` are required: without `wait()` the Chrome
    /// process lingers as a zombie, and on Windows the profile directory
    /// cannot be removed while Chrome still holds file handles.
    pub async fn shutdown(&self) {
        info!("Shutting down browser");

        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }
        drop(browser);

        self.cleanup_temp_dir();
    }

    /// Remove the ephemeral profile directory, if one is owned.
    ///
    /// Uses blocking `std::fs::remove_dir_all()` because this may run from
    /// Drop context where async is not available.
    pub fn cleanup_temp_dir(&self) {
        let path = match self.temp_profile_dir.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(path) = path {
            info!("Cleaning up temp profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        info!("Dropping BrowserWrapper - aborting handler task");
        self.handler.abort();
        // Browser::drop() kills the Chrome process if it is still running.
    }
}
