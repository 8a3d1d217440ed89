//! Browser session manager - lazy, race-free ownership of the shared Chrome process
//!
//! Ensures only one browser process runs at a time, shared across all
//! in-flight requests.
//!
//! # Architecture
//!
//! The launch lifecycle is an explicit state machine behind a
//! `tokio::sync::Mutex`:
//!
//! - `Empty` - no browser, next caller launches
//! - `Launching` - one caller is launching; everyone else subscribes to a
//!   `watch` channel and suspends until the attempt publishes its result
//! - `Ready` - handle available, returned after a liveness probe
//!
//! Exactly one caller performs the actual launch; all waiters of that
//! attempt observe the same handle or the same error. A failed launch
//! resets the state to `Empty` so the next request retries from scratch.
//!
//! # Async Lock Requirements
//!
//! CRITICAL: Must use `tokio::sync::Mutex`, NOT a sync lock.
//! Browser operations are async and the state guard crosses `.await`
//! points in the probe and wait paths.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, BrowserResult, BrowserWrapper};
use crate::browser_setup::launch_browser;
use crate::config::Config;

type LaunchResult = BrowserResult<Arc<BrowserWrapper>>;

enum LaunchState {
    Empty,
    Launching(watch::Receiver<Option<LaunchResult>>),
    Ready(Arc<BrowserWrapper>),
}

/// What `acquire` decided to do after inspecting the state under the lock.
enum Action {
    Probe(Arc<BrowserWrapper>),
    Wait(watch::Receiver<Option<LaunchResult>>),
    Launch(watch::Sender<Option<LaunchResult>>),
}

/// Manager for the single shared browser instance.
///
/// - Lazy launch on first use (~2-3s first call, instant after)
/// - Liveness check on every access to detect crashes
/// - Automatic crash recovery (transparent to callers)
/// - Launch failures propagate to every waiter of the failed attempt
pub struct BrowserManager {
    state: Mutex<LaunchState>,
    config: Config,
}

impl BrowserManager {
    pub fn new(config: Config) -> Self {
        Self {
            state: Mutex::new(LaunchState::Empty),
            config,
        }
    }

    /// Get the shared browser handle, launching the process if needed.
    ///
    /// Callable concurrently from any number of requests. While a launch is
    /// in flight, callers suspend on the attempt's channel rather than
    /// polling; no second launch is ever triggered while one is in flight.
    pub async fn acquire(&self) -> LaunchResult {
        let config = self.config.clone();
        self.acquire_with(move || async move {
            let (browser, handler, temp_dir) = launch_browser(&config)
                .await
                .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;
            Ok(Arc::new(BrowserWrapper::new(browser, handler, temp_dir)))
        })
        .await
    }

    /// State-machine core, parameterized over the launch future so the
    /// concurrency behavior is testable without a Chrome binary.
    async fn acquire_with<F, Fut>(&self, launch: F) -> LaunchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LaunchResult>,
    {
        loop {
            let action = {
                let mut state = self.state.lock().await;
                match &*state {
                    LaunchState::Ready(handle) => Action::Probe(handle.clone()),
                    LaunchState::Launching(rx) => {
                        if rx.has_changed().is_err() {
                            // The launching caller was dropped before
                            // publishing a result. Reclaim the slot.
                            warn!("Stale launch attempt detected, resetting");
                            *state = LaunchState::Empty;
                            continue;
                        }
                        Action::Wait(rx.clone())
                    }
                    LaunchState::Empty => {
                        let (tx, rx) = watch::channel(None);
                        *state = LaunchState::Launching(rx);
                        Action::Launch(tx)
                    }
                }
            };

            match action {
                Action::Probe(handle) => {
                    if handle.is_alive().await {
                        debug!("Browser liveness check passed, reusing existing browser");
                        return Ok(handle);
                    }

                    warn!("Browser liveness check failed, triggering recovery");
                    {
                        let mut state = self.state.lock().await;
                        if let LaunchState::Ready(current) = &*state
                            && Arc::ptr_eq(current, &handle)
                        {
                            *state = LaunchState::Empty;
                        }
                    }
                    // Best-effort cleanup; the process may already be dead.
                    handle.shutdown().await;
                    info!("Crashed browser cleaned up, will launch new instance");
                }
                Action::Wait(mut rx) => match rx.wait_for(|v| v.is_some()).await {
                    Ok(value) => {
                        if let Some(result) = value.clone() {
                            return result;
                        }
                    }
                    // Attempt abandoned mid-launch; re-inspect the state.
                    Err(_) => continue,
                },
                Action::Launch(tx) => {
                    info!("Launching browser (first use or after recovery)");
                    let result = launch().await;

                    let mut state = self.state.lock().await;
                    match &result {
                        Ok(handle) => *state = LaunchState::Ready(handle.clone()),
                        Err(e) => {
                            warn!("Browser launch failed: {}", e);
                            *state = LaunchState::Empty;
                        }
                    }
                    // Waiters of this attempt all observe this exact result.
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Whether a browser process currently exists.
    pub async fn is_browser_running(&self) -> bool {
        matches!(&*self.state.lock().await, LaunchState::Ready(_))
    }

    /// Close the browser if running and release its resources.
    ///
    /// Safe to call multiple times; subsequent calls are no-ops.
    pub async fn shutdown(&self) {
        let handle = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, LaunchState::Empty) {
                LaunchState::Ready(handle) => Some(handle),
                _ => None,
            }
        };

        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn manager() -> Arc<BrowserManager> {
        Arc::new(BrowserManager::new(Config::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_share_one_failed_launch() {
        let manager = manager();
        let attempts = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let attempts = attempts.clone();
            tasks.push(tokio::spawn(async move {
                manager
                    .acquire_with(move || async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        // Keep the attempt in flight long enough for every
                        // task to arrive as a waiter.
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Err(BrowserError::LaunchFailed("boom".into()))
                    })
                    .await
            }));
        }

        for task in tasks {
            let result = task.await.expect("task panicked");
            match result {
                Err(BrowserError::LaunchFailed(msg)) => assert_eq!(msg, "boom"),
                other => panic!("expected shared launch failure, got {other:?}"),
            }
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!manager.is_browser_running().await);
    }

    #[tokio::test]
    async fn failed_launch_is_retried_by_next_request() {
        let manager = manager();
        let attempts = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let attempts = attempts.clone();
            let result = manager
                .acquire_with(move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(BrowserError::LaunchFailed("no binary".into()))
                })
                .await;
            assert!(result.is_err());
        }

        // The failed first attempt must not leave the manager believing a
        // launch is still in progress.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
