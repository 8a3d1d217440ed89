//! Chrome/Chromium discovery and launch configuration

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use futures::StreamExt;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::config::Config;
use crate::utils::constants::{BROWSER_REQUEST_TIMEOUT, CHROME_USER_AGENT};

/// RAII guard for ephemeral profile directory cleanup
///
/// Automatically removes the directory on drop unless consumed by `into_path()`.
/// This ensures cleanup happens on all launch-failure paths without manual
/// intervention.
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create user data directory")?;
        Ok(Self { path, keep: false })
    }

    /// Consume guard and return path, preventing automatic cleanup.
    /// Call this on success to transfer ownership to `BrowserWrapper`.
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to clean up temp dir {}: {}", self.path.display(), e);
            } else {
                info!(
                    "Cleaned up temp dir after launch failure: {}",
                    self.path.display()
                );
            }
        }
    }
}

/// Find a Chrome/Chromium executable, preferring an explicit override.
///
/// No managed download fallback: if nothing is found the error surfaces to
/// the caller and the request fails. The next request retries discovery.
pub async fn find_browser_executable(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            info!("Using configured browser executable: {}", path.display());
            return Ok(path.to_path_buf());
        }
        warn!(
            "Configured browser executable does not exist: {}",
            path.display()
        );
    }

    // Common Chrome/Chromium installation paths by platform
    let paths = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        // Linux
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = if let Some(rest) = path_str.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    // Fall back to `which` on Unix systems
    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            let output = Command::new("which").arg(cmd).output();

            if let Ok(output) = output
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which' command: {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Launch the browser process with the proxy's fixed configuration.
///
/// Sandboxing and GPU are disabled for the automated environment. When the
/// operator configured a persistent profile directory it is used as-is and
/// never cleaned up by us; otherwise an ephemeral per-process directory is
/// created and returned for later cleanup.
///
/// Returns (Browser, handler task, ephemeral profile dir if one was created).
pub async fn launch_browser(config: &Config) -> Result<(Browser, JoinHandle<()>, Option<PathBuf>)> {
    let chrome_path = find_browser_executable(config.chrome_path.as_deref()).await?;

    let (user_data_dir, temp_guard) = match &config.profile_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).context("Failed to create profile directory")?;
            (dir.clone(), None)
        }
        None => {
            let dir = std::env::temp_dir()
                .join(format!("autolink_proxy_chrome_{}", std::process::id()));
            let guard = TempDirGuard::new(dir)?;
            (guard.path.clone(), Some(guard))
        }
    };

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(BROWSER_REQUEST_TIMEOUT)
        .window_size(1280, 800)
        .user_data_dir(user_data_dir)
        .chrome_executable(chrome_path);

    if config.headful {
        config_builder = config_builder.with_head();
    } else {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    }

    // The proxy runs in automated/containerized environments where the
    // setuid sandbox is unavailable, and several upstream sites fingerprint
    // the automation defaults. Flags mirror a regular interactive Chrome as
    // closely as headless allows.
    config_builder = config_builder
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-gpu")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-extensions")
        .arg("--disable-popup-blocking")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-breakpad")
        .arg("--disable-hang-monitor")
        .arg("--disable-prompt-on-repost")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--metrics-recording-only")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!("Launching browser");
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // Chrome sends CDP events chromiumoxide doesn't recognize;
                // those deserialization failures are noise, not faults.
                // Reference: https://github.com/mattsse/chromiumoxide/issues/167
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if !is_benign_serialization_error {
                    error!("Browser handler error: {:?}", e);
                } else {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                }
            }
        }
        info!("Browser handler task completed");
    });

    // Success: hand the ephemeral dir (if any) to the caller for cleanup at
    // shutdown instead of removing it here.
    let temp_dir = temp_guard.map(TempDirGuard::into_path);

    Ok((browser, handler_task, temp_dir))
}
