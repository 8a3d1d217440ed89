//! Authenticated-session probe
//!
//! Determines whether the shared profile currently holds a live
//! identity-provider session by navigating to the account-status URL and
//! classifying where the redirect lands.

use anyhow::Context;
use chromiumoxide::page::Page;
use tracing::debug;
use url::Url;

use crate::utils::constants::{ACCOUNT_STATUS_URL, NAVIGATION_TIMEOUT, SIGNIN_HOST};

/// Probe the session state via a bounded navigation.
///
/// Any ambiguity - timeout, navigation error, missing final URL - is
/// classified as NOT authenticated; we never assume success.
pub async fn is_authenticated(page: &Page) -> bool {
    match probe(page).await {
        Ok(authenticated) => authenticated,
        Err(e) => {
            debug!("Session probe failed, treating as unauthenticated: {e:#}");
            false
        }
    }
}

async fn probe(page: &Page) -> anyhow::Result<bool> {
    tokio::time::timeout(NAVIGATION_TIMEOUT, async {
        page.goto(ACCOUNT_STATUS_URL).await?;
        page.wait_for_navigation().await?;
        Ok::<_, chromiumoxide::error::CdpError>(())
    })
    .await
    .context("account-status navigation timed out")?
    .context("account-status navigation failed")?;

    let final_url = page
        .url()
        .await
        .context("failed to read final URL")?
        .context("page has no URL after probe")?;

    Ok(!is_signin_url(&final_url))
}

/// Whether a URL belongs to the identity provider's sign-in surface.
///
/// An unparseable URL is treated as a sign-in landing (unauthenticated).
pub(crate) fn is_signin_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            let on_signin_host = url.host_str().is_some_and(|host| host == SIGNIN_HOST);
            let path = url.path().to_ascii_lowercase();
            on_signin_host || path.contains("/signin") || path.contains("servicelogin")
        }
        Err(_) => true,
    }
}
