//! Automated identifier-first login flow
//!
//! Drives the identity provider's two-step form: identifier, submit,
//! password, submit, then re-probes the session. The flow is inherently
//! fragile against upstream UI changes and makes no attempt to be robust;
//! it fails safely and reports why.

use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use tracing::{debug, info};

use super::prober::is_authenticated;
use super::LoginOutcome;
use crate::config::Credentials;
use crate::utils::constants::{
    CHALLENGE_MARKERS, ELEMENT_TIMEOUT, IDENTIFIER_NEXT_SELECTOR, IDENTIFIER_SELECTOR, LOGIN_URL,
    NAVIGATION_TIMEOUT, PASSWORD_NEXT_SELECTOR, PASSWORD_SELECTOR,
};
use crate::utils::wait_for_element;

/// Attempt a form-based login with the configured credentials.
///
/// Always best-effort: every automation failure is folded into the
/// returned outcome, never propagated as an error.
pub async fn attempt_login(page: &Page, credentials: Option<&Credentials>) -> LoginOutcome {
    let Some(credentials) = credentials else {
        return LoginOutcome::MissingCredentials;
    };

    info!("Attempting identity-provider login");
    if let Err(e) = drive_login_flow(page, credentials).await {
        return LoginOutcome::Failed(format!("{e:#}"));
    }

    if is_authenticated(page).await {
        return LoginOutcome::Success;
    }

    // Not authenticated after a clean flow: look for challenge markers in
    // the visible page text before giving up as unconfirmed.
    match visible_page_text(page).await {
        Ok(text) => {
            let lowered = text.to_lowercase();
            if CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m)) {
                LoginOutcome::NeedsChallenge("additional verification required".to_string())
            } else {
                LoginOutcome::Unconfirmed(
                    "login flow completed but session is not authenticated".to_string(),
                )
            }
        }
        Err(e) => LoginOutcome::Unconfirmed(format!("could not inspect page after login: {e:#}")),
    }
}

async fn drive_login_flow(page: &Page, credentials: &Credentials) -> anyhow::Result<()> {
    tokio::time::timeout(NAVIGATION_TIMEOUT, async {
        page.goto(LOGIN_URL).await?;
        page.wait_for_navigation().await?;
        Ok::<_, chromiumoxide::error::CdpError>(())
    })
    .await
    .map_err(|_| anyhow::anyhow!("login page navigation timed out"))??;

    let identifier = wait_for_element(page, IDENTIFIER_SELECTOR, ELEMENT_TIMEOUT).await?;
    identifier.click().await?;
    identifier.type_str(&credentials.username).await?;
    submit_step(page, &identifier, IDENTIFIER_NEXT_SELECTOR).await?;

    let password = wait_for_element(page, PASSWORD_SELECTOR, ELEMENT_TIMEOUT).await?;
    password.click().await?;
    password.type_str(&credentials.password).await?;
    submit_step(page, &password, PASSWORD_NEXT_SELECTOR).await?;

    // Best-effort wait for the post-login navigation. A timeout here is
    // not fatal; the re-probe decides the outcome.
    match tokio::time::timeout(NAVIGATION_TIMEOUT, page.wait_for_navigation()).await {
        Ok(Err(e)) => debug!("post-login navigation errored: {e}"),
        Err(_) => debug!("post-login navigation wait timed out"),
        Ok(Ok(_)) => {}
    }

    Ok(())
}

/// Submit the current form step: click the primary control if present,
/// otherwise fall back to pressing Enter in the field.
async fn submit_step(page: &Page, field: &Element, control_selector: &str) -> anyhow::Result<()> {
    match page.find_element(control_selector).await {
        Ok(button) => {
            button.click().await?;
        }
        Err(_) => {
            debug!(
                "Submit control '{}' not found, falling back to Enter key",
                control_selector
            );
            field.press_key("Enter").await?;
        }
    }
    Ok(())
}

async fn visible_page_text(page: &Page) -> anyhow::Result<String> {
    let text: String = page
        .evaluate("document.body.innerText")
        .await?
        .into_value()?;
    Ok(text)
}
