//! Shared configuration constants for the proxy
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

use std::time::Duration;

/// Chrome user agent string for stealth mode
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
/// Next update: 2025-04-29 (quarterly schedule)
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Default upstream site origin. The autolink endpoint lives under this
/// origin and must be called from a page on the same origin so the browser
/// attaches session cookies and anti-bot tokens. Override with
/// `UPSTREAM_ORIGIN`.
pub const DEFAULT_UPSTREAM_ORIGIN: &str = "https://9xbuddy.com";

/// Path of the internal autolink resolution endpoint, relative to the
/// upstream origin.
pub const AUTOLINK_API_PATH: &str = "/api/autolink";

/// Identity provider account-status URL. Navigating here while signed in
/// lands on the account page; while signed out it redirects into the
/// sign-in flow.
pub const ACCOUNT_STATUS_URL: &str = "https://accounts.google.com/ServiceLogin?passive=true";

/// Identity provider login entry point (identifier-first flow).
pub const LOGIN_URL: &str =
    "https://accounts.google.com/signin/v2/identifier?flowName=GlifWebSignIn";

/// Host that marks an unauthenticated session when a probe navigation
/// lands on it.
pub const SIGNIN_HOST: &str = "accounts.google.com";

/// CSS selectors for the identifier-first login form. Comma lists give the
/// flow a fighting chance across upstream markup revisions; the flow is
/// still allowed to fail safely when these rot.
pub const IDENTIFIER_SELECTOR: &str = "input[type=email], input#identifierId";
pub const IDENTIFIER_NEXT_SELECTOR: &str = "#identifierNext button, #identifierNext";
pub const PASSWORD_SELECTOR: &str = "input[type=password][name=Passwd], input[type=password]";
pub const PASSWORD_NEXT_SELECTOR: &str = "#passwordNext button, #passwordNext";

/// Page text markers that indicate the identity provider wants additional
/// verification (matched case-insensitively).
pub const CHALLENGE_MARKERS: &[&str] = &["verify", "2-step", "challenge", "captcha"];

/// Connection timeout for the CDP websocket, distinct from per-operation
/// navigation timeouts.
pub const BROWSER_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounded timeout for probe and site navigations.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded timeout for locating login form elements.
pub const ELEMENT_TIMEOUT: Duration = Duration::from_secs(15);
