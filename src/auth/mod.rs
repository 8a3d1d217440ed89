//! Identity-provider session probing and best-effort login automation

mod login;
mod prober;

pub use login::attempt_login;
pub use prober::is_authenticated;

/// Outcome of an automated login attempt.
///
/// Tagged rather than bool-plus-string so callers handle every case
/// explicitly. The login path never surfaces an `Err`; automation failures
/// land in `Failed` with the detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Session confirmed authenticated after the flow.
    Success,
    /// No credentials configured; login skipped entirely.
    MissingCredentials,
    /// The provider is asking for verification we cannot automate
    /// (2-step, CAPTCHA, device confirmation).
    NeedsChallenge(String),
    /// Flow completed without error but the session still probes as
    /// unauthenticated.
    Unconfirmed(String),
    /// Automation broke mid-flow (missing element, timeout, CDP error).
    Failed(String),
}

impl LoginOutcome {
    pub fn ok(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            LoginOutcome::Success => None,
            LoginOutcome::MissingCredentials => Some("missing credentials"),
            LoginOutcome::NeedsChallenge(reason)
            | LoginOutcome::Unconfirmed(reason)
            | LoginOutcome::Failed(reason) => Some(reason),
        }
    }
}
