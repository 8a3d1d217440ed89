//! Browser infrastructure for launching and managing the shared Chrome instance

mod wrapper;

pub use crate::browser_setup::find_browser_executable;
pub use wrapper::BrowserWrapper;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Script evaluation failed: {0}")]
    EvaluationFailed(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
