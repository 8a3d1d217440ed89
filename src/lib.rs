//! Browser-backed autolink resolution proxy
//!
//! Drives a shared headless Chrome instance to call a third-party site's
//! internal autolink API from inside an authenticated tab, and exposes the
//! result over a small HTTP surface.

pub mod auth;
mod browser;
pub mod browser_setup;
pub mod config;
mod manager;
pub mod payload;
pub mod server;
pub mod upstream;
mod utils;

pub use browser::{BrowserError, BrowserResult, BrowserWrapper, find_browser_executable};
pub use config::{Config, Credentials};
pub use manager::BrowserManager;
