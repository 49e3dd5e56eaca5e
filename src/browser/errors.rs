//! Error types for the browser automation layer.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// An expected element never became available within its wait budget.
    /// Fatal to the enclosing crawl or login step; during a booking attempt
    /// the Book control mapping to this variant means "not open yet".
    #[error("element {locator} not available within {waited:?}")]
    ElementMissing { locator: String, waited: Duration },
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
