//! Booking attempts against session detail pages.
//!
//! Every attempt owns a freshly opened browser session for its whole
//! duration and releases it on every exit path; sessions are never shared
//! between attempts.

pub mod scheduler;

use crate::browser::{Backend, BrowserError, BrowserSession, Locator};
use crate::config::Credentials;
use crate::wodboard;
use std::fmt;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

/// How long an attempt waits for the Book control before concluding the
/// session is not open for booking.
const BOOK_WAIT: Duration = Duration::from_secs(10);
/// Render pauses around the click; the detail page exposes no observable
/// "settled" condition.
const PAGE_SETTLE: Duration = Duration::from_secs(2);
const CONFIRM_SETTLE: Duration = Duration::from_secs(2);

/// Final state of one booking attempt. `NotOpenYet` is an expected
/// outcome, not a failure: the window simply wasn't open (or the session
/// filled up first). Only logged, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked,
    NotOpenYet,
    Error,
}

impl fmt::Display for BookingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Booked => f.write_str("booked"),
            Self::NotOpenYet => f.write_str("not open yet"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Log in, open the session page, and try to activate its Book control.
pub fn attempt(
    backend: &dyn Backend,
    base: &Url,
    credentials: &Credentials,
    url: &str,
) -> BookingOutcome {
    info!(url, "attempting to book session");
    let session = match backend.open() {
        Ok(session) => session,
        Err(e) => {
            error!(url, error = %e, "failed to open browser session");
            return BookingOutcome::Error;
        }
    };
    // The session drops here on every path out of drive().
    drive(session.as_ref(), base, credentials, url)
}

fn drive(
    session: &dyn BrowserSession,
    base: &Url,
    credentials: &Credentials,
    url: &str,
) -> BookingOutcome {
    if let Err(e) = wodboard::login(session, base, credentials) {
        error!(url, error = %e, "login did not complete");
        return BookingOutcome::Error;
    }

    if let Err(e) = session.goto(url) {
        error!(url, error = %e, "failed to open session page");
        return BookingOutcome::Error;
    }
    session.settle(PAGE_SETTLE);

    match session.click(&Locator::xpath(wodboard::BOOK_BUTTON), BOOK_WAIT) {
        Ok(()) => {
            session.settle(CONFIRM_SETTLE);
            info!(url, "clicked Book");
            BookingOutcome::Booked
        }
        Err(BrowserError::ElementMissing { .. }) => {
            info!(url, "no Book control within the wait budget; not open for booking");
            BookingOutcome::NotOpenYet
        }
        Err(e) => {
            error!(url, error = %e, "booking interaction failed");
            BookingOutcome::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::MockBackend;

    fn base() -> Url {
        Url::parse("https://www.wodboard.com").unwrap()
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "user@example.com".to_owned(),
            password: "hunter2".to_owned(),
        }
    }

    const SESSION_URL: &str = "https://www.wodboard.com/events/3083038";

    #[test]
    fn books_when_control_is_present() {
        let backend = MockBackend::succeeding();
        let outcome = attempt(&backend, &base(), &credentials(), SESSION_URL);
        assert_eq!(outcome, BookingOutcome::Booked);
        assert_eq!(backend.booked(), vec![SESSION_URL.to_owned()]);
    }

    #[test]
    fn not_open_yet_when_control_never_appears() {
        let backend = MockBackend::succeeding().without_book_control();
        let outcome = attempt(&backend, &base(), &credentials(), SESSION_URL);
        assert_eq!(outcome, BookingOutcome::NotOpenYet);
        assert!(backend.booked().is_empty());
    }

    #[test]
    fn login_failure_is_an_error() {
        let backend = MockBackend::succeeding().failing_login();
        let outcome = attempt(&backend, &base(), &credentials(), SESSION_URL);
        assert_eq!(outcome, BookingOutcome::Error);
    }

    #[test]
    fn session_is_released_exactly_once_per_outcome() {
        for backend in [
            MockBackend::succeeding(),
            MockBackend::succeeding().without_book_control(),
            MockBackend::succeeding().failing_login(),
        ] {
            attempt(&backend, &base(), &credentials(), SESSION_URL);
            assert_eq!(backend.opened(), 1);
            assert_eq!(backend.closed(), 1);
        }
    }
}
