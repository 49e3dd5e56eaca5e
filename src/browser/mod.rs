//! Browser automation capability layer.
//!
//! The crawler and booking code never talk to a concrete browser; they
//! depend on the [`BrowserSession`] capability interface (navigate, bounded
//! wait, click, read) and obtain sessions from a [`Backend`]. The production
//! backend drives headless Chrome ([`chrome`]); tests substitute a mock.

pub mod chrome;
mod errors;

pub use errors::BrowserError;

use std::fmt;
use std::time::Duration;

/// How a page element is located. The portal markup is addressed by CSS
/// selectors, element ids, and the occasional XPath for text-anchored lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    Xpath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn id(id: &str) -> Self {
        Self::Css(format!("#{id}"))
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::Xpath(selector.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(selector) => write!(f, "css:{selector}"),
            Self::Xpath(selector) => write!(f, "xpath:{selector}"),
        }
    }
}

/// One live, logged-out browser page. All waits are bounded; a wait that
/// expires surfaces as [`BrowserError::ElementMissing`]. Dropping the
/// session tears the underlying browser down.
pub trait BrowserSession: Send {
    fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait until an element is present, up to `timeout`.
    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until an element is present, then click it.
    fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until an element is present, then type into it.
    fn fill(&self, locator: &Locator, text: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait until an element is present, then read its inner text.
    fn read_text(&self, locator: &Locator, timeout: Duration) -> Result<String, BrowserError>;

    /// Wait until an element is present, then return its outer HTML.
    fn html_of(&self, locator: &Locator, timeout: Duration) -> Result<String, BrowserError>;

    /// Fixed pause for page states with no observable completion condition
    /// (a heuristic, not a correctness guarantee).
    fn settle(&self, pause: Duration) {
        std::thread::sleep(pause);
    }
}

/// Opens fresh, isolated browser sessions. Sessions are never pooled or
/// reused across booking attempts so login state cannot leak between them.
pub trait Backend: Send + Sync {
    fn open(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::{Backend, BrowserError, BrowserSession, Locator};
    use crate::wodboard;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted backend for attempt and scheduler tests. Counts opened and
    /// dropped sessions and records which session pages had Book clicked.
    #[derive(Clone)]
    pub(crate) struct MockBackend {
        fail_login: bool,
        book_present: bool,
        click_delay: Duration,
        opened: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
        booked: Arc<Mutex<Vec<String>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl MockBackend {
        pub fn succeeding() -> Self {
            Self {
                fail_login: false,
                book_present: true,
                click_delay: Duration::ZERO,
                opened: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
                booked: Arc::new(Mutex::new(Vec::new())),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// The Book control never appears on any session page.
        pub fn without_book_control(mut self) -> Self {
            self.book_present = false;
            self
        }

        /// The dashboard link never appears, so login never confirms.
        pub fn failing_login(mut self) -> Self {
            self.fail_login = true;
            self
        }

        /// Artificial duration of the Book click, for pool-bound tests.
        pub fn with_click_delay(mut self, delay: Duration) -> Self {
            self.click_delay = delay;
            self
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }

        pub fn booked(&self) -> Vec<String> {
            self.booked.lock().unwrap().clone()
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl Backend for MockBackend {
        fn open(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockSession {
                backend: self.clone(),
                current_url: Mutex::new(String::new()),
            }))
        }
    }

    struct MockSession {
        backend: MockBackend,
        current_url: Mutex<String>,
    }

    impl MockSession {
        fn missing(locator: &Locator, timeout: Duration) -> BrowserError {
            BrowserError::ElementMissing {
                locator: locator.to_string(),
                waited: timeout,
            }
        }
    }

    impl BrowserSession for MockSession {
        fn goto(&self, url: &str) -> Result<(), BrowserError> {
            *self.current_url.lock().unwrap() = url.to_owned();
            Ok(())
        }

        fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
            if self.backend.fail_login && *locator == Locator::css(wodboard::DASHBOARD_LINK) {
                return Err(Self::missing(locator, timeout));
            }
            Ok(())
        }

        fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
            if *locator == Locator::xpath(wodboard::BOOK_BUTTON) {
                if !self.backend.book_present {
                    return Err(Self::missing(locator, timeout));
                }
                let running = self.backend.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.backend.max_in_flight.fetch_max(running, Ordering::SeqCst);
                std::thread::sleep(self.backend.click_delay);
                self.backend.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.backend
                    .booked
                    .lock()
                    .unwrap()
                    .push(self.current_url.lock().unwrap().clone());
            }
            Ok(())
        }

        fn fill(&self, _: &Locator, _: &str, _: Duration) -> Result<(), BrowserError> {
            Ok(())
        }

        fn read_text(&self, _: &Locator, _: Duration) -> Result<String, BrowserError> {
            Ok(String::new())
        }

        fn html_of(&self, _: &Locator, _: Duration) -> Result<String, BrowserError> {
            Ok(String::new())
        }

        fn settle(&self, _: Duration) {}
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.backend.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
