//! Headless Chrome implementation of the capability interface.
//!
//! Each [`ChromeBackend::open`] launches a dedicated Chrome process with a
//! single tab; dropping the returned session kills the process. Wait
//! timeouts are classified as [`BrowserError::ElementMissing`] so callers
//! can tell "element never appeared" apart from backend failures.

use super::{Backend, BrowserError, BrowserSession, Locator};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Chrome shuts itself down after this long without CDP traffic; raised
/// above the default so settle pauses between interactions are safe.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(90);

pub struct ChromeBackend {
    headless: bool,
}

impl ChromeBackend {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

impl Backend for ChromeBackend {
    fn open(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let options = LaunchOptions::default_builder()
            .headless(self.headless)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let browser = Browser::new(options).map_err(BrowserError::Backend)?;
        let tab = browser.new_tab().map_err(BrowserError::Backend)?;
        debug!("browser session opened");
        Ok(Box::new(ChromeSession {
            _browser: browser,
            tab,
        }))
    }
}

struct ChromeSession {
    // Held so the Chrome process outlives the tab; killed on drop.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn wait_element(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Element<'_>, BrowserError> {
        let found = match locator {
            Locator::Css(selector) => self
                .tab
                .wait_for_element_with_custom_timeout(selector, timeout),
            Locator::Xpath(selector) => self
                .tab
                .wait_for_xpath_with_custom_timeout(selector, timeout),
        };
        found.map_err(|e| classify(locator, timeout, e))
    }
}

/// Waits time out with [`headless_chrome::util::Timeout`]; everything else
/// is a backend failure.
fn classify(locator: &Locator, waited: Duration, e: anyhow::Error) -> BrowserError {
    if e.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        BrowserError::ElementMissing {
            locator: locator.to_string(),
            waited,
        }
    } else {
        BrowserError::Backend(e)
    }
}

impl BrowserSession for ChromeSession {
    fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(BrowserError::Backend)
    }

    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        self.wait_element(locator, timeout).map(|_| ())
    }

    fn click(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        self.wait_element(locator, timeout)?
            .click()
            .map(|_| ())
            .map_err(BrowserError::Backend)
    }

    fn fill(&self, locator: &Locator, text: &str, timeout: Duration) -> Result<(), BrowserError> {
        let element = self.wait_element(locator, timeout)?;
        element
            .focus()
            .and_then(|element| element.type_into(text))
            .map(|_| ())
            .map_err(BrowserError::Backend)
    }

    fn read_text(&self, locator: &Locator, timeout: Duration) -> Result<String, BrowserError> {
        self.wait_element(locator, timeout)?
            .get_inner_text()
            .map_err(BrowserError::Backend)
    }

    fn html_of(&self, locator: &Locator, timeout: Duration) -> Result<String, BrowserError> {
        self.wait_element(locator, timeout)?
            .get_content()
            .map_err(BrowserError::Backend)
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        debug!("browser session closed");
    }
}
