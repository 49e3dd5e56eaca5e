//! WODBoard (wodboard.com) portal flows.
//!
//! WODBoard renders its timetable with FullCalendar and gates booking
//! behind a logged-in UI interaction, so every flow here drives a live
//! browser page through the [`BrowserSession`] capability interface.
//! Selector constants are collected in one place because the extractor,
//! the booking attempt, and the test mock all need to agree on them.

use crate::browser::{BrowserError, BrowserSession, Locator};
use crate::config::Credentials;
use chrono::NaiveDateTime;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Signals the timetable finished its initial load.
pub const CALENDAR_READY: &str = ".fullCalendar-wrapper .calendar";
/// Subtree snapshotted for session extraction.
pub const CALENDAR_ROOT: &str = ".fullCalendar-wrapper";
pub const MONTH_VIEW_BUTTON: &str = ".fc-month-button";
pub const NEXT_MONTH_BUTTON: &str = ".fc-next-button";
/// One session entry in the month grid.
pub const EVENT_ENTRY: &str = ".wb-event";
/// Occupancy label inside an entry, e.g. `10/10 +3`.
pub const OCCUPANCY_LABEL: &str = ".bottom-row .count.float-right";
/// Anchor carrying the session's stable link.
pub const ENTRY_LINK: &str = ".top-row a";

/// Present only once login completed.
pub const DASHBOARD_LINK: &str = "a[href='/dashboard']";
pub const LOGIN_EMAIL_ID: &str = "user_session_email";
pub const LOGIN_PASSWORD_ID: &str = "user_session_password";
pub const LOGIN_SUBMIT: &str = "input[type='submit']";

pub const FILTER_LINK_ID: &str = "filter-link";
pub const FILTER_UPDATE: &str = "input.btn.btn-primary[type='submit'][value='Update']";

/// The Book control on a session detail page.
pub const BOOK_BUTTON: &str = "//div[@class='form-footer']//a[contains(@class, 'btn btn-primary') and normalize-space(text())='Book']";
/// Value node next to the "Date & Time" label on a detail page.
pub const DATE_TIME_FIELD: &str =
    "//label[normalize-space(text())='Date & Time']/following-sibling::p";

const ELEMENT_WAIT: Duration = Duration::from_secs(20);
const LOGIN_WAIT: Duration = Duration::from_secs(20);
const DETAIL_WAIT: Duration = Duration::from_secs(10);
/// The calendar re-renders in place after view/filter changes with no
/// observable completion marker; these pauses are heuristics.
const REFRESH_SETTLE: Duration = Duration::from_secs(2);
const MONTH_SETTLE: Duration = Duration::from_secs(3);
const PAGE_SETTLE: Duration = Duration::from_secs(2);

/// External format of the detail page's date/time field, e.g. `14/02/2025 12:00`.
const DETAIL_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Log into the portal and wait until the dashboard link confirms it.
pub fn login(
    session: &dyn BrowserSession,
    base: &Url,
    credentials: &Credentials,
) -> Result<(), BrowserError> {
    info!("logging into WODBoard");
    let login_url = base.join("login").map_err(|e| BrowserError::Backend(e.into()))?;
    session.goto(login_url.as_str())?;
    session.fill(
        &Locator::id(LOGIN_EMAIL_ID),
        &credentials.username,
        ELEMENT_WAIT,
    )?;
    session.fill(
        &Locator::id(LOGIN_PASSWORD_ID),
        &credentials.password,
        ELEMENT_WAIT,
    )?;
    session.click(&Locator::css(LOGIN_SUBMIT), ELEMENT_WAIT)?;
    session.wait_for(&Locator::css(DASHBOARD_LINK), LOGIN_WAIT)?;
    info!("login confirmed");
    Ok(())
}

/// Open the timetable in month view and, when configured, narrow it with
/// the portal's class-type filter.
pub fn open_month_calendar(
    session: &dyn BrowserSession,
    base: &Url,
    calendar_id: u32,
    class_type_filter: Option<&str>,
) -> Result<(), BrowserError> {
    info!(calendar = calendar_id, "opening timetable");
    let calendar_url = base
        .join(&format!("calendars/{calendar_id}"))
        .map_err(|e| BrowserError::Backend(e.into()))?;
    session.goto(calendar_url.as_str())?;
    session.wait_for(&Locator::css(CALENDAR_READY), ELEMENT_WAIT)?;

    session.click(&Locator::css(MONTH_VIEW_BUTTON), ELEMENT_WAIT)?;
    session.settle(REFRESH_SETTLE);

    if let Some(control_id) = class_type_filter {
        debug!(control = control_id, "applying class-type filter");
        session.click(&Locator::id(FILTER_LINK_ID), ELEMENT_WAIT)?;
        session.click(
            &Locator::css(&format!(
                "label.custom-control-label[for='{control_id}']"
            )),
            ELEMENT_WAIT,
        )?;
        session.click(&Locator::css(FILTER_UPDATE), ELEMENT_WAIT)?;
        session.settle(REFRESH_SETTLE);
    }
    Ok(())
}

/// Advance the calendar to the next month view.
pub fn next_month(session: &dyn BrowserSession) -> Result<(), BrowserError> {
    session.click(&Locator::css(NEXT_MONTH_BUTTON), ELEMENT_WAIT)?;
    session.settle(MONTH_SETTLE);
    Ok(())
}

/// Snapshot the visible calendar's HTML once at least one session entry is
/// present. Absence of any entry within the wait budget means the calendar
/// never loaded and aborts the run.
pub fn visible_calendar_html(session: &dyn BrowserSession) -> Result<String, BrowserError> {
    session.wait_for(&Locator::css(EVENT_ENTRY), ELEMENT_WAIT)?;
    session.html_of(&Locator::css(CALENDAR_ROOT), ELEMENT_WAIT)
}

/// Read the authoritative start time from a session's detail page.
///
/// Returns `Ok(None)` when the field is present but unparseable; one
/// malformed page must not halt the batch.
pub fn read_session_start(
    session: &dyn BrowserSession,
    link: &str,
) -> Result<Option<NaiveDateTime>, BrowserError> {
    session.goto(link)?;
    session.settle(PAGE_SETTLE);
    let raw = session.read_text(&Locator::xpath(DATE_TIME_FIELD), DETAIL_WAIT)?;
    Ok(parse_detail_datetime(&raw))
}

/// Parse a detail-page date/time value like `14/02/2025 12:00`.
pub fn parse_detail_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    match NaiveDateTime::parse_from_str(trimmed, DETAIL_FORMAT) {
        Ok(start) => Some(start),
        Err(_) => {
            warn!(value = trimmed, "unrecognized Date & Time format");
            None
        }
    }
}
