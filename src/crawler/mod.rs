//! Calendar crawler: walks consecutive month views, filters candidate
//! sessions, resolves each session's authoritative start time, and hands
//! the results to the event store.

pub mod extract;

use crate::browser::{Backend, BrowserError, BrowserSession};
use crate::config::Config;
use crate::store::{EventStore, SessionRecord};
use crate::utils::fmt_duration;
use crate::wodboard;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Run one discovery pass and write the event store.
///
/// The browser work is synchronous, so it runs on a blocking thread. A
/// structural failure (calendar or pagination never appearing, login not
/// completing) abandons the run without writing anything; per-session
/// parse problems only drop that session.
pub async fn run(
    backend: Arc<dyn Backend>,
    config: &Config,
    base: Url,
    months: u32,
    store: &EventStore,
) -> Result<()> {
    let started = Instant::now();
    let config = config.clone();
    let records =
        tokio::task::spawn_blocking(move || discover(backend.as_ref(), &base, &config, months))
            .await
            .context("crawl task panicked")??;

    store.write(&records)?;
    info!(
        sessions = records.len(),
        duration = fmt_duration(started.elapsed()),
        path = %store.path().display(),
        "event store written"
    );
    Ok(())
}

fn discover(
    backend: &dyn Backend,
    base: &Url,
    config: &Config,
    months: u32,
) -> Result<Vec<SessionRecord>> {
    let session = backend.open().context("failed to open browser session")?;
    wodboard::login(session.as_ref(), base, &config.credentials()).context("login failed")?;
    wodboard::open_month_calendar(
        session.as_ref(),
        base,
        config.calendar_id,
        config.class_type_filter.as_deref(),
    )
    .context("failed to open the timetable")?;

    let links = walk_months(session.as_ref(), &config.activity, months)?;
    info!(candidates = links.len(), "calendar walk complete");

    let mut records = Vec::new();
    for href in links {
        let url = match base.join(&href) {
            Ok(url) => url,
            Err(e) => {
                warn!(href, error = %e, "unresolvable session link, skipping");
                continue;
            }
        };
        match wodboard::read_session_start(session.as_ref(), url.as_str())? {
            Some(start) => records.push(SessionRecord {
                date: start.date(),
                time: start.time(),
                url: url.to_string(),
            }),
            None => warn!(url = %url, "detail page had no parseable start time, skipping"),
        }
    }
    Ok(records)
}

/// Extract candidate links from `months` consecutive month views, starting
/// with the one currently displayed. Duplicates are preserved; dedup is the
/// scheduler's job.
fn walk_months(
    session: &dyn BrowserSession,
    activity: &str,
    months: u32,
) -> Result<Vec<String>, BrowserError> {
    let mut links = Vec::new();
    for month in 0..months {
        let html = wodboard::visible_calendar_html(session)?;
        let found = extract::session_links(&html, activity);
        info!(
            month = month + 1,
            of = months,
            found = found.len(),
            "collected candidate sessions"
        );
        links.extend(found);

        if month + 1 < months {
            wodboard::next_month(session)?;
        }
    }
    Ok(links)
}
