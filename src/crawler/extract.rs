//! Session extraction from a rendered calendar view.
//!
//! Works on an HTML snapshot of the month grid, so the filter rules are
//! unit-testable without a browser.

use crate::wodboard;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

/// Collect the links of bookable candidate sessions from a calendar
/// snapshot, in document order.
///
/// An entry survives when its outer HTML contains `activity` (exact,
/// case-sensitive substring) and its occupancy label does not read as
/// full. An entry without an occupancy label is indeterminate and
/// discarded; an entry whose label doesn't parse is kept, since
/// unparseable is not the same as full. Entries without a link are
/// skipped silently. Duplicate links across snapshots are the caller's
/// concern.
pub fn session_links(calendar_html: &str, activity: &str) -> Vec<String> {
    static EVENT_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(wodboard::EVENT_ENTRY).unwrap());
    static COUNT_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(wodboard::OCCUPANCY_LABEL).unwrap());
    static LINK_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(wodboard::ENTRY_LINK).unwrap());

    let document = Html::parse_fragment(calendar_html);
    let mut links = Vec::new();

    for entry in document.select(&EVENT_SEL) {
        if !entry.html().contains(activity) {
            continue;
        }

        let Some(count) = entry.select(&COUNT_SEL).next() else {
            debug!("session entry has no occupancy label, skipping");
            continue;
        };
        let label = count.text().collect::<String>();
        if let Some((booked, capacity)) = parse_occupancy(&label) {
            if booked >= capacity {
                debug!(label = label.trim(), "class is full, skipping");
                continue;
            }
        }

        let Some(href) = entry
            .select(&LINK_SEL)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
        else {
            continue;
        };
        links.push(href.to_owned());
    }

    links
}

/// Parse an occupancy label like `8/10` or `10/10 +3` into
/// `(booked, capacity)`. Trailing decorations are ignored.
pub fn parse_occupancy(label: &str) -> Option<(u32, u32)> {
    static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)/(\d+)").unwrap());
    let caps = COUNT_RE.captures(label)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}
