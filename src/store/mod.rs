//! Flat-file event store shared by the crawler and the booking scheduler.
//!
//! Rows are `date,time,url` (`%Y-%m-%d`, `%H:%M:%S`, absolute link). The
//! header row is always written and the first row is always consumed as a
//! header on read, never treated as data, no content sniffing. The reader
//! is tolerant: rows with fewer than three fields and rows that fail to
//! parse are skipped with a warning, never fatal. Times are accepted in
//! `%H:%M:%S` or microsecond-qualified `%H:%M:%S%.f` form.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER: [&str; 3] = ["date", "time", "url"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
/// Accepted on read, in order. The second form tolerates rows written by
/// tools that serialize times with fractional seconds.
const TIME_READ_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M:%S%.f"];

/// One discovered session: the unit of persistence. `url` is the session's
/// stable identifier; re-discovery yields the same link. Records are only
/// ever appended and re-read, never updated; staleness is resolved at
/// booking-attempt time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub url: String,
}

impl SessionRecord {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize records, replacing any existing store file.
    pub fn write(&self, records: &[SessionRecord]) -> Result<()> {
        let mut writer = csv::Writer::from_path(&self.path).with_context(|| {
            format!("failed to create event store at {}", self.path.display())
        })?;
        writer.write_record(HEADER)?;
        for record in records {
            writer.write_record([
                record.date.format(DATE_FORMAT).to_string(),
                record.time.format(TIME_FORMAT).to_string(),
                record.url.clone(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read all well-formed records back, skipping tolerated malformed rows.
    pub fn read(&self) -> Result<Vec<SessionRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open event store at {}", self.path.display()))?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable event store row");
                    continue;
                }
            };
            if row.len() < 3 {
                debug!(fields = row.len(), "skipping short event store row");
                continue;
            }
            match parse_row(&row) {
                Some(record) => records.push(record),
                None => warn!(row = ?row, "skipping unparseable event store row"),
            }
        }
        Ok(records)
    }
}

fn parse_row(row: &csv::StringRecord) -> Option<SessionRecord> {
    let date = NaiveDate::parse_from_str(row.get(0)?.trim(), DATE_FORMAT).ok()?;
    let time = parse_time(row.get(1)?.trim())?;
    let url = row.get(2)?.trim();
    if url.is_empty() {
        return None;
    }
    Some(SessionRecord {
        date,
        time,
        url: url.to_owned(),
    })
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    TIME_READ_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}
