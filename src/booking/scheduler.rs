//! Time-windowed booking scheduler.
//!
//! Derives one booking job per distinct session link, computes each job's
//! booking-open instant, and dispatches attempts through a bounded worker
//! pool at (or immediately after, when already due) that instant. The
//! job table lives for one scheduling run; nothing is persisted.

use crate::booking::{self, BookingOutcome};
use crate::browser::Backend;
use crate::config::Credentials;
use crate::store::SessionRecord;
use crate::utils::fmt_duration;
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Reservation windows open this long before a session's start time.
const BOOKING_LEAD_DAYS: i64 = 14;

/// The instant at which a session's reservation window is assumed to open.
pub fn booking_opens_at(session_start: NaiveDateTime) -> NaiveDateTime {
    session_start - chrono::Duration::days(BOOKING_LEAD_DAYS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingJob {
    pub url: String,
    pub session_start: NaiveDateTime,
    /// `max(now at registration, booking-open instant)`; a window that
    /// already opened is attempted immediately, never dropped.
    pub run_at: NaiveDateTime,
}

/// Result of registering one session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The job will run at the session's booking-open instant.
    Scheduled { run_at: NaiveDateTime },
    /// The window is already open; the job runs as soon as a worker is free.
    Immediate,
    /// An earlier job for the same link was overwritten (last write wins).
    Replaced { run_at: NaiveDateTime },
}

pub struct BookingScheduler {
    jobs: HashMap<String, BookingJob>,
    pool_size: usize,
}

impl BookingScheduler {
    pub fn new(pool_size: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            pool_size: pool_size.max(1),
        }
    }

    /// Derive a booking job from a record and add it to the table. At most
    /// one job exists per link within a run; a re-registration replaces the
    /// earlier job so that an idempotent re-load of the same store cannot
    /// double-book.
    pub fn register(&mut self, record: &SessionRecord) -> Registration {
        let session_start = record.starts_at();
        let opens_at = booking_opens_at(session_start);
        let now = Local::now().naive_local();
        let (run_at, due_now) = if opens_at <= now {
            (now, true)
        } else {
            (opens_at, false)
        };

        let job = BookingJob {
            url: record.url.clone(),
            session_start,
            run_at,
        };
        let replaced = self.jobs.insert(record.url.clone(), job).is_some();

        if replaced {
            Registration::Replaced { run_at }
        } else if due_now {
            Registration::Immediate
        } else {
            Registration::Scheduled { run_at }
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    #[cfg(test)]
    fn job(&self, url: &str) -> Option<&BookingJob> {
        self.jobs.get(url)
    }

    /// Dispatch every job at its instant and wait for all attempts to
    /// finish.
    ///
    /// Jobs are dispatched in non-decreasing `run_at` order; the semaphore
    /// bounds concurrently executing attempts, so a saturated pool delays
    /// dispatch rather than reordering it. A shutdown signal stops further
    /// dispatch; attempts already in flight run to completion and are
    /// awaited, not cancelled.
    pub async fn run(
        self,
        backend: Arc<dyn Backend>,
        base: Url,
        credentials: Credentials,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut jobs: Vec<BookingJob> = self.jobs.into_values().collect();
        jobs.sort_by_key(|job| job.run_at);
        info!(
            jobs = jobs.len(),
            pool_size = self.pool_size,
            "booking scheduler started"
        );

        let pool = Arc::new(Semaphore::new(self.pool_size));
        let mut attempts: JoinSet<()> = JoinSet::new();
        let mut halted = false;

        'dispatch: for job in jobs {
            let now = Local::now().naive_local();
            // to_std() fails for negative deltas, i.e. already-due jobs.
            if let Ok(delay) = (job.run_at - now).to_std() {
                debug!(
                    url = job.url.as_str(),
                    session_start = %job.session_start,
                    run_at = %job.run_at,
                    "waiting for booking window"
                );
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        halted = true;
                        break 'dispatch;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => {
                    halted = true;
                    break 'dispatch;
                }
                permit = pool.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break 'dispatch,
                },
            };

            let backend = backend.clone();
            let base = base.clone();
            let credentials = credentials.clone();
            attempts.spawn(async move {
                let _permit = permit;
                let url = job.url.clone();
                let started = Instant::now();
                let result = tokio::task::spawn_blocking(move || {
                    booking::attempt(backend.as_ref(), &base, &credentials, &job.url)
                })
                .await;

                match result {
                    Ok(outcome) => {
                        let duration = fmt_duration(started.elapsed());
                        match outcome {
                            BookingOutcome::Error => {
                                error!(url, outcome = %outcome, duration, "booking attempt finished")
                            }
                            _ => info!(url, outcome = %outcome, duration, "booking attempt finished"),
                        }
                    }
                    Err(e) => error!(url, error = %e, "booking attempt task failed"),
                }
            });
        }

        if halted {
            warn!(
                in_flight = attempts.len(),
                "shutdown received; no further jobs will be dispatched"
            );
        }
        while attempts.join_next().await.is_some() {}
        info!("booking scheduler finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::MockBackend;
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::time::Duration;

    fn record_at(start: NaiveDateTime, url: &str) -> SessionRecord {
        SessionRecord {
            date: start.date(),
            time: start.time(),
            url: url.to_owned(),
        }
    }

    fn record_in(offset: ChronoDuration, url: &str) -> SessionRecord {
        record_at(Local::now().naive_local() + offset, url)
    }

    fn base() -> Url {
        Url::parse("https://www.wodboard.com").unwrap()
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "user@example.com".to_owned(),
            password: "hunter2".to_owned(),
        }
    }

    #[test]
    fn booking_opens_fourteen_days_before_start() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 28)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2025, 2, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(booking_opens_at(start), expected);
    }

    #[test]
    fn future_window_is_scheduled_at_the_open_instant() {
        let mut scheduler = BookingScheduler::new(1);
        let record = record_in(ChronoDuration::days(30), "https://w/events/1");
        let opens_at = booking_opens_at(record.starts_at());

        match scheduler.register(&record) {
            Registration::Scheduled { run_at } => assert_eq!(run_at, opens_at),
            other => panic!("expected Scheduled, got {other:?}"),
        }
    }

    #[test]
    fn past_window_dispatches_immediately_not_dropped() {
        let mut scheduler = BookingScheduler::new(1);
        let record = record_in(ChronoDuration::days(-1), "https://w/events/1");
        assert_eq!(scheduler.register(&record), Registration::Immediate);
        assert_eq!(scheduler.job_count(), 1);
    }

    #[test]
    fn duplicate_link_keeps_one_job_last_write_wins() {
        let mut scheduler = BookingScheduler::new(1);
        let first = record_in(ChronoDuration::days(20), "https://w/events/1");
        let second = record_in(ChronoDuration::days(40), "https://w/events/1");

        scheduler.register(&first);
        assert!(matches!(
            scheduler.register(&second),
            Registration::Replaced { .. }
        ));
        assert_eq!(scheduler.job_count(), 1);
        assert_eq!(
            scheduler.job("https://w/events/1").unwrap().session_start,
            second.starts_at()
        );
    }

    #[tokio::test]
    async fn runs_one_attempt_per_distinct_link() {
        let backend = MockBackend::succeeding();
        let mut scheduler = BookingScheduler::new(2);
        scheduler.register(&record_in(ChronoDuration::days(-2), "https://w/events/1"));
        scheduler.register(&record_in(ChronoDuration::days(-2), "https://w/events/2"));
        // Stale re-scrape of the same link must not double-book.
        scheduler.register(&record_in(ChronoDuration::days(-1), "https://w/events/1"));

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        scheduler
            .run(
                Arc::new(backend.clone()),
                base(),
                credentials(),
                shutdown_rx,
            )
            .await;

        assert_eq!(backend.opened(), 2);
        assert_eq!(backend.closed(), 2);
        let mut booked = backend.booked();
        booked.sort();
        assert_eq!(booked, vec!["https://w/events/1", "https://w/events/2"]);
    }

    #[tokio::test]
    async fn pool_bounds_concurrent_attempts() {
        let backend =
            MockBackend::succeeding().with_click_delay(Duration::from_millis(30));
        let mut scheduler = BookingScheduler::new(1);
        for i in 0..3 {
            scheduler.register(&record_in(
                ChronoDuration::days(-1),
                &format!("https://w/events/{i}"),
            ));
        }

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        scheduler
            .run(
                Arc::new(backend.clone()),
                base(),
                credentials(),
                shutdown_rx,
            )
            .await;

        assert_eq!(backend.opened(), 3);
        assert_eq!(backend.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_dispatch_of_pending_jobs() {
        let backend = MockBackend::succeeding();
        let mut scheduler = BookingScheduler::new(1);
        scheduler.register(&record_in(ChronoDuration::days(30), "https://w/events/1"));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(
                Arc::new(backend.clone()),
                base(),
                credentials(),
                shutdown_rx,
            ),
        )
        .await
        .expect("scheduler should stop promptly after shutdown");

        assert_eq!(backend.opened(), 0);
    }
}
