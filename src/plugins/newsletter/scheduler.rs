//! Weekly digest scheduling.
//!
//! [`WeeklySchedule`] computes fire instants in a named timezone so the local
//! wall-clock time survives DST changes. [`SchedulerHandle`] owns the worker
//! thread that sleeps until each instant and runs a [`DigestJob`].

use crate::core::config::NewsletterConfig;
use crate::core::error::HandoverError;
use crate::core::store::Store;
use crate::core::time::{self, WeekWindow};
use crate::plugins::newsletter::digest::aggregate_digest;
use crate::plugins::newsletter::mailer::{DigestSender, EmailTransport};
use crate::plugins::newsletter::source::{DigestSource, SqliteSource};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    weekday: Weekday,
    hour: u32,
    minute: u32,
    tz: Tz,
}

impl WeeklySchedule {
    pub fn new(weekday: Weekday, hour: u32, minute: u32, tz: Tz) -> Result<Self, HandoverError> {
        if hour > 23 || minute > 59 {
            return Err(HandoverError::ConfigError(format!(
                "newsletter time {:02}:{:02} is not a valid time of day",
                hour, minute
            )));
        }
        Ok(Self { weekday, hour, minute, tz })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    fn fire_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// First fire instant strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> DateTime<Tz> {
        let local_today = after.with_timezone(&self.tz).date_naive();
        let target = self.weekday.num_days_from_monday();
        let today = local_today.weekday().num_days_from_monday();
        let days_ahead = i64::from((7 + target - today) % 7);

        let candidate_on = |days: i64| {
            let date = local_today + Duration::days(days);
            time::resolve_local(&self.tz, date.and_time(self.fire_time()))
        };
        let candidate = candidate_on(days_ahead);
        if candidate.with_timezone(&Utc) > after {
            candidate
        } else {
            candidate_on(days_ahead + 7)
        }
    }

    /// `Fri 09:00 Europe/London`
    pub fn describe(&self) -> String {
        format!("{} {:02}:{:02} {}", self.weekday, self.hour, self.minute, self.tz.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub recipient: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<RunFailure>,
}

enum SubscriberOutcome {
    Sent,
    Skipped,
}

fn process_subscriber<S, T>(
    source: &S,
    sender: &DigestSender<T>,
    recipient: &str,
    window: &WeekWindow,
) -> Result<SubscriberOutcome, HandoverError>
where
    S: DigestSource + ?Sized,
    T: EmailTransport,
{
    match aggregate_digest(source, recipient, window)? {
        Some(payload) if !payload.projects.is_empty() => {
            sender.send(source, &payload)?;
            Ok(SubscriberOutcome::Sent)
        }
        _ => Ok(SubscriberOutcome::Skipped),
    }
}

/// One weekly run: every active subscriber, one at a time.
///
/// A failure for one subscriber is logged and counted, then the run moves
/// on. Only failing to enumerate subscribers aborts the run.
pub fn run_weekly_digest<S, T>(
    source: &S,
    sender: &DigestSender<T>,
    window: &WeekWindow,
) -> Result<RunSummary, HandoverError>
where
    S: DigestSource + ?Sized,
    T: EmailTransport,
{
    let recipients = source.list_active_subscriber_emails()?;
    info!(
        recipients = recipients.len(),
        week_start = %window.start_date(),
        week_end = %window.end_date(),
        "weekly digest run starting"
    );

    let mut summary = RunSummary {
        total: recipients.len(),
        ..Default::default()
    };
    for recipient in recipients {
        match process_subscriber(source, sender, &recipient, window) {
            Ok(SubscriberOutcome::Sent) => summary.sent += 1,
            Ok(SubscriberOutcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "weekly digest failed for subscriber");
                summary.failed += 1;
                summary.failures.push(RunFailure {
                    recipient,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        total = summary.total,
        sent = summary.sent,
        skipped = summary.skipped,
        failed = summary.failed,
        "weekly digest run finished"
    );
    Ok(summary)
}

/// Work performed on each trigger.
pub trait DigestJob: Send + Sync + 'static {
    fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, HandoverError>;
}

/// The production job: SQLite store, Brevo transport, window of the week containing `now`.
pub struct WeeklyDigestJob {
    store: Store,
    config: NewsletterConfig,
}

impl WeeklyDigestJob {
    pub fn new(store: Store, config: NewsletterConfig) -> Self {
        Self { store, config }
    }
}

impl DigestJob for WeeklyDigestJob {
    fn run(&self, now: DateTime<Utc>) -> Result<RunSummary, HandoverError> {
        // Missing credentials fail here, before any subscriber is touched.
        let sender = DigestSender::from_config(&self.config)?;
        let tz = self.config.timezone()?;
        let window = WeekWindow::containing(&now.with_timezone(&tz));
        let source = SqliteSource::new(self.store.clone());
        run_weekly_digest(&source, &sender, &window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Owner of the weekly trigger. Starts `Stopped`; dropping it stops the worker.
pub struct SchedulerHandle {
    schedule: WeeklySchedule,
    job: Arc<dyn DigestJob>,
    worker: Option<Worker>,
}

impl SchedulerHandle {
    pub fn new(schedule: WeeklySchedule, job: impl DigestJob) -> Self {
        Self {
            schedule,
            job: Arc::new(job),
            worker: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self.worker {
            Some(_) => SchedulerState::Running,
            None => SchedulerState::Stopped,
        }
    }

    pub fn schedule(&self) -> &WeeklySchedule {
        &self.schedule
    }

    /// Arm the trigger. Returns false if it was already armed.
    pub fn start(&mut self) -> Result<bool, HandoverError> {
        if self.worker.is_some() {
            return Ok(false);
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let schedule = self.schedule;
        let job = Arc::clone(&self.job);
        let thread = std::thread::Builder::new()
            .name("handover-newsletter".to_string())
            .spawn(move || worker_loop(schedule, job, stop_rx))?;
        self.worker = Some(Worker { stop_tx, thread });
        info!(
            schedule = %self.schedule.describe(),
            next_fire = %self.schedule.next_fire_after(Utc::now()),
            "newsletter scheduler armed"
        );
        Ok(true)
    }

    /// Disarm the trigger and wait for the worker to exit. Returns false if it was not armed.
    ///
    /// A run already in progress finishes before this returns.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        let _ = worker.stop_tx.send(());
        if worker.thread.join().is_err() {
            error!("newsletter scheduler worker panicked");
        }
        info!("newsletter scheduler disarmed");
        true
    }

    /// Run the job now, outside the schedule, on the calling thread.
    pub fn trigger_now(&self) -> Result<RunSummary, HandoverError> {
        info!("weekly digest triggered manually");
        self.job.run(Utc::now())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(schedule: WeeklySchedule, job: Arc<dyn DigestJob>, stop_rx: mpsc::Receiver<()>) {
    loop {
        let now = Utc::now();
        let next = schedule.next_fire_after(now);
        let wait = (next.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        match stop_rx.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                info!(fire_at = %next, "weekly digest trigger fired");
                if let Err(e) = job.run(Utc::now()) {
                    error!(error = %e, "weekly digest run aborted");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::newsletter::mailer::testing::{RecordingTransport, identity};
    use crate::plugins::newsletter::source::memory::{self, MemorySource};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn london() -> Tz {
        chrono_tz::Europe::London
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_fire_later_same_week() {
        let schedule = WeeklySchedule::new(Weekday::Fri, 9, 0, london()).unwrap();
        // Wednesday 8 Jan 2025.
        let next = schedule.next_fire_after(utc(2025, 1, 8, 12, 0));
        assert_eq!(next.with_timezone(&Utc), utc(2025, 1, 10, 9, 0));
    }

    #[test]
    fn test_next_fire_after_passing_rolls_a_week() {
        let schedule = WeeklySchedule::new(Weekday::Fri, 9, 0, london()).unwrap();
        let next = schedule.next_fire_after(utc(2025, 1, 10, 9, 0));
        assert_eq!(next.with_timezone(&Utc), utc(2025, 1, 17, 9, 0));
        let earlier = schedule.next_fire_after(utc(2025, 1, 10, 8, 59));
        assert_eq!(earlier.with_timezone(&Utc), utc(2025, 1, 10, 9, 0));
    }

    #[test]
    fn test_local_time_is_stable_across_dst() {
        let schedule = WeeklySchedule::new(Weekday::Fri, 9, 0, london()).unwrap();
        // Winter: 09:00 GMT is 09:00 UTC.
        let winter = schedule.next_fire_after(utc(2025, 3, 24, 0, 0));
        assert_eq!(winter.with_timezone(&Utc), utc(2025, 3, 28, 9, 0));
        // Clocks go forward on 30 Mar; 09:00 BST is 08:00 UTC.
        let summer = schedule.next_fire_after(winter.with_timezone(&Utc));
        assert_eq!(summer.with_timezone(&Utc), utc(2025, 4, 4, 8, 0));
        assert_eq!(summer.format("%H:%M").to_string(), "09:00");
    }

    #[test]
    fn test_fire_time_in_dst_gap_moves_forward() {
        // 01:30 on 30 Mar 2025 does not exist in London.
        let schedule = WeeklySchedule::new(Weekday::Sun, 1, 30, london()).unwrap();
        let next = schedule.next_fire_after(utc(2025, 3, 29, 12, 0));
        assert_eq!(next.with_timezone(&Utc), utc(2025, 3, 30, 1, 0));
        assert_eq!(next.format("%H:%M").to_string(), "02:00");
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(WeeklySchedule::new(Weekday::Mon, 24, 0, london()).is_err());
        assert!(WeeklySchedule::new(Weekday::Mon, 9, 60, london()).is_err());
    }

    fn in_week_window() -> WeekWindow {
        let now = london().with_ymd_and_hms(2025, 1, 10, 9, 0, 0).single().unwrap();
        WeekWindow::containing(&now)
    }

    #[test]
    fn test_run_continues_past_failing_subscriber() {
        let touched = "2025-01-08T12:00:00.000Z";
        let source = MemorySource {
            subscriptions: vec![
                ("one@example.com".into(), 1),
                ("two@example.com".into(), 1),
                ("three@example.com".into(), 1),
            ],
            projects: vec![memory::project(1, "Acme Portal", touched)],
            failing: vec!["two@example.com".into()],
            ..Default::default()
        };
        let sender = DigestSender::new(RecordingTransport::default(), identity());
        let summary = run_weekly_digest(&source, &sender, &in_week_window()).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failures[0].recipient, "two@example.com");
        let sent = sender.transport().sent.lock().unwrap();
        let recipients: Vec<&str> = sent.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(recipients, vec!["one@example.com", "three@example.com"]);
    }

    #[test]
    fn test_empty_digest_is_skipped_not_failed() {
        let source = MemorySource {
            subscriptions: vec![("dev@example.com".into(), 1)],
            disabled: vec![1],
            projects: vec![memory::project(1, "Acme Portal", "2025-01-08T12:00:00.000Z")],
            ..Default::default()
        };
        let sender = DigestSender::new(RecordingTransport::default(), identity());
        let summary = run_weekly_digest(&source, &sender, &in_week_window()).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(sender.transport().sent.lock().unwrap().is_empty());
    }

    #[derive(Default)]
    struct CountingJob {
        runs: Arc<AtomicUsize>,
    }

    impl DigestJob for CountingJob {
        fn run(&self, _now: DateTime<Utc>) -> Result<RunSummary, HandoverError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(RunSummary::default())
        }
    }

    #[test]
    fn test_start_stop_are_idempotent() {
        let schedule = WeeklySchedule::new(Weekday::Fri, 9, 0, london()).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut handle = SchedulerHandle::new(schedule, CountingJob { runs: Arc::clone(&runs) });

        assert_eq!(handle.state(), SchedulerState::Stopped);
        assert!(handle.start().unwrap());
        assert!(!handle.start().unwrap());
        assert_eq!(handle.state(), SchedulerState::Running);

        handle.trigger_now().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert!(handle.stop());
        assert!(!handle.stop());
        assert_eq!(handle.state(), SchedulerState::Stopped);
    }
}
