use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub last_success: Option<DateTime<Local>>,
    pub last_run: Option<DateTime<Local>>,
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    pub fn last_success_display(&self) -> String {
        match self.last_success {
            Some(at) => at.format(TIME_FORMAT).to_string(),
            None => "no record".to_string(),
        }
    }
}

/// Lock-guarded status of one job, written by its runs and read by reporters.
pub struct StatusCell {
    inner: RwLock<StatusSnapshot>,
    in_flight: AtomicUsize,
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StatusSnapshot {
                status: JobStatus::Pending,
                last_success: None,
                last_run: None,
                last_error: None,
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn record_success(&self, at: DateTime<Local>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.status = JobStatus::Succeeded;
        inner.last_success = Some(at);
        inner.last_run = Some(at);
        inner.last_error = None;
    }

    /// Marks the job failed; the previous success time is kept.
    pub fn record_failure(&self, at: DateTime<Local>, error: String) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.status = JobStatus::Failed;
        inner.last_run = Some(at);
        inner.last_error = Some(error);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn begin_run(&self) -> RunGuard<'_> {
        let already_running = self.in_flight.fetch_add(1, Ordering::SeqCst);
        RunGuard {
            counter: &self.in_flight,
            already_running,
        }
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts a run as in flight until dropped.
pub(crate) struct RunGuard<'a> {
    counter: &'a AtomicUsize,
    already_running: usize,
}

impl RunGuard<'_> {
    pub(crate) fn already_running(&self) -> usize {
        self.already_running
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_pending_without_success_time() {
        let cell = StatusCell::new();
        let snap = cell.snapshot();
        assert_eq!(snap.status, JobStatus::Pending);
        assert_eq!(snap.last_success_display(), "no record");
    }

    #[test]
    fn failure_keeps_previous_success_time() {
        let cell = StatusCell::new();
        let first = Local::now();
        cell.record_success(first);
        cell.record_failure(Local::now(), "query error".to_string());

        let snap = cell.snapshot();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.last_success, Some(first));
        assert_eq!(snap.last_error.as_deref(), Some("query error"));
    }

    #[test]
    fn run_guard_tracks_overlapping_runs() {
        let cell = StatusCell::new();
        let first = cell.begin_run();
        let second = cell.begin_run();
        assert_eq!(first.already_running(), 0);
        assert_eq!(second.already_running(), 1);
        assert_eq!(cell.in_flight(), 2);
        drop(first);
        drop(second);
        assert_eq!(cell.in_flight(), 0);
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_value(JobStatus::Succeeded).unwrap(),
            serde_json::json!("SUCCEEDED")
        );
    }
}
