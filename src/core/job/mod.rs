mod builder;
mod registry;
mod status;

pub use builder::JobBuilder;
pub use registry::JobRegistry;
pub use status::{JobStatus, StatusCell, StatusSnapshot, TIME_FORMAT};

use chrono::Local;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::db::{Row, RowSource};
use crate::core::error::RenderError;
use crate::core::notify::Notifier;
use crate::core::report::{self, RenderSpec, Report, RowFilter, TextReplacer};

/// Collaborators a job needs at run time, handed in by whoever schedules it.
#[derive(Clone)]
pub struct ExecutionContext {
    pub source: Arc<dyn RowSource>,
    pub notifier: Arc<dyn Notifier>,
    pub default_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Delivered { chunks: usize },
    /// Rows were fetched and rendered but the notification did not go out.
    /// The job is still recorded as succeeded.
    DeliveryFailed(String),
    /// Nothing passed the filter, so nothing was sent.
    Suppressed,
    Failed(String),
}

/// A query, how to render its rows, and when to run it.
pub struct Job {
    name: String,
    description: Option<String>,
    query: String,
    header: String,
    spec: RenderSpec,
    cron: String,
    filter: Option<RowFilter>,
    replacer: Option<TextReplacer>,
    token: Option<String>,
    status: StatusCell,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("cron", &self.cron)
            .field("query", &self.query)
            .field("has_filter", &self.filter.is_some())
            .field("has_replacer", &self.replacer.is_some())
            .finish_non_exhaustive()
    }
}

impl Job {
    pub fn builder() -> JobBuilder {
        JobBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("{} : have no description", self.name),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Runs currently executing for this job (more than one means overlap).
    pub fn in_flight(&self) -> usize {
        self.status.in_flight()
    }

    pub fn delivery_token<'a>(&'a self, default_token: &'a str) -> &'a str {
        self.token.as_deref().unwrap_or(default_token)
    }

    pub fn render(&self, rows: Vec<Row>) -> Result<Report, RenderError> {
        report::render_report(rows, &self.spec, self.filter.as_ref(), self.replacer.as_ref())
    }

    /// One firing: fetch, render, deliver, record status.
    ///
    /// Never panics or propagates; every failure ends up in the status cell
    /// and the log. Overlapping runs of the same job are allowed.
    pub async fn execute(&self, ctx: &ExecutionContext) -> RunOutcome {
        let run = self.status.begin_run();
        if run.already_running() > 0 {
            warn!(
                job = %self.name,
                in_flight = run.already_running(),
                "Previous run still in progress, starting an overlapping run"
            );
        }

        let rows = match ctx.source.fetch_rows(&self.query).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(job = %self.name, "Fetch failed: {}", e);
                self.status.record_failure(Local::now(), e.to_string());
                return RunOutcome::Failed(e.to_string());
            }
        };

        let report = match self.render(rows) {
            Ok(report) => report,
            Err(e) => {
                error!(job = %self.name, "Render failed: {}", e);
                self.status.record_failure(Local::now(), e.to_string());
                return RunOutcome::Failed(e.to_string());
            }
        };

        if !report.should_send {
            info!(
                job = %self.name,
                rows = report.total_rows,
                filtered = report.filtered_rows,
                "Nothing to report"
            );
            self.status.record_success(Local::now());
            return RunOutcome::Suppressed;
        }

        let message = format!("{}{}", self.header, report.body);
        let token = self.delivery_token(&ctx.default_token);
        let outcome = match ctx.notifier.send(&message, token).await {
            Ok(chunks) => {
                info!(
                    job = %self.name,
                    rows = report.total_rows,
                    chunks,
                    "Report delivered"
                );
                RunOutcome::Delivered { chunks }
            }
            Err(e) => {
                error!(job = %self.name, "Error while sending message: {}", e);
                RunOutcome::DeliveryFailed(e.to_string())
            }
        };

        // Status tracks data health; a failed delivery still counts as success.
        self.status.record_success(Local::now());
        outcome
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingNotifier, ScriptedSource};
    use super::*;
    use crate::core::error::HookError;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    fn ctx(source: ScriptedSource, notifier: Arc<RecordingNotifier>) -> ExecutionContext {
        ExecutionContext {
            source: Arc::new(source),
            notifier,
            default_token: "default-token".to_string(),
        }
    }

    fn example_job() -> JobBuilder {
        Job::builder()
            .name("Example")
            .header("this is Example query!")
            .query("SELECT '1' AS FIRSTCOL, '2' AS SECONDCOL")
            .cron("0/5 * * * * *")
            .labels(["FIRSTCOL IS: ", "SECONDCOL IS: "])
            .columns(["FIRSTCOL", "SECONDCOL"])
    }

    #[tokio::test]
    async fn delivers_header_and_rendered_rows() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok(vec![row(&[
            ("FIRSTCOL", "1"),
            ("SECONDCOL", "2"),
        ])])]);
        let job = example_job().build().unwrap();

        let outcome = job.execute(&ctx(source, notifier.clone())).await;

        assert_eq!(outcome, RunOutcome::Delivered { chunks: 1 });
        assert_eq!(
            notifier.sent(),
            vec![(
                "this is Example query!\nFIRSTCOL IS: 1 SECONDCOL IS: 2 \n".to_string(),
                "default-token".to_string()
            )]
        );
        let status = job.status();
        assert_eq!(status.status, JobStatus::Succeeded);
        assert!(status.last_success.is_some());
    }

    #[tokio::test]
    async fn fetch_failure_then_recovery() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![
            Err("connection refused".to_string()),
            Ok(vec![row(&[("FIRSTCOL", "1"), ("SECONDCOL", "2")])]),
        ]);
        let ctx = ctx(source, notifier.clone());
        let job = example_job().build().unwrap();

        let outcome = job.execute(&ctx).await;
        assert!(matches!(outcome, RunOutcome::Failed(_)));
        let failed = job.status();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.last_success.is_none());
        assert!(notifier.sent().is_empty());

        job.execute(&ctx).await;
        let recovered = job.status();
        assert_eq!(recovered.status, JobStatus::Succeeded);
        assert!(recovered.last_success.is_some());
        assert!(recovered.last_error.is_none());
    }

    #[tokio::test]
    async fn all_filtered_rows_skip_delivery_but_succeed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok(vec![
            row(&[("FIRSTCOL", "1"), ("SECONDCOL", "1")]),
            row(&[("FIRSTCOL", "2"), ("SECONDCOL", "1")]),
        ])]);
        let job = example_job()
            .filter(|r| Ok(r.get("SECONDCOL") != "1"))
            .build()
            .unwrap();

        let outcome = job.execute(&ctx(source, notifier.clone())).await;

        assert_eq!(outcome, RunOutcome::Suppressed);
        assert!(notifier.sent().is_empty());
        assert_eq!(job.status().status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn filter_error_fails_the_run() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok(vec![row(&[("SECONDCOL", "abc")])])]);
        let job = example_job()
            .filter(|r| {
                r.get("SECONDCOL")
                    .parse::<i64>()
                    .map(|v| v != 1)
                    .map_err(|e| HookError::new(format!("convert failed: {}", e)))
            })
            .build()
            .unwrap();

        let outcome = job.execute(&ctx(source, notifier.clone())).await;

        assert!(matches!(outcome, RunOutcome::Failed(msg) if msg.contains("convert failed")));
        assert_eq!(job.status().status, JobStatus::Failed);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_still_records_success() {
        let notifier = Arc::new(RecordingNotifier::failing());
        let source = ScriptedSource::new(vec![Ok(vec![row(&[("FIRSTCOL", "1")])])]);
        let job = example_job().build().unwrap();

        let outcome = job.execute(&ctx(source, notifier.clone())).await;

        assert!(matches!(outcome, RunOutcome::DeliveryFailed(_)));
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(job.status().status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn per_job_token_overrides_default() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok(vec![row(&[("FIRSTCOL", "1")])])]);
        let job = example_job().token("job-token").build().unwrap();

        job.execute(&ctx(source, notifier.clone())).await;

        assert_eq!(notifier.sent()[0].1, "job-token");
    }

    #[tokio::test]
    async fn replacer_rewrites_values_before_rendering() {
        let notifier = Arc::new(RecordingNotifier::default());
        let source = ScriptedSource::new(vec![Ok(vec![row(&[
            ("FIRSTCOL", "1"),
            ("SECONDCOL", "2"),
        ])])]);
        let job = example_job()
            .text_replacer(|mut r| {
                r.set("SECONDCOL", "two");
                Ok(r)
            })
            .build()
            .unwrap();

        job.execute(&ctx(source, notifier.clone())).await;

        assert!(notifier.sent()[0].0.ends_with("SECONDCOL IS: two \n"));
        assert_eq!(job.in_flight(), 0);
    }
}
