use std::sync::Arc;
use tracing::debug;

use super::Job;
use super::status::StatusCell;
use crate::core::db::Row;
use crate::core::error::{HookError, JobConfigError};
use crate::core::report::{RenderSpec, RowFilter, TextReplacer};

/// Collects the pieces of a monitoring job. Every `Job::builder()` call
/// starts from scratch.
#[derive(Default)]
pub struct JobBuilder {
    name: String,
    description: Option<String>,
    query: String,
    header: Option<String>,
    labels: Vec<String>,
    columns: Vec<String>,
    cron: String,
    filter: Option<RowFilter>,
    replacer: Option<TextReplacer>,
    token: Option<String>,
}

impl JobBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Line sent above the rendered rows.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Literal text emitted before each column value, paired by index with `columns`.
    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Six-field cron expression, seconds first.
    pub fn cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = cron.into();
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Row) -> Result<bool, HookError> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn text_replacer<F>(mut self, replacer: F) -> Self
    where
        F: Fn(Row) -> Result<Row, HookError> + Send + Sync + 'static,
    {
        self.replacer = Some(Arc::new(replacer));
        self
    }

    /// Delivery token for this job only; the process default is used otherwise.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<Job, JobConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(JobConfigError::MissingName);
        }
        let cron = self.cron.trim().to_string();
        if cron.is_empty() {
            return Err(JobConfigError::MissingCron(name));
        }
        if self.query.trim().is_empty() {
            return Err(JobConfigError::MissingQuery(name));
        }
        if self.labels.len() != self.columns.len() {
            return Err(JobConfigError::LabelColumnMismatch {
                job: name,
                labels: self.labels.len(),
                columns: self.columns.len(),
            });
        }

        let spec = RenderSpec::new(self.labels.into_iter().zip(self.columns).collect());
        debug!("Built job '{}' ({} fields, cron {})", name, spec.fields().len(), cron);

        Ok(Job {
            name,
            description: self.description.filter(|d| !d.trim().is_empty()),
            query: self.query,
            header: self.header.map(|h| h + "\n").unwrap_or_default(),
            spec,
            cron,
            filter: self.filter,
            replacer: self.replacer,
            token: self.token.filter(|t| !t.trim().is_empty()),
            status: StatusCell::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::JobStatus;

    fn base() -> JobBuilder {
        Job::builder()
            .name("late-orders")
            .query("SELECT 1 AS n")
            .cron("0/5 * * * * *")
    }

    #[test]
    fn builds_pending_job_with_header_line() {
        let job = base()
            .header("Late orders")
            .labels(["n: "])
            .columns(["n"])
            .build()
            .unwrap();

        assert_eq!(job.name(), "late-orders");
        assert_eq!(job.header(), "Late orders\n");
        assert_eq!(job.status().status, JobStatus::Pending);
        assert_eq!(job.description(), "late-orders : have no description");
    }

    #[test]
    fn rejects_missing_required_fields() {
        assert_eq!(
            Job::builder().cron("* * * * * *").query("SELECT 1").build().unwrap_err(),
            JobConfigError::MissingName
        );
        assert_eq!(
            Job::builder().name("x").query("SELECT 1").build().unwrap_err(),
            JobConfigError::MissingCron("x".to_string())
        );
        assert_eq!(
            Job::builder().name("x").cron("* * * * * *").build().unwrap_err(),
            JobConfigError::MissingQuery("x".to_string())
        );
    }

    #[test]
    fn rejects_label_column_mismatch() {
        let err = base()
            .labels(["a: ", "b: "])
            .columns(["a"])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            JobConfigError::LabelColumnMismatch {
                job: "late-orders".to_string(),
                labels: 2,
                columns: 1,
            }
        );
    }

    #[test]
    fn blank_token_falls_back_to_default() {
        let job = base().token("  ").build().unwrap();
        assert_eq!(job.delivery_token("default-token"), "default-token");

        let job = base().token("own").build().unwrap();
        assert_eq!(job.delivery_token("default-token"), "own");
    }
}
