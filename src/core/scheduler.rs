use std::sync::Arc;
use tokio_cron_scheduler::JobScheduler;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::error::SchedulerError;
use crate::core::job::{ExecutionContext, Job, JobRegistry};
use crate::core::lifecycle::LifecycleComponent;

/// Fires registered jobs on their cron schedules.
///
/// Each firing runs on its own task; a slow run does not hold back the next
/// firing of the same job.
pub struct MonitorScheduler {
    scheduler: JobScheduler,
    scheduled: Vec<(String, Uuid)>,
}

impl MonitorScheduler {
    pub async fn new() -> Result<Self, SchedulerError> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            scheduled: Vec::new(),
        })
    }

    pub async fn register(
        &mut self,
        job: Arc<Job>,
        ctx: ExecutionContext,
    ) -> Result<Uuid, SchedulerError> {
        let task_job = job.clone();
        let cron_job =
            tokio_cron_scheduler::Job::new_async(job.cron(), move |_uuid, mut _l| {
                let job = task_job.clone();
                let ctx = ctx.clone();
                Box::pin(async move {
                    job.execute(&ctx).await;
                })
            })
            .map_err(|e| SchedulerError::InvalidCron {
                job: job.name().to_string(),
                cron: job.cron().to_string(),
                reason: e.to_string(),
            })?;

        let id = self.scheduler.add(cron_job).await?;
        info!("Scheduled job '{}' with cron '{}'", job.name(), job.cron());
        self.scheduled.push((job.name().to_string(), id));
        Ok(id)
    }

    pub async fn register_all(
        &mut self,
        registry: &JobRegistry,
        ctx: &ExecutionContext,
    ) -> Result<usize, SchedulerError> {
        for job in registry.jobs() {
            self.register(job.clone(), ctx.clone()).await?;
        }
        if registry.is_empty() {
            warn!("No jobs registered; the scheduler will stay idle");
        }
        Ok(registry.len())
    }

    pub fn scheduled(&self) -> &[(String, Uuid)] {
        &self.scheduled
    }

    pub async fn start(&mut self) -> Result<(), SchedulerError> {
        info!("Starting scheduler with {} job(s)", self.scheduled.len());
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        info!("Shutting down scheduler");
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LifecycleComponent for MonitorScheduler {
    fn component_name(&self) -> &'static str {
        "scheduler"
    }

    async fn on_start(&mut self) -> anyhow::Result<()> {
        self.start().await?;
        Ok(())
    }

    async fn on_shutdown(&mut self) -> anyhow::Result<()> {
        self.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::Row;
    use crate::core::job::testing::{RecordingNotifier, ScriptedSource};
    use crate::core::job::JobStatus;
    use std::time::Duration;

    fn ctx(notifier: Arc<RecordingNotifier>) -> ExecutionContext {
        let rows: Vec<Row> = vec![[("n", "1")].into_iter().collect()];
        ExecutionContext {
            source: Arc::new(ScriptedSource::new(vec![Ok(rows.clone()), Ok(rows.clone()), Ok(rows)])),
            notifier,
            default_token: "tok".to_string(),
        }
    }

    fn job(name: &str, cron: &str) -> Job {
        Job::builder()
            .name(name)
            .query("SELECT 1 AS n")
            .cron(cron)
            .labels(["n="])
            .columns(["n"])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn invalid_cron_is_rejected_at_registration() {
        let mut scheduler = MonitorScheduler::new().await.unwrap();
        let err = scheduler
            .register(
                Arc::new(job("broken", "every five seconds")),
                ctx(Arc::new(RecordingNotifier::default())),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidCron { ref job, .. } if job == "broken"));
        assert!(scheduler.scheduled().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn registered_job_fires_on_schedule() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut registry = JobRegistry::new();
        let every_second = registry.register(job("tick", "* * * * * *")).unwrap();

        let mut scheduler = MonitorScheduler::new().await.unwrap();
        let count = scheduler
            .register_all(&registry, &ctx(notifier.clone()))
            .await
            .unwrap();
        assert_eq!(count, 1);

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await.unwrap();

        assert_eq!(every_second.status().status, JobStatus::Succeeded);
        assert!(!notifier.sent().is_empty());
        assert_eq!(notifier.sent()[0].0, "n=1 \n");
    }
}
