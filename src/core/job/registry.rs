use std::sync::Arc;

use super::Job;
use crate::core::error::RegistryError;

/// Every job known to the process, in registration order.
///
/// Filled once during startup, then shared read-only (behind `Arc`) with the
/// scheduler and the status server.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Arc<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Job) -> Result<Arc<Job>, RegistryError> {
        if self.get(job.name()).is_some() {
            return Err(RegistryError::Duplicate(job.name().to_string()));
        }
        let job = Arc::new(job);
        self.jobs.push(job.clone());
        Ok(job)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Job>> {
        self.jobs.iter().find(|job| job.name() == name)
    }

    pub fn jobs(&self) -> &[Arc<Job>] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
