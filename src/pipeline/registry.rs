//! In-memory job bookkeeping.
//!
//! The registry is an explicit service object: the executor and the
//! submission boundary share one through an `Arc`, and tests can create as
//! many independent registries as they like.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{AppError, Result};
use crate::models::{Job, ScrapeOptions};

/// Process-lifetime store of jobs keyed by id.
///
/// Mutation closures run while the job's shard is locked, so they must be
/// short and must not block or perform I/O. Mutations of jobs in other
/// shards proceed concurrently.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job and return its id.
    pub fn create(&self, urls: Vec<String>, options: ScrapeOptions) -> Result<String> {
        self.insert(Job::new(urls, options))
    }

    /// Register an already-built job. Fails if the id is taken.
    pub fn insert(&self, job: Job) -> Result<String> {
        let id = job.id.clone();
        match self.jobs.entry(id.clone()) {
            Entry::Occupied(_) => Err(AppError::job_state(&id, "job id already registered")),
            Entry::Vacant(slot) => {
                log::debug!("Registered job {} with {} URL(s)", id, job.total_urls);
                slot.insert(job);
                Ok(id)
            }
        }
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &str) -> Result<Job> {
        self.jobs
            .get(id)
            .map(|job| job.value().clone())
            .ok_or_else(|| AppError::JobNotFound(id.to_string()))
    }

    /// Snapshots of every job, oldest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|job| job.value().clone()).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Remove a job's bookkeeping. A still-running worker is not interrupted;
    /// its later updates are discarded.
    pub fn delete(&self, id: &str) -> Result<Job> {
        self.jobs
            .remove(id)
            .map(|(_, job)| job)
            .ok_or_else(|| AppError::JobNotFound(id.to_string()))
    }

    /// Apply `f` to one job while holding its entry exclusively.
    pub fn mutate<T>(&self, id: &str, f: impl FnOnce(&mut Job) -> T) -> Result<T> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| AppError::JobNotFound(id.to_string()))?;
        Ok(f(job.value_mut()))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
