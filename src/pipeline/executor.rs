//! Bounded worker pool that runs scrape jobs.
//!
//! Jobs enter through an unbounded intake queue shared by a fixed number of
//! workers. A worker runs one job at a time and scrapes its URLs one after
//! another through its own rate limiter, so outbound load on the target
//! site is bounded by the pool size.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{Config, Job, JobStatus, PostRecord, ScrapeOptions};
use crate::pipeline::{JobRegistry, RateLimiter};
use crate::services::{ScrapeOutcome, Scraper};
use crate::storage::PostSink;

/// Result of a job submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    /// URLs accepted into the job
    pub total_urls: usize,
    /// URLs excluded by validation before the job was created
    pub rejected: Vec<RejectedUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedUrl {
    pub url: String,
    pub reason: String,
}

/// State shared by every worker.
struct Shared {
    registry: Arc<JobRegistry>,
    scraper: Arc<Scraper>,
    sink: Option<Arc<dyn PostSink>>,
}

type Intake = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>;

/// The engine that drives job execution.
pub struct JobExecutor {
    shared: Arc<Shared>,
    intake: Mutex<Option<mpsc::UnboundedSender<String>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobExecutor {
    /// Spawn `config.executor.workers` workers and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &Config,
        registry: Arc<JobRegistry>,
        scraper: Arc<Scraper>,
        sink: Option<Arc<dyn PostSink>>,
    ) -> Self {
        let worker_count = config.executor.workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let queue: Intake = Arc::new(tokio::sync::Mutex::new(rx));
        let shared = Arc::new(Shared {
            registry,
            scraper,
            sink,
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                let queue = Arc::clone(&queue);
                let limiter = RateLimiter::from_config(&config.scraper);
                tokio::spawn(async move { shared.worker_loop(worker_id, queue, limiter).await })
            })
            .collect();

        log::info!("Job executor started with {worker_count} worker(s)");
        Self {
            shared,
            intake: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Validate `urls`, create a job from the valid ones and enqueue it.
    ///
    /// Invalid URLs never enter the job; they are listed in the receipt.
    /// Fails with `NoValidUrls` when nothing survives validation.
    pub fn submit_job(&self, urls: Vec<String>, options: ScrapeOptions) -> Result<SubmitReceipt> {
        let validator = self.shared.scraper.validator();
        let mut valid = Vec::new();
        let mut rejected = Vec::new();

        for url in urls {
            let url = url.trim().to_string();
            match validator.parse(&url) {
                Ok(_) => valid.push(url),
                Err(e) => {
                    log::warn!("Excluding {url} from submission: {e}");
                    rejected.push(RejectedUrl {
                        url,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if valid.is_empty() {
            return Err(AppError::NoValidUrls);
        }

        let total_urls = valid.len();
        let job_id = self.shared.registry.create(valid, options)?;
        if let Err(e) = self.submit(&job_id) {
            if let Err(cleanup) = self.shared.registry.delete(&job_id) {
                log::warn!("Could not withdraw unqueued job {job_id}: {cleanup}");
            }
            return Err(e);
        }

        Ok(SubmitReceipt {
            job_id,
            total_urls,
            rejected,
        })
    }

    /// Enqueue an already-registered pending job.
    pub fn submit(&self, job_id: &str) -> Result<()> {
        let status = self.shared.registry.mutate(job_id, |job| job.status)?;
        if status != JobStatus::Pending {
            return Err(AppError::job_state(
                job_id,
                format!("only pending jobs can be submitted, job is {status}"),
            ));
        }

        let intake = self.intake.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = intake
            .as_ref()
            .ok_or_else(|| AppError::job_state(job_id, "executor is shut down"))?;
        sender
            .send(job_id.to_string())
            .map_err(|_| AppError::job_state(job_id, "no workers are accepting jobs"))?;

        log::info!("Queued job {job_id}");
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job> {
        self.shared.registry.get(job_id)
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.shared.registry.list()
    }

    /// Drop a job's bookkeeping. An in-flight run is not interrupted.
    pub fn delete_job(&self, job_id: &str) -> Result<Job> {
        self.shared.registry.delete(job_id)
    }

    /// Poll until the job reaches a terminal status.
    pub async fn wait_for(&self, job_id: &str, poll: Duration) -> Result<Job> {
        loop {
            let job = self.get_job(job_id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop accepting jobs, let workers drain the queue, and wait for them.
    pub async fn shutdown(&self) {
        self.intake
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if let Err(e) = handle.await {
                log::error!("Worker task ended abnormally: {e}");
            }
        }
        log::info!("Job executor stopped");
    }
}

impl Shared {
    async fn worker_loop(&self, worker_id: usize, queue: Intake, limiter: RateLimiter) {
        log::debug!("Worker {worker_id} started");
        loop {
            let next = queue.lock().await.recv().await;
            let Some(job_id) = next else {
                break;
            };
            self.run_job(worker_id, &job_id, &limiter).await;
        }
        log::debug!("Worker {worker_id} stopped");
    }

    /// Run one job, containing any fault so the worker stays in the pool.
    async fn run_job(&self, worker_id: usize, job_id: &str, limiter: &RateLimiter) {
        let outcome = AssertUnwindSafe(self.process_job(worker_id, job_id, limiter))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(AppError::JobNotFound(_))) => {
                log::warn!("Job {job_id} was deleted; discarding its remaining work");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "worker panicked while running the job".to_string(),
        };

        log::error!("Worker {worker_id} failed on job {job_id}: {message}");
        match self.registry.mutate(job_id, |job| job.abort(&message)) {
            Ok(status) => log::info!("Job {job_id} closed as {status}"),
            Err(e) => log::error!("Could not close job {job_id}: {e}"),
        }
    }

    async fn process_job(
        &self,
        worker_id: usize,
        job_id: &str,
        limiter: &RateLimiter,
    ) -> Result<()> {
        let (urls, options) = self.registry.mutate(job_id, |job| {
            job.start()
                .map(|()| (job.urls.clone(), job.options.clone()))
        })??;
        log::info!(
            "Worker {worker_id} running job {job_id} ({} URL(s))",
            urls.len()
        );

        for url in &urls {
            let post = match self.scraper.scrape(url, limiter, &options).await {
                ScrapeOutcome::Scraped(post) => post,
                ScrapeOutcome::Rejected(e) => PostRecord::failed(url, None, e),
            };

            if post.is_success() {
                self.store(&post).await;
            }

            let progress = self
                .registry
                .mutate(job_id, |job| job.record(post).map(|()| job.progress_percent))??;
            log::info!("Job {job_id}: {progress}% done");
        }

        let status = self.registry.mutate(job_id, Job::finish)??;
        let job = self.registry.get(job_id)?;
        log::info!(
            "Job {job_id} {status}: {} succeeded, {} failed",
            job.completed_urls,
            job.failed_urls
        );
        Ok(())
    }

    async fn store(&self, post: &PostRecord) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.store(post).await {
                log::warn!(
                    "Could not store {}/{}: {e}",
                    post.site_id,
                    post.post_id
                );
            }
        }
    }
}
