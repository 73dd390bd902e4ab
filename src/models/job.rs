//! Scrape job state and submission options.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::PostRecord;

/// Lifecycle status of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export format requested for a job's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(AppError::UnsupportedExportFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Options accepted with a job submission.
///
/// `max_concurrent` and `headless` are handed through to pool sizing and the
/// renderer untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOptions {
    #[serde(default = "default_true")]
    pub download_images: bool,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_true")]
    pub headless: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    3
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            download_images: true,
            output_format: OutputFormat::Json,
            max_concurrent: default_max_concurrent(),
            headless: true,
        }
    }
}

/// Aggregate figures derived from a job's results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JobStats {
    pub success_rate: f64,
    pub image_count: usize,
}

/// One batch-scrape request tracked by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub total_urls: usize,
    pub completed_urls: usize,
    pub failed_urls: usize,
    pub progress_percent: u8,

    /// Results in processing order
    pub results: Vec<PostRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Validated URLs in submission order
    pub urls: Vec<String>,

    pub options: ScrapeOptions,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job with a fresh id.
    pub fn new(urls: Vec<String>, options: ScrapeOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            total_urls: urls.len(),
            completed_urls: 0,
            failed_urls: 0,
            progress_percent: 0,
            results: Vec::new(),
            last_error: None,
            urls,
            options,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// URLs that have produced an outcome so far.
    pub fn processed(&self) -> usize {
        self.completed_urls + self.failed_urls
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `pending -> running`
    pub fn start(&mut self) -> Result<()> {
        if self.status != JobStatus::Pending {
            return Err(self.transition_error("start"));
        }
        self.status = JobStatus::Running;
        Ok(())
    }

    /// Append one URL outcome and advance the counters.
    pub fn record(&mut self, post: PostRecord) -> Result<()> {
        if self.status != JobStatus::Running {
            return Err(self.transition_error("record a result for"));
        }
        if self.processed() >= self.total_urls {
            return Err(AppError::job_state(
                &self.id,
                format!("all {} URL(s) already have results", self.total_urls),
            ));
        }

        if let Some(error) = &post.error {
            self.failed_urls += 1;
            self.last_error = Some(error.clone());
        } else {
            self.completed_urls += 1;
        }
        self.results.push(post);
        self.progress_percent = self.compute_progress();
        Ok(())
    }

    /// `running -> completed | failed`, decided by whether anything succeeded.
    pub fn finish(&mut self) -> Result<JobStatus> {
        if self.status != JobStatus::Running {
            return Err(self.transition_error("finish"));
        }
        if self.processed() != self.total_urls {
            return Err(AppError::job_state(
                &self.id,
                format!(
                    "cannot finish with {} of {} URL(s) processed",
                    self.processed(),
                    self.total_urls
                ),
            ));
        }

        self.status = if self.completed_urls > 0 {
            JobStatus::Completed
        } else {
            if self.last_error.is_none() {
                self.last_error = Some("all URLs failed".to_string());
            }
            JobStatus::Failed
        };
        self.completed_at = Some(Utc::now());
        Ok(self.status)
    }

    /// Close out a job whose worker hit an unexpected fault.
    ///
    /// A pending job is started first, so the status still moves
    /// `pending -> running -> completed | failed`. URLs without an outcome are
    /// recorded as failed with `message`, so the counters still add up to
    /// `total_urls`. A no-op on terminal jobs.
    pub fn abort(&mut self, message: &str) -> JobStatus {
        if self.is_terminal() {
            return self.status;
        }
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
        let remaining: Vec<String> = self
            .urls
            .iter()
            .skip(self.processed())
            .take(self.total_urls - self.processed())
            .cloned()
            .collect();
        for url in &remaining {
            self.failed_urls += 1;
            self.results.push(PostRecord::failed(url, None, message));
        }
        // Jobs built without a URL list still need balanced counters
        self.failed_urls += self.total_urls - self.processed();

        self.last_error = Some(message.to_string());
        self.progress_percent = self.compute_progress();
        self.status = if self.completed_urls > 0 {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.completed_at = Some(Utc::now());
        self.status
    }

    /// Derived aggregate figures.
    pub fn stats(&self) -> JobStats {
        let success_rate = if self.total_urls == 0 {
            0.0
        } else {
            self.completed_urls as f64 / self.total_urls as f64
        };
        JobStats {
            success_rate,
            image_count: self.results.iter().map(|r| r.images.len()).sum(),
        }
    }

    fn compute_progress(&self) -> u8 {
        if self.total_urls == 0 {
            return 0;
        }
        (self.processed() * 100 / self.total_urls).min(100) as u8
    }

    fn transition_error(&self, action: &str) -> AppError {
        AppError::job_state(
            &self.id,
            format!("cannot {action} a job in status '{}'", self.status),
        )
    }
}
