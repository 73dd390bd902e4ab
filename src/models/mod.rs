// src/models/mod.rs

//! Domain models for the scraper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod job;
mod post;

// Re-export all public types
pub use config::{
    Config, ExecutorConfig, ExtractionConfig, LoggingConfig, OutputConfig, RetryConfig,
    ScraperConfig, SiteConfig,
};
pub use job::{Job, JobStats, JobStatus, OutputFormat, ScrapeOptions};
pub use post::{ImageRef, PostRecord, UrlDescriptor};
