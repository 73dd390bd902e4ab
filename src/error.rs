// src/error.rs

//! Unified error handling for the scraper.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure reported by the render capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The page did not finish loading within the allotted time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// The renderer could not open a page context at all
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
}

impl RenderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RenderError::Timeout(_) | RenderError::Network(_) => true,
            RenderError::Status(code) => *code == 429 || *code >= 500,
            RenderError::Unavailable(_) => false,
        }
    }

    pub fn network(message: impl fmt::Display) -> Self {
        Self::Network(message.to_string())
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest does not report the configured limit back to us
            RenderError::Timeout(Duration::ZERO)
        } else if let Some(status) = error.status() {
            RenderError::Status(status.as_u16())
        } else {
            RenderError::network(error)
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// URL does not belong to the supported blog platform
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No submitted URL survived validation
    #[error("No valid blog post URLs were submitted")]
    NoValidUrls,

    /// Render capability failure
    #[error("Render error for {url}: {source}")]
    Render {
        url: String,
        #[source]
        source: RenderError,
    },

    /// A transient failure persisted through every retry
    #[error("Gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    /// Lookup on an unknown job id
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Illegal job status transition
    #[error("Job {id}: {message}")]
    JobState { id: String, message: String },

    /// Export format outside the supported set
    #[error("Unsupported export format: {0}")]
    UnsupportedExportFormat(String),

    /// Export requested for a job that has nothing to export yet
    #[error("Job {id} cannot be exported: {reason}")]
    ExportUnavailable { id: String, reason: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client failure outside of page rendering
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a render error for the given URL.
    pub fn render(url: impl Into<String>, source: RenderError) -> Self {
        Self::Render {
            url: url.into(),
            source,
        }
    }

    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a job state transition error.
    pub fn job_state(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JobState {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the failure is worth retrying.
    ///
    /// Only render timeouts, network failures and overloaded-server statuses
    /// qualify. Validation and registry errors are deterministic.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Render { source, .. } => source.is_transient(),
            AppError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
