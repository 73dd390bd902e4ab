//! Application configuration structures.

use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::OutputFormat;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Page loading and politeness settings
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Retry policy for transient render failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Worker pool sizing
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Blog platform hosts and URL shapes
    #[serde(default)]
    pub site: SiteConfig,

    /// Content extraction limits
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Result export settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `BLOGSCRAPE_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_parse::<u64>("BLOGSCRAPE_MIN_DELAY_MS")? {
            self.scraper.min_delay_ms = v;
        }
        if let Some(v) = env_parse::<u64>("BLOGSCRAPE_MAX_DELAY_MS")? {
            self.scraper.max_delay_ms = v;
        }
        if let Some(v) = env_parse::<u32>("BLOGSCRAPE_MAX_ATTEMPTS")? {
            self.retry.max_attempts = v;
        }
        if let Some(v) = env_parse::<bool>("BLOGSCRAPE_HEADLESS")? {
            self.scraper.headless = v;
        }
        if let Ok(v) = env::var("BLOGSCRAPE_USER_AGENT") {
            self.scraper.user_agent = v;
        }
        if let Ok(v) = env::var("BLOGSCRAPE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = env::var("BLOGSCRAPE_OUTPUT_DIR") {
            self.output.dir = v;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.page_timeout_secs == 0 {
            return Err(AppError::validation(
                "scraper.page_timeout_secs must be > 0",
            ));
        }
        if self.scraper.min_delay_ms > self.scraper.max_delay_ms {
            return Err(AppError::validation(
                "scraper.min_delay_ms must not exceed scraper.max_delay_ms",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be >= 1"));
        }
        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(AppError::validation(
                "retry.backoff_multiplier must be >= 1.0",
            ));
        }
        if self.executor.workers == 0 {
            return Err(AppError::validation("executor.workers must be > 0"));
        }
        if self.site.desktop_host.trim().is_empty() || self.site.mobile_host.trim().is_empty() {
            return Err(AppError::validation("site hosts must not be empty"));
        }
        match url::Url::parse(&self.site.canonical_origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            _ => {
                return Err(AppError::validation(format!(
                    "site.canonical_origin is not an absolute http(s) URL: {}",
                    self.site.canonical_origin
                )));
            }
        }
        if self.extraction.max_body_chars == 0 {
            return Err(AppError::validation(
                "extraction.max_body_chars must be > 0",
            ));
        }
        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::config(format!("{key}={raw}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Page loading and politeness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Page load timeout in seconds
    #[serde(default = "defaults::page_timeout")]
    pub page_timeout_secs: u64,

    /// Name of the embedded frame that carries the post body
    #[serde(default = "defaults::frame_name")]
    pub frame_name: String,

    /// Lower bound of the jittered inter-request delay
    #[serde(default = "defaults::min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the jittered inter-request delay
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,

    /// Run the renderer without a visible window
    #[serde(default = "defaults::headless")]
    pub headless: bool,
}

impl ScraperConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            page_timeout_secs: defaults::page_timeout(),
            frame_name: defaults::frame_name(),
            min_delay_ms: defaults::min_delay(),
            max_delay_ms: defaults::max_delay(),
            headless: defaults::headless(),
        }
    }
}

/// Retry policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "defaults::initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "defaults::backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_delay_ms: defaults::initial_delay(),
            backoff_multiplier: defaults::backoff_multiplier(),
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Number of jobs processed concurrently
    #[serde(default = "defaults::workers")]
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
        }
    }
}

/// Blog platform hosts and URL shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Host serving the desktop post pages
    #[serde(default = "defaults::desktop_host")]
    pub desktop_host: String,

    /// Host serving the mobile post pages
    #[serde(default = "defaults::mobile_host")]
    pub mobile_host: String,

    /// Path of the query-parameter post viewer on the desktop host
    #[serde(default = "defaults::post_view_path")]
    pub post_view_path: String,

    /// Origin used for normalized URLs and root-relative image sources
    #[serde(default = "defaults::canonical_origin")]
    pub canonical_origin: String,
}

impl SiteConfig {
    /// Hosts accepted by the URL validator.
    pub fn allowed_domains(&self) -> [&str; 2] {
        [self.desktop_host.as_str(), self.mobile_host.as_str()]
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            desktop_host: defaults::desktop_host(),
            mobile_host: defaults::mobile_host(),
            post_view_path: defaults::post_view_path(),
            canonical_origin: defaults::canonical_origin(),
        }
    }
}

/// Content extraction limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Body candidates at or below this many characters are treated as empty
    #[serde(default = "defaults::min_body_chars")]
    pub min_body_chars: usize,

    /// Body text is cut after this many characters
    #[serde(default = "defaults::max_body_chars")]
    pub max_body_chars: usize,

    /// Appended to truncated bodies
    #[serde(default = "defaults::truncation_marker")]
    pub truncation_marker: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_body_chars: defaults::min_body_chars(),
            max_body_chars: defaults::max_body_chars(),
            truncation_marker: defaults::truncation_marker(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Log per-URL progress while a job runs
    #[serde(default = "defaults::show_progress")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: defaults::show_progress(),
        }
    }
}

/// Result export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for stored posts and exports
    #[serde(default = "defaults::output_dir")]
    pub dir: String,

    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: defaults::output_dir(),
            format: OutputFormat::default(),
        }
    }
}

mod defaults {
    // Scraper defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
    }
    pub fn page_timeout() -> u64 {
        30
    }
    pub fn frame_name() -> String {
        "mainFrame".into()
    }
    pub fn min_delay() -> u64 {
        2000
    }
    pub fn max_delay() -> u64 {
        5000
    }
    pub fn headless() -> bool {
        true
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn initial_delay() -> u64 {
        2000
    }
    pub fn backoff_multiplier() -> f64 {
        2.0
    }

    pub fn workers() -> usize {
        3
    }

    // Site defaults
    pub fn desktop_host() -> String {
        "blog.example.com".into()
    }
    pub fn mobile_host() -> String {
        "m.blog.example.com".into()
    }
    pub fn post_view_path() -> String {
        "PostView".into()
    }
    pub fn canonical_origin() -> String {
        "https://blog.example.com".into()
    }

    // Extraction defaults
    pub fn min_body_chars() -> usize {
        50
    }
    pub fn max_body_chars() -> usize {
        1000
    }
    pub fn truncation_marker() -> String {
        "...".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
    pub fn show_progress() -> bool {
        true
    }
    pub fn output_dir() -> String {
        "output".into()
    }
}
