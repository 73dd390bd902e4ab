//! blogscrape CLI
//!
//! Local execution entry point: submits one scrape job and exports results.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use blogscrape::{
    error::{AppError, Result},
    models::{Config, Job, OutputFormat, ScrapeOptions},
    pipeline::{JobExecutor, JobRegistry},
    services::{HttpRenderer, Scraper, UrlValidator},
    storage::{LocalStorage, PostSink},
};
use clap::{Parser, Subcommand};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// blogscrape - Blog Post Scraper
#[derive(Parser, Debug)]
#[command(
    name = "blogscrape",
    version,
    about = "Scrapes blog posts into structured records"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape one or more post URLs as a single job
    Scrape {
        /// Post URLs (desktop, mobile or viewer form)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Export format: json or csv
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Number of workers in the pool
        #[arg(long)]
        workers: Option<usize>,

        /// Ask the renderer for a visible browser
        #[arg(long)]
        no_headless: bool,

        /// Skip image references
        #[arg(long)]
        no_images: bool,

        /// Output directory (default: output.dir from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check URLs against the supported post URL shapes
    Parse {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the config file (defaults if missing) with environment overrides.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load_or_default(path)
    } else {
        Config::default()
    };
    config.apply_env()?;
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging.level);

    match cli.command {
        Command::Scrape {
            urls,
            format,
            workers,
            no_headless,
            no_images,
            output,
        } => {
            if let Some(workers) = workers {
                config.executor.workers = workers;
            }
            config.validate()?;

            let format = format.unwrap_or(config.output.format);
            let options = ScrapeOptions {
                download_images: !no_images,
                output_format: format,
                max_concurrent: config.executor.workers,
                headless: config.scraper.headless && !no_headless,
            };
            let output_dir = output.unwrap_or_else(|| PathBuf::from(&config.output.dir));
            run_scrape(&config, urls, options, output_dir).await?;
        }

        Command::Parse { urls } => {
            let validator = UrlValidator::new(&config.site)?;
            for url in urls {
                match validator.classify(&url) {
                    Ok((pattern, d)) => println!(
                        "{url}\n  pattern: {pattern}\n  site_id: {}\n  post_id: {}\n  url:     {}",
                        d.site_id, d.post_id, d.normalized_url
                    ),
                    Err(e) => println!("{url}\n  rejected: {e}"),
                }
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}

async fn run_scrape(
    config: &Config,
    urls: Vec<String>,
    options: ScrapeOptions,
    output_dir: PathBuf,
) -> Result<()> {
    let storage = Arc::new(LocalStorage::new(&output_dir));
    let renderer = Arc::new(HttpRenderer::new(&config.scraper)?);
    let scraper = Arc::new(Scraper::new(config, renderer)?);
    let registry = Arc::new(JobRegistry::new());
    let sink: Arc<dyn PostSink> = storage.clone();
    let executor = JobExecutor::start(config, registry, scraper, Some(sink));

    let format = options.output_format;
    let receipt = executor.submit_job(urls, options)?;
    for rejected in &receipt.rejected {
        log::warn!("Skipped {}: {}", rejected.url, rejected.reason);
    }
    log::info!(
        "Job {} submitted with {} URL(s)",
        receipt.job_id,
        receipt.total_urls
    );

    let job = wait_with_progress(&executor, &receipt.job_id, config.logging.show_progress).await?;
    executor.shutdown().await;

    print_summary(&job);
    match storage.export_job(&job, format).await {
        Ok(path) => println!("Results: {}", path.display()),
        Err(AppError::ExportUnavailable { reason, .. }) => {
            log::warn!("Nothing exported: {reason}");
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

async fn wait_with_progress(executor: &JobExecutor, job_id: &str, show: bool) -> Result<Job> {
    if !show {
        return executor.wait_for(job_id, POLL_INTERVAL).await;
    }

    let mut last = None;
    loop {
        let job = executor.get_job(job_id)?;
        if last != Some(job.progress_percent) {
            log::info!(
                "Progress: {}% ({}/{})",
                job.progress_percent,
                job.processed(),
                job.total_urls
            );
            last = Some(job.progress_percent);
        }
        if job.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn print_summary(job: &Job) {
    let stats = job.stats();
    println!("Job {}: {}", job.id, job.status);
    println!(
        "  {} succeeded, {} failed ({:.0}% success), {} image(s)",
        job.completed_urls,
        job.failed_urls,
        stats.success_rate * 100.0,
        stats.image_count
    );
    for post in &job.results {
        match &post.error {
            None => println!("  ok    {}/{}  {}", post.site_id, post.post_id, post.title),
            Some(e) => println!("  fail  {}  {}", post.source_url, e),
        }
    }
}
