//! Per-URL scrape operation.
//!
//! Validation happens once, outside the retry boundary. Each retry attempt
//! opens a fresh page, waits on the rate limiter, renders and extracts. The
//! page is dropped at the end of every attempt, whatever the outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, RenderError, Result};
use crate::models::{Config, PostRecord, ScrapeOptions, UrlDescriptor};
use crate::pipeline::{RateLimiter, RetryPolicy};
use crate::services::document::Document;
use crate::services::extractor::ContentExtractor;
use crate::services::renderer::{RenderOptions, Renderer};
use crate::services::validator::UrlValidator;

/// What a scrape produced for one URL.
#[derive(Debug)]
pub enum ScrapeOutcome {
    /// A record, successful or error-flavored.
    Scraped(PostRecord),
    /// The URL failed validation and was never rendered.
    Rejected(AppError),
}

/// Runs the validate / render / extract sequence for single URLs.
pub struct Scraper {
    renderer: Arc<dyn Renderer>,
    validator: UrlValidator,
    extractor: ContentExtractor,
    retry: RetryPolicy,
    page_timeout: Duration,
    frame_name: String,
    user_agent: String,
}

impl Scraper {
    pub fn new(config: &Config, renderer: Arc<dyn Renderer>) -> Result<Self> {
        Ok(Self {
            renderer,
            validator: UrlValidator::new(&config.site)?,
            extractor: ContentExtractor::new(&config.site, config.extraction.clone())?,
            retry: RetryPolicy::from_config(&config.retry),
            page_timeout: config.scraper.page_timeout(),
            frame_name: config.scraper.frame_name.clone(),
            user_agent: config.scraper.user_agent.clone(),
        })
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    /// Scrape one URL. Never fails: render errors that survive the retry
    /// policy become an error-flavored record.
    pub async fn scrape(
        &self,
        url: &str,
        limiter: &RateLimiter,
        options: &ScrapeOptions,
    ) -> ScrapeOutcome {
        let descriptor = match self.validator.parse(url) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::warn!("Rejected {url}: {e}");
                return ScrapeOutcome::Rejected(e);
            }
        };

        let render_options = RenderOptions {
            headless: options.headless,
            user_agent: self.user_agent.clone(),
        };
        let (descriptor_ref, render_options) = (&descriptor, &render_options);
        let result = self
            .retry
            .run(url, move |attempt| {
                self.attempt(attempt, descriptor_ref, url, limiter, render_options)
            })
            .await;

        match result {
            Ok(mut post) => {
                if !options.download_images {
                    post.images.clear();
                }
                log::info!("Scraped {}/{}: {}", post.site_id, post.post_id, post.title);
                ScrapeOutcome::Scraped(post)
            }
            Err(e) => {
                log::error!("Failed to scrape {url}: {e}");
                ScrapeOutcome::Scraped(PostRecord::failed(url, Some(&descriptor), e))
            }
        }
    }

    async fn attempt(
        &self,
        attempt: u32,
        descriptor: &UrlDescriptor,
        source_url: &str,
        limiter: &RateLimiter,
        options: &RenderOptions,
    ) -> Result<PostRecord> {
        let target = &descriptor.normalized_url;
        let render_err = |e: RenderError| AppError::render(target.as_str(), e);

        let mut page = self
            .bounded(self.renderer.open_page(options))
            .await
            .map_err(render_err)?;
        limiter.wait().await;

        log::debug!("Rendering {target} (attempt {attempt})");
        self.bounded(page.goto(target, self.page_timeout))
            .await
            .map_err(render_err)?;

        let frame = self
            .bounded(page.frame_content(&self.frame_name, self.page_timeout))
            .await
            .map_err(render_err)?;
        let html = match frame {
            Some(frame) => frame,
            None => {
                log::debug!("No '{}' frame on {target}, using top document", self.frame_name);
                self.bounded(page.content()).await.map_err(render_err)?
            }
        };

        let doc = Document::parse(&html);
        Ok(self.extractor.extract(&doc, descriptor, source_url))
    }

    /// Cap one render step at the page timeout, whatever the renderer does.
    async fn bounded<T>(
        &self,
        step: impl Future<Output = std::result::Result<T, RenderError>>,
    ) -> std::result::Result<T, RenderError> {
        tokio::time::timeout(self.page_timeout, step)
            .await
            .unwrap_or_else(|_| Err(RenderError::Timeout(self.page_timeout)))
    }
}
