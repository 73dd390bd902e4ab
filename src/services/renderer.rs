//! Page rendering capability.
//!
//! The scraper only needs three things from a renderer: navigate a page,
//! read its document and read a named frame's document. `HttpRenderer`
//! provides them over plain HTTP; browser-backed renderers plug in through
//! the same traits.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{RenderError, Result};
use crate::models::ScraperConfig;
use crate::services::document::{Document, parse_selector};
use crate::utils::http::{create_async_client, fetch_text};
use crate::utils::resolve_url;

/// Per-page options passed through to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub headless: bool,
    pub user_agent: String,
}

/// Opens isolated page contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Acquire a fresh page. The page is released when the box is dropped.
    async fn open_page(
        &self,
        options: &RenderOptions,
    ) -> std::result::Result<Box<dyn PageContext>, RenderError>;
}

/// A single open page.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Navigate to `url`, failing with `Timeout` past `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> std::result::Result<(), RenderError>;

    /// Markup of the top-level document.
    async fn content(&self) -> std::result::Result<String, RenderError>;

    /// Markup of the named embedded frame, or `None` if the page has none.
    async fn frame_content(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> std::result::Result<Option<String>, RenderError>;
}

/// Renderer that fetches pages over HTTP without running scripts.
pub struct HttpRenderer {
    client: reqwest::Client,
    default_user_agent: String,
}

impl HttpRenderer {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            default_user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn open_page(
        &self,
        options: &RenderOptions,
    ) -> std::result::Result<Box<dyn PageContext>, RenderError> {
        if !options.headless {
            log::debug!("HTTP renderer has no visible mode; ignoring headless=false");
        }
        let user_agent = (options.user_agent != self.default_user_agent)
            .then(|| options.user_agent.clone());

        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            user_agent,
            url: None,
            html: None,
        }))
    }
}

struct HttpPage {
    client: reqwest::Client,
    user_agent: Option<String>,
    url: Option<Url>,
    html: Option<String>,
}

impl HttpPage {
    /// Locate the named iframe's `src`, resolved against the page URL.
    fn frame_src(&self, name: &str) -> Option<String> {
        let (html, base) = (self.html.as_deref()?, self.url.as_ref()?);
        let selector = match parse_selector(&format!("iframe#{name}, iframe[name=\"{name}\"]")) {
            Ok(selector) => selector,
            Err(e) => {
                log::debug!("Cannot look up frame '{name}': {e}");
                return None;
            }
        };

        let doc = Document::parse(html);
        let src = doc
            .select_first(&selector)
            .and_then(|frame| Document::attr(frame, "src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())?;
        Some(resolve_url(base, src))
    }
}

#[async_trait]
impl PageContext for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> std::result::Result<(), RenderError> {
        let parsed = Url::parse(url).map_err(RenderError::network)?;
        let html = fetch_text(&self.client, url, self.user_agent.as_deref(), timeout).await?;
        self.url = Some(parsed);
        self.html = Some(html);
        Ok(())
    }

    async fn content(&self) -> std::result::Result<String, RenderError> {
        self.html
            .clone()
            .ok_or_else(|| RenderError::Unavailable("page has not been loaded".to_string()))
    }

    async fn frame_content(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> std::result::Result<Option<String>, RenderError> {
        let Some(src) = self.frame_src(name) else {
            return Ok(None);
        };
        log::debug!("Following frame '{name}' to {src}");
        let html = fetch_text(&self.client, &src, self.user_agent.as_deref(), timeout).await?;
        Ok(Some(html))
    }
}
