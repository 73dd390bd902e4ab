//! Test doubles shared by the scrape and executor tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;
use crate::models::Config;
use crate::services::{PageContext, RenderOptions, Renderer};

/// One scripted answer to a `goto`.
#[derive(Debug, Clone)]
pub enum Step {
    /// Top-level document with no content frame
    Html(String),
    /// Top-level document wrapping a content frame
    Framed { outer: String, frame: String },
    /// Navigation fails
    Fail(RenderError),
    /// Navigation never completes
    Hang,
    /// Navigation panics
    Panic,
}

/// Render capability that replays scripted steps per URL.
///
/// The n-th `goto` for a URL gets the n-th step; the last step repeats.
/// Unscripted URLs answer with HTTP 404.
#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    scripts: Arc<RwLock<HashMap<String, Vec<Step>>>>,
    calls: Arc<RwLock<HashMap<String, usize>>>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    stalled: Arc<AtomicBool>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, steps: Vec<Step>) {
        self.scripts.write().unwrap().insert(url.to_string(), steps);
    }

    /// Number of `goto` calls made for a URL.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.read().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Make every later `open_page` call wait forever.
    pub fn stall_open(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Pages dropped so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> Option<Step> {
        let call = {
            let mut calls = self.calls.write().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };
        let scripts = self.scripts.read().unwrap();
        let steps = scripts.get(url)?;
        steps.get(call).or_else(|| steps.last()).cloned()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn open_page(&self, _options: &RenderOptions) -> Result<Box<dyn PageContext>, RenderError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage {
            renderer: self.clone(),
            loaded: None,
        }))
    }
}

struct ScriptedPage {
    renderer: ScriptedRenderer,
    loaded: Option<Step>,
}

impl Drop for ScriptedPage {
    fn drop(&mut self) {
        self.renderer.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageContext for ScriptedPage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<(), RenderError> {
        match self.renderer.next_step(url) {
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Panic) => panic!("renderer crashed on {url}"),
            Some(step) => {
                self.loaded = Some(step);
                Ok(())
            }
            None => Err(RenderError::Status(404)),
        }
    }

    async fn content(&self) -> Result<String, RenderError> {
        match &self.loaded {
            Some(Step::Html(html)) | Some(Step::Framed { outer: html, .. }) => Ok(html.clone()),
            _ => Err(RenderError::Unavailable("nothing loaded".to_string())),
        }
    }

    async fn frame_content(
        &mut self,
        _name: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, RenderError> {
        match &self.loaded {
            Some(Step::Framed { frame, .. }) => Ok(Some(frame.clone())),
            _ => Ok(None),
        }
    }
}

/// Configuration with delays short enough for paused-clock tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.scraper.min_delay_ms = 10;
    config.scraper.max_delay_ms = 20;
    config.retry.initial_delay_ms = 100;
    config.executor.workers = 2;
    config
}

/// A post page in current editor markup.
pub fn post_html(title: &str) -> String {
    format!(
        r##"<html><body>
            <span class="se-title-text">{title}</span>
            <span class="nick">writer</span>
            <span class="se_publishDate">2024. 1. 2. 10:00</span>
            <div class="se-main-container">
                <p>{}</p>
                <img class="se-image-resource" src="https://cdn.example.com/photo.jpg">
            </div>
            <div class="tag_area"><a>#daily</a></div>
        </body></html>"##,
        "A reasonably long paragraph of post text. ".repeat(4)
    )
}
